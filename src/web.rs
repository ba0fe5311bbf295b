use crate::export;
use crate::index::{KeywordIndex, format_keyword};
use crate::loader::{LoadError, Table};
use crate::session::SelectionState;
use crate::telemetry::{self, Telemetry};
use askama::Html as HtmlEscaper;
use askama::{MarkupDisplay, Template};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use cookie::Cookie;
use parking_lot::Mutex;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState = Arc<AppState>;
type SafeJson = MarkupDisplay<HtmlEscaper, String>;

const SESSION_COOKIE: &str = "cfl_session";
const MAX_BROWSER_SESSIONS: usize = 4096;

/// Outcome of the startup load. A failed load still serves pages, in a
/// degraded state with the error surfaced as a banner.
#[derive(Clone)]
pub enum DatasetStatus {
    Ready(Arc<Table>),
    Failed(String),
}

impl DatasetStatus {
    pub fn from_load(result: Result<Arc<Table>, LoadError>) -> Self {
        match result {
            Ok(table) => DatasetStatus::Ready(table),
            Err(err) => DatasetStatus::Failed(err.to_string()),
        }
    }

    fn table(&self) -> Option<&Arc<Table>> {
        match self {
            DatasetStatus::Ready(table) => Some(table),
            DatasetStatus::Failed(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dataset: DatasetStatus,
    pub theme: WebTheme,
    pub base_url: String,
    pub source: String,
    sessions: Arc<SessionStore>,
    telemetry: Telemetry,
}

impl AppState {
    pub fn new(
        dataset: DatasetStatus,
        theme: WebTheme,
        base_url: String,
        source: String,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            dataset,
            theme,
            base_url,
            source,
            sessions: Arc::new(SessionStore::new()),
            telemetry,
        }
    }
}

/// Per-session selection states, keyed by the session cookie.
struct SessionStore {
    inner: Mutex<HashMap<String, SelectionState>>,
}

impl SessionStore {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `f` against the session's state, creating it on first use.
    /// Beyond the cap, new sessions get a scratch state that is not kept.
    fn with_session<T>(&self, session_id: &str, f: impl FnOnce(&mut SelectionState) -> T) -> T {
        let mut guard = self.inner.lock();
        if let Some(state) = guard.get_mut(session_id) {
            return f(state);
        }
        if guard.len() < MAX_BROWSER_SESSIONS {
            f(guard.entry(session_id.to_string()).or_default())
        } else {
            f(&mut SelectionState::new())
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    button_class: &'static str,
    chip_class: &'static str,
    chip_active_class: &'static str,
    panel_class: &'static str,
    error_banner_class: &'static str,
    warn_banner_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen py-10 px-4",
                card_class: "max-w-6xl mx-auto space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                chip_class: "px-3 py-1 rounded-full bg-white border border-slate-300 text-slate-700 shadow-sm hover:shadow",
                chip_active_class: "px-3 py-1 rounded-full bg-slate-900 border border-slate-900 text-white shadow",
                panel_class: "bg-white shadow rounded p-4",
                error_banner_class: "rounded border border-red-300 bg-red-50 text-red-800 px-4 py-3",
                warn_banner_class: "rounded border border-amber-300 bg-amber-50 text-amber-800 px-4 py-3",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-11",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                button_class: "btn btn-primary px-4 py-2",
                chip_class: "btn btn-outline-secondary btn-sm rounded-pill",
                chip_active_class: "btn btn-dark btn-sm rounded-pill",
                panel_class: "card card-body",
                error_banner_class: "alert alert-danger",
                warn_banner_class: "alert alert-warning",
            },
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub base_url: String,
    pub source: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            base_url: "http://127.0.0.1:8080".to_string(),
            source: crate::loader::DEFAULT_SOURCE.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(
    config: WebConfig,
    dataset: DatasetStatus,
    telemetry: Telemetry,
) -> Result<(), WebError> {
    let state = Arc::new(AppState::new(
        dataset,
        config.theme,
        config.base_url.clone(),
        config.source.clone(),
        telemetry,
    ));
    let router = build_router(state);
    info!(
        %config.addr,
        theme = ?config.theme,
        base = %config.base_url,
        source = %config.source,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/browse", get(browse))
        .route("/download/filtered", get(download_filtered))
        .route("/download/all", get(download_all))
        .route("/api/keywords", get(api_keywords))
        .route("/api/metadata", get(api_metadata))
        .route("/api/trending", get(api_trending))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn home(State(state): State<SharedState>) -> impl IntoResponse {
    Html(render_home(&state))
}

fn render_home(state: &AppState) -> String {
    let chrome = Chrome::new(state.theme);
    let (css_tag, js_tag) = theme_assets(state.theme);
    let banner = match &state.dataset {
        DatasetStatus::Failed(message) => format!(
            r#"<div class="{}">Error loading dataset: {}</div>"#,
            chrome.error_banner_class,
            html_escape(message)
        ),
        DatasetStatus::Ready(table) if table.is_empty() => format!(
            r#"<div class="{}">No data available. Please check the dataset source.</div>"#,
            chrome.warn_banner_class
        ),
        DatasetStatus::Ready(_) => String::new(),
    };
    let title = "CFL Explorer • Comprehensive Financial Lexicon";
    let intro = "Browse financial terms by category and subcategory, inspect the \
papers they were extracted from, and export keyword lists.";
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{title}</title>
    {css_tag}
    {js_tag}
    <script type="application/ld+json">
{site_json_ld}
    </script>
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <div>
          <p class="{eyebrow_class}">CFL Explorer v{version}</p>
          <h1 class="{headline_class}">Explore the Comprehensive Financial Lexicon.</h1>
          <p class="{lede_class}">{intro}</p>
        </div>
        {banner}
        <div class="flex flex-wrap gap-3 d-flex">
          <a href="/browse" class="{button_class}">Browse categories</a>
          <a href="/api/trending" class="{button_class}">Trending keywords</a>
        </div>
      </div>
    </main>
  </body>
</html>"#,
        title = title,
        css_tag = css_tag,
        js_tag = js_tag,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        eyebrow_class = chrome.eyebrow_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        banner = banner,
        version = env!("CARGO_PKG_VERSION"),
        intro = intro,
        site_json_ld = indent_json(&website_json_ld(&state.base_url), 4),
    )
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "cfl-explorer-web" }))
}

async fn browse(
    State(state): State<SharedState>,
    Query(params): Query<BrowseParams>,
    headers: HeaderMap,
) -> Response {
    let (session_id, minted) = session_from_headers(&headers);
    let view = build_browse_view(&state, &session_id, &params);
    let chrome = Chrome::new(state.theme);
    let json_ld = MarkupDisplay::new_safe(browse_json_ld(&state.base_url, &view), HtmlEscaper);
    let template = BrowseTemplate {
        chrome,
        payload: &view,
        json_ld,
    };
    let html = template
        .render()
        .unwrap_or_else(|err| render_error_page(state.theme, err.to_string()));
    let mut response = Html(html).into_response();
    if minted {
        if let Ok(value) = HeaderValue::from_str(&session_cookie(&session_id)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

fn build_browse_view(state: &AppState, session_id: &str, params: &BrowseParams) -> BrowseView {
    let mut view = BrowseView::default();
    let table = match &state.dataset {
        DatasetStatus::Failed(message) => {
            view.load_error = Some(message.clone());
            return view;
        }
        DatasetStatus::Ready(table) if table.is_empty() => {
            view.dataset_empty = true;
            return view;
        }
        DatasetStatus::Ready(table) => table,
    };
    state.sessions.with_session(session_id, |selection| {
        selection.select_category(params.category.as_deref());
        selection.select_subcategory(params.subcategory.as_deref());
        let index = match (selection.category(), selection.subcategory()) {
            (Some(category), Some(subcategory)) => {
                Some(KeywordIndex::build(table, category, subcategory))
            }
            _ => None,
        };
        if let (Some(index), Some(keyword)) = (index.as_ref(), params.keyword.as_deref()) {
            let formatted = format_keyword(keyword);
            if selection.click_keyword(index, &formatted) {
                state.telemetry.record_keyword_view(&formatted, session_id);
            }
        }
        populate_view(&mut view, table, selection, index.as_ref());
    });
    view
}

fn populate_view(
    view: &mut BrowseView,
    table: &Table,
    selection: &SelectionState,
    index: Option<&KeywordIndex>,
) {
    view.category = selection.category().map(str::to_string);
    view.subcategory = selection.subcategory().map(str::to_string);
    view.selected_keyword = selection.clicked_keyword().map(str::to_string);
    view.categories = table
        .categories()
        .into_iter()
        .map(|name| OptionLink {
            href: browse_path(Some(&name), None, None),
            active: selection.category() == Some(name.as_str()),
            label: name,
        })
        .collect();
    if let Some(category) = selection.category() {
        view.subcategories = table
            .subcategories(category)
            .into_iter()
            .map(|name| OptionLink {
                href: browse_path(Some(category), Some(&name), None),
                active: selection.subcategory() == Some(name.as_str()),
                label: name,
            })
            .collect();
    }
    if let Some(index) = index {
        view.matching_rows = index.matching_rows();
        view.ai_keyword_count = index.ai_keywords().len();
        let category = index.category();
        let subcategory = index.subcategory();
        view.keywords = index
            .original_keywords()
            .iter()
            .map(|keyword| OptionLink {
                href: browse_path(Some(category), Some(subcategory), Some(keyword)),
                active: selection.clicked_keyword() == Some(keyword.as_str()),
                label: keyword.clone(),
            })
            .collect();
        view.download_filtered = Some(download_path("filtered", category, subcategory));
        view.download_all = Some(download_path("all", category, subcategory));
    }
    if let Some(record) = selection.metadata() {
        view.ai_synonyms = record
            .similar_terms()
            .into_iter()
            .map(format_keyword)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        view.metadata = record
            .metadata_fields()
            .into_iter()
            .map(|(label, value)| MetadataFieldView {
                label,
                value: value.to_string(),
            })
            .collect();
    }
}

async fn download_filtered(
    State(state): State<SharedState>,
    Query(params): Query<FilterParams>,
) -> Result<Response, ApiError> {
    let index = index_from_params(&state, &params)?;
    Ok(keyword_attachment(
        export::FILTERED_KEYWORDS_FILENAME,
        export::filtered_export(&index),
    ))
}

async fn download_all(
    State(state): State<SharedState>,
    Query(params): Query<FilterParams>,
) -> Result<Response, ApiError> {
    let index = index_from_params(&state, &params)?;
    Ok(keyword_attachment(
        export::ALL_KEYWORDS_FILENAME,
        export::combined_export(&index),
    ))
}

async fn api_keywords(
    State(state): State<SharedState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<KeywordListPayload>, ApiError> {
    let index = index_from_params(&state, &params)?;
    Ok(Json(KeywordListPayload::from_index(&index)))
}

async fn api_metadata(
    State(state): State<SharedState>,
    Query(params): Query<MetadataParams>,
) -> Result<Json<MetadataPayload>, ApiError> {
    let filter = FilterParams {
        category: params.category.clone(),
        subcategory: params.subcategory.clone(),
    };
    let index = index_from_params(&state, &filter)?;
    let keyword = required_param(&params.keyword, "keyword")?;
    let formatted = format_keyword(keyword);
    let record = index.metadata_for(&formatted).cloned().ok_or_else(|| {
        ApiError::not_found(format!("No keyword {formatted:?} in the current view"))
    })?;
    let ai_suggested: Vec<String> = record
        .similar_terms()
        .into_iter()
        .map(format_keyword)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    Ok(Json(MetadataPayload {
        keyword: formatted,
        ai_suggested,
        metadata: record,
    }))
}

async fn api_trending(
    State(state): State<SharedState>,
    Query(params): Query<TrendingParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    Json(json!({
        "limit": limit,
        "results": state.telemetry.trending(limit),
    }))
}

#[derive(Debug, Deserialize)]
struct BrowseParams {
    category: Option<String>,
    subcategory: Option<String>,
    keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilterParams {
    category: Option<String>,
    subcategory: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataParams {
    category: Option<String>,
    subcategory: Option<String>,
    keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrendingParams {
    limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeywordListPayload {
    category: String,
    subcategory: String,
    matching_rows: usize,
    original: Vec<String>,
    ai_suggested: Vec<String>,
}

impl KeywordListPayload {
    fn from_index(index: &KeywordIndex) -> Self {
        Self {
            category: index.category().to_string(),
            subcategory: index.subcategory().to_string(),
            matching_rows: index.matching_rows(),
            original: index.original_keywords().iter().cloned().collect(),
            ai_suggested: index.ai_keywords().iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetadataPayload {
    keyword: String,
    ai_suggested: Vec<String>,
    metadata: crate::data::LexiconRecord,
}

#[derive(Debug, Clone, Default)]
struct BrowseView {
    load_error: Option<String>,
    dataset_empty: bool,
    category: Option<String>,
    subcategory: Option<String>,
    selected_keyword: Option<String>,
    categories: Vec<OptionLink>,
    subcategories: Vec<OptionLink>,
    keywords: Vec<OptionLink>,
    matching_rows: usize,
    ai_keyword_count: usize,
    ai_synonyms: Vec<String>,
    metadata: Vec<MetadataFieldView>,
    download_filtered: Option<String>,
    download_all: Option<String>,
}

#[derive(Debug, Clone)]
struct OptionLink {
    label: String,
    href: String,
    active: bool,
}

#[derive(Debug, Clone)]
struct MetadataFieldView {
    label: &'static str,
    value: String,
}

fn index_from_params(state: &AppState, params: &FilterParams) -> Result<KeywordIndex, ApiError> {
    let table = state
        .dataset
        .table()
        .ok_or_else(|| match &state.dataset {
            DatasetStatus::Failed(message) => ApiError::unavailable(message.clone()),
            DatasetStatus::Ready(_) => ApiError::unavailable("dataset unavailable"),
        })?;
    let category = required_param(&params.category, "category")?;
    let subcategory = required_param(&params.subcategory, "subcategory")?;
    Ok(KeywordIndex::build(table, category, subcategory))
}

fn required_param<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("Query parameter `{name}` is required")))
}

fn keyword_attachment(filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, mime::TEXT_CSV.as_ref().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn session_from_headers(headers: &HeaderMap) -> (String, bool) {
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for parsed in Cookie::split_parse(raw.to_string()) {
            if let Ok(cookie) = parsed {
                if cookie.name() == SESSION_COOKIE && !cookie.value().is_empty() {
                    return (cookie.value().to_string(), false);
                }
            }
        }
    }
    (telemetry::mint_session_id(), true)
}

fn session_cookie(session_id: &str) -> String {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .build()
        .to_string()
}

fn theme_assets(theme: WebTheme) -> (&'static str, &'static str) {
    match theme {
        WebTheme::Tailwind => (
            r#"<script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>"#,
            "",
        ),
        WebTheme::Bootstrap => (
            r#"<link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">"#,
            r#"<script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/js/bootstrap.bundle.min.js" integrity="sha384-FKyoEForCGlyvwx9Hj09JcYn3nv7wiPVlz7YYwJrWVcXK/BmnVDxM+D2scQbITxI" crossorigin="anonymous"></script>"#,
        ),
    }
}

fn render_error_page(theme: WebTheme, message: impl Into<String>) -> String {
    let chrome = Chrome::new(theme);
    let (css_tag, js_tag) = theme_assets(theme);
    let message = html_escape(&message.into());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>CFL Explorer • Error</title>
    {css_tag}
    {js_tag}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">Something went wrong</h1>
        <p class="{lede_class}">{message}</p>
        <a href="/" class="{button_class}">Back to home</a>
      </div>
    </main>
  </body>
</html>"#,
        css_tag = css_tag,
        js_tag = js_tag,
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        message = message,
    )
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn browse_path(category: Option<&str>, subcategory: Option<&str>, keyword: Option<&str>) -> String {
    let mut path = String::from("/browse");
    let mut separator = '?';
    for (name, value) in [
        ("category", category),
        ("subcategory", subcategory),
        ("keyword", keyword),
    ] {
        if let Some(value) = value {
            path.push(separator);
            path.push_str(name);
            path.push('=');
            path.push_str(&encode_component(value));
            separator = '&';
        }
    }
    path
}

fn download_path(variant: &str, category: &str, subcategory: &str) -> String {
    format!(
        "/download/{variant}?category={}&subcategory={}",
        encode_component(category),
        encode_component(subcategory)
    )
}

fn browse_json_ld(base_url: &str, view: &BrowseView) -> String {
    let url = format!("{base_url}/browse");
    serde_json::to_string_pretty(&json!({
        "@context": "https://schema.org",
        "@type": "DefinedTermSet",
        "@id": url,
        "name": "Comprehensive Financial Lexicon",
        "url": url,
        "numberOfItems": view.keywords.len(),
    }))
    .unwrap_or_else(|_| "{}".to_string())
}

fn website_json_ld(base_url: &str) -> String {
    serde_json::to_string_pretty(&json!({
        "@context": "https://schema.org",
        "@type": "WebSite",
        "url": base_url,
        "name": "CFL Explorer",
    }))
    .unwrap_or_else(|_| "{}".to_string())
}

fn indent_json(content: &str, spaces: usize) -> String {
    let padding = " ".repeat(spaces);
    content
        .lines()
        .map(|line| format!("{padding}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>CFL Explorer • Browse</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    <script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/js/bootstrap.bundle.min.js" integrity="sha384-FKyoEForCGlyvwx9Hj09JcYn3nv7wiPVlz7YYwJrWVcXK/BmnVDxM+D2scQbITxI" crossorigin="anonymous"></script>
    {% endif %}
    <script type="application/ld+json">
    {{ json_ld }}
    </script>
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <div>
          <p class="{{ chrome.eyebrow_class }}">Explore Categories</p>
          <h1 class="{{ chrome.headline_class }}">Comprehensive Financial Lexicon</h1>
          <p class="{{ chrome.lede_class }}">Pick a category, narrow to a subcategory, then click a keyword to see its source paper.</p>
        </div>

        {% if payload.load_error.is_some() %}
        <div class="{{ chrome.error_banner_class }}">Error loading dataset: {{ payload.load_error.as_ref().unwrap() }}</div>
        {% endif %}
        {% if payload.dataset_empty %}
        <div class="{{ chrome.warn_banner_class }}">No data available. Please check the dataset source.</div>
        {% endif %}

        {% if payload.categories.len() > 0 %}
        <section id="categories">
          <h2 class="text-xl font-semibold mb-2">Categories</h2>
          <div class="flex flex-wrap gap-2 d-flex">
            {% for link in payload.categories %}
            <a href="{{ link.href }}" class="{% if link.active %}{{ chrome.chip_active_class }}{% else %}{{ chrome.chip_class }}{% endif %}">{{ link.label }}</a>
            {% endfor %}
          </div>
        </section>
        {% endif %}

        {% if payload.subcategories.len() > 0 %}
        <section id="subcategories">
          <h2 class="text-xl font-semibold mb-2">Subcategories</h2>
          <div class="flex flex-wrap gap-2 d-flex">
            {% for link in payload.subcategories %}
            <a href="{{ link.href }}" class="{% if link.active %}{{ chrome.chip_active_class }}{% else %}{{ chrome.chip_class }}{% endif %}">{{ link.label }}</a>
            {% endfor %}
          </div>
        </section>
        {% endif %}

        <div class="grid gap-6 md:grid-cols-3 row g-3">
          <div class="md:col-span-2 col-md-8">
            {% if payload.category.is_some() %}
            <p class="{{ chrome.eyebrow_class }}">{{ payload.category.as_ref().unwrap() }}{% if payload.subcategory.is_some() %} / {{ payload.subcategory.as_ref().unwrap() }}{% endif %}</p>
            {% endif %}
            {% if payload.subcategory.is_some() %}
            <section id="keywords">
              <h2 class="text-xl font-semibold mb-2">Keywords ({{ payload.keywords.len() }} from {{ payload.matching_rows }} entries)</h2>
              {% if payload.download_filtered.is_some() %}
              <div class="flex flex-wrap gap-3 mb-4 d-flex">
                <a href="{{ payload.download_filtered.as_ref().unwrap() }}" class="{{ chrome.button_class }}">Download keywords</a>
                <a href="{{ payload.download_all.as_ref().unwrap() }}" class="{{ chrome.button_class }}">Download with AI terms ({{ payload.ai_keyword_count }})</a>
              </div>
              {% endif %}
              {% if payload.keywords.len() == 0 %}
              <p>No keywords under this selection.</p>
              {% else %}
              <div class="flex flex-wrap gap-2 d-flex">
                {% for link in payload.keywords %}
                <a href="{{ link.href }}" class="{% if link.active %}{{ chrome.chip_active_class }}{% else %}{{ chrome.chip_class }}{% endif %}">{{ link.label }}</a>
                {% endfor %}
              </div>
              {% endif %}
            </section>
            {% else %}
            <p class="text-slate-500">Select a category and a subcategory to list keywords.</p>
            {% endif %}
          </div>

          <aside id="keyword-details" class="col-md-4">
            <div class="{{ chrome.panel_class }}">
              <h2 class="text-xl font-semibold mb-2">Selected Keyword Details</h2>
              {% if payload.selected_keyword.is_some() %}
              <p class="font-semibold mb-2">{{ payload.selected_keyword.as_ref().unwrap() }}</p>
              {% if payload.ai_synonyms.len() > 0 %}
              <p class="text-sm text-slate-500 mb-1">AI-Suggested Keywords</p>
              <p class="mb-3">
                {% for synonym in payload.ai_synonyms %}
                  {% if loop.first %}
                    {{ synonym }}
                  {% else %}
                    , {{ synonym }}
                  {% endif %}
                {% endfor %}
              </p>
              {% endif %}
              <dl>
                {% for field in payload.metadata %}
                <dt class="text-sm uppercase tracking-wide text-slate-500">{{ field.label }}</dt>
                <dd class="mb-2">{{ field.value }}</dd>
                {% endfor %}
              </dl>
              {% else %}
              <p class="text-slate-500 mb-0">Select a keyword to see its metadata.</p>
              {% endif %}
            </div>
          </aside>
        </div>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct BrowseTemplate<'a> {
    chrome: Chrome,
    payload: &'a BrowseView,
    json_ld: SafeJson,
}
