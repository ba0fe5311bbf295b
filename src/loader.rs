use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::info;

use crate::data::{self, EXPECTED_COLUMNS, LexiconRecord};

/// Published location of the merged CFL dataset.
pub const DEFAULT_SOURCE: &str =
    "https://raw.githubusercontent.com/arioncheong/finance-lexicon/refs/heads/main/Analysis1_merge_part.csv";

const CACHE_CAPACITY: usize = 8;

#[derive(Debug)]
pub enum LoadError {
    Http(reqwest::Error),
    Io(std::io::Error),
    Csv(csv::Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Http(err) => write!(f, "fetching dataset failed: {err}"),
            LoadError::Io(err) => write!(f, "reading dataset failed: {err}"),
            LoadError::Csv(err) => write!(f, "decoding dataset failed: {err}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<reqwest::Error> for LoadError {
    fn from(value: reqwest::Error) -> Self {
        LoadError::Http(value)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(value: std::io::Error) -> Self {
        LoadError::Io(value)
    }
}

impl From<csv::Error> for LoadError {
    fn from(value: csv::Error) -> Self {
        LoadError::Csv(value)
    }
}

/// The loaded lexicon: ordered rows, shared read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<LexiconRecord>,
}

impl Table {
    pub fn from_records(rows: Vec<LexiconRecord>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[LexiconRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sorted distinct categories; rows with a blank category are skipped.
    pub fn categories(&self) -> Vec<String> {
        let mut distinct = BTreeSet::new();
        for row in &self.rows {
            if let Some(category) = non_blank(&row.category) {
                distinct.insert(category.to_string());
            }
        }
        distinct.into_iter().collect()
    }

    /// Sorted distinct subcategories under one category.
    pub fn subcategories(&self, category: &str) -> Vec<String> {
        let mut distinct = BTreeSet::new();
        for row in &self.rows {
            if row.category.as_deref() != Some(category) {
                continue;
            }
            if let Some(subcategory) = non_blank(&row.subcategory) {
                distinct.insert(subcategory.to_string());
            }
        }
        distinct.into_iter().collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Fetches and decodes the dataset from an http(s) URL or a local path.
pub fn fetch_table(source: &str) -> Result<Table, LoadError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        info!(%source, "Fetching lexicon dataset");
        let body = reqwest::blocking::get(source)?.error_for_status()?.text()?;
        parse_csv(body.as_bytes())
    } else {
        info!(%source, "Reading lexicon dataset");
        parse_csv(File::open(source)?)
    }
}

/// Decodes CSV rows into a [`Table`], keeping only the expected columns.
pub fn parse_csv<R: Read>(reader: R) -> Result<Table, LoadError> {
    let mut decoder = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = decoder.headers()?.clone();
    let mut columns: HashMap<&str, usize> = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        if EXPECTED_COLUMNS.contains(&name) {
            columns.entry(name).or_insert(idx);
        }
    }
    let mut rows = Vec::new();
    for record in decoder.records() {
        let record = record?;
        rows.push(record_from_row(&columns, &record));
    }
    info!(rows = rows.len(), "Loaded lexicon table");
    Ok(Table::from_records(rows))
}

fn cell<'r>(
    columns: &HashMap<&str, usize>,
    record: &'r csv::StringRecord,
    name: &str,
) -> Option<&'r str> {
    columns.get(name).and_then(|&idx| record.get(idx))
}

fn record_from_row(columns: &HashMap<&str, usize>, record: &csv::StringRecord) -> LexiconRecord {
    let text = |name: &str| -> Option<String> {
        cell(columns, record, name)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
    };
    let list = |name: &str| {
        cell(columns, record, name)
            .map(data::parse_list_cell)
            .unwrap_or_default()
    };
    LexiconRecord {
        doi: text("DOI"),
        category: text("Category"),
        subcategory: text("Subcategory"),
        keywords: cell(columns, record, "Keywords")
            .map(data::parse_keyword_cell)
            .unwrap_or_default(),
        top_5_similar: list("top_5_similar"),
        top_10_similar: list("top_10_similar"),
        top_15_similar: list("top_15_similar"),
        paper_title: text("Paper Title"),
        author: text("Author"),
        journal: text("Journal"),
        year: text("Year"),
        sample_size_firms: text("Sample size (Firms)"),
        sample_size_observations: text("Sample size (Observations)"),
        sample_firms: text("Sample firms"),
        begin_sample: text("Begin sample"),
        end_sample: text("End sample"),
        narrative_source: text("Data Source for Narrative"),
        narrative_source_other: text("Data Source for Narrative (Other)"),
        linguistic_category: text("Linguistic Variable(s) - Category"),
        linguistic_category_details: text("Linguistic Variable(s) - Category (Details)"),
        linguistic_other: text("Linguistic Variable(s) - Other"),
        linguistic_thesaurus: text("Linguistic Variable(s) - Use of Thesaurus"),
        linguistic_thesaurus_details: text("Linguistic Variable(s) - Thesaurus Development Details"),
        outcome_category: text("Outcome variable(s) category"),
        outcome_other: text("Outcome variable(s) - Other"),
        reference: text("Reference"),
    }
}

/// Explicit dataset cache keyed by source reference. One fetch per source
/// per process unless invalidated.
pub struct DatasetCache {
    tables: Mutex<LruCache<String, Arc<Table>>>,
}

impl DatasetCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least one");
        Self {
            tables: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached table for `source`, fetching on first use.
    pub fn load(&self, source: &str) -> Result<Arc<Table>, LoadError> {
        if let Some(table) = self.tables.lock().get(source) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(fetch_table(source)?);
        self.tables
            .lock()
            .put(source.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Drops the cached copy so the next [`DatasetCache::load`] re-fetches.
    pub fn invalidate(&self, source: &str) {
        self.tables.lock().pop(source);
    }

    pub fn reload(&self, source: &str) -> Result<Arc<Table>, LoadError> {
        self.invalidate(source);
        self.load(source)
    }
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new(CACHE_CAPACITY)
    }
}

static SHARED_CACHE: Lazy<DatasetCache> = Lazy::new(DatasetCache::default);

/// Process-wide memoized load. Repeated calls with the same source within
/// one process hit the cache instead of the network.
pub fn load_cached(source: &str) -> Result<Arc<Table>, LoadError> {
    SHARED_CACHE.load(source)
}

pub fn shared_cache() -> &'static DatasetCache {
    &SHARED_CACHE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::io::Write;

    const SAMPLE: &str = "\
DOI, Category ,Subcategory,Keywords,top_5_similar,top_10_similar,top_15_similar,Paper Title,Surprise Column
10.1/a,Risk,Credit,default_rate,\"['npl_ratio','bad_debt']\",not-a-list,,Credit Risk Words,ignored
10.1/b,Risk,Credit,loss_given_default,,,\"['recovery_rate']\",LGD Lexicon,ignored
10.1/c,Sentiment,Tone,optimism pessimism optimism,,,,Tone Paper,ignored
,,,orphan_keyword,,,,,ignored
";

    fn sample_table() -> Table {
        parse_csv(SAMPLE.as_bytes()).expect("sample csv parses")
    }

    #[test]
    fn headers_are_trimmed_and_unexpected_columns_dropped() {
        let table = sample_table();
        let first = &table.rows()[0];
        assert_eq!(first.category.as_deref(), Some("Risk"));
        assert_eq!(first.paper_title.as_deref(), Some("Credit Risk Words"));
    }

    #[test]
    fn keyword_and_list_cells_are_parsed() {
        let table = sample_table();
        let first = &table.rows()[0];
        let expected: BTreeSet<String> = ["npl_ratio", "bad_debt"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(first.top_5_similar, expected);
        // Malformed and missing similarity cells both collapse to empty.
        assert!(first.top_10_similar.is_empty());
        assert!(first.top_15_similar.is_empty());

        let tone = &table.rows()[2];
        assert_eq!(tone.keywords.len(), 2);
        assert!(tone.keywords.contains("optimism"));
    }

    #[test]
    fn missing_expected_columns_stay_none() {
        let table = parse_csv("Category,Subcategory\nRisk,Credit\n".as_bytes()).expect("parses");
        let row = &table.rows()[0];
        assert_eq!(row.doi, None);
        assert!(row.keywords.is_empty());
    }

    #[test]
    fn categories_are_sorted_distinct_and_skip_blanks() {
        let table = sample_table();
        assert_eq!(table.categories(), vec!["Risk", "Sentiment"]);
        assert_eq!(table.subcategories("Risk"), vec!["Credit"]);
        assert!(table.subcategories("Unknown").is_empty());
    }

    #[test]
    fn cache_loads_once_and_reloads_on_invalidate() {
        let path = std::env::temp_dir().join(format!("cfl-cache-{}.csv", std::process::id()));
        {
            let mut file = File::create(&path).expect("temp csv");
            file.write_all(SAMPLE.as_bytes()).expect("write sample");
        }
        let source = path.to_string_lossy().to_string();
        let cache = DatasetCache::new(2);
        let first = cache.load(&source).expect("first load");
        let second = cache.load(&source).expect("cached load");
        assert!(Arc::ptr_eq(&first, &second));

        cache.invalidate(&source);
        let third = cache.load(&source).expect("reload");
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_errors_are_human_readable() {
        let missing = fetch_table("/definitely/not/here.csv").expect_err("missing file");
        assert!(missing.to_string().starts_with("reading dataset failed"));
    }
}
