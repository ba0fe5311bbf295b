use std::collections::BTreeSet;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use atty::Stream;
use clap::{Parser, Subcommand};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};

use cfl_explorer::export;
use cfl_explorer::index::{KeywordIndex, format_keyword};
use cfl_explorer::loader::{self, Table};
use cfl_explorer::session::SelectionState;

#[derive(Parser, Debug)]
#[command(
    name = "cfl-explorer",
    about = "Explore the Comprehensive Financial Lexicon",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Dataset location: an http(s) URL or a local CSV path.
    #[arg(long, global = true, default_value = loader::DEFAULT_SOURCE)]
    source: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the categories present in the dataset.
    Categories,
    /// List the subcategories under a category.
    Subcategories {
        /// Category to expand.
        category: String,
    },
    /// List keywords for a category/subcategory pair.
    Keywords {
        #[arg(long)]
        category: String,
        #[arg(long)]
        subcategory: String,
        /// Include the AI-suggested similar terms.
        #[arg(long)]
        ai: bool,
    },
    /// Show the bibliographic metadata behind one keyword.
    Show {
        #[arg(long)]
        category: String,
        #[arg(long)]
        subcategory: String,
        /// Keyword as displayed; underscores and spaces both accepted.
        keyword: String,
    },
    /// Write a keyword list export.
    Export {
        #[arg(long)]
        category: String,
        #[arg(long)]
        subcategory: String,
        /// Include AI-suggested terms alongside the originals.
        #[arg(long)]
        all: bool,
        /// Output path; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Serve the web interface.
    #[cfg(feature = "web")]
    Serve {
        /// Socket address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Page styling: "tailwind" or "bootstrap".
        #[arg(long, default_value = "tailwind")]
        theme: String,
        /// Public base URL used in links; derived from the address when omitted.
        #[arg(long)]
        base_url: Option<String>,
        /// Write periodic telemetry snapshots to this file.
        #[arg(long)]
        telemetry_path: Option<PathBuf>,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Categories => handle_categories(&*load(&cli.source)?, &cli.source, cli.json),
        Command::Subcategories { category } => {
            handle_subcategories(&*load(&cli.source)?, category, cli.json)
        }
        Command::Keywords {
            category,
            subcategory,
            ai,
        } => handle_keywords(&*load(&cli.source)?, category, subcategory, ai, cli.json),
        Command::Show {
            category,
            subcategory,
            keyword,
        } => handle_show(&*load(&cli.source)?, category, subcategory, keyword, cli.json),
        Command::Export {
            category,
            subcategory,
            all,
            output,
        } => handle_export(
            &*load(&cli.source)?,
            category,
            subcategory,
            all,
            output,
            cli.json,
        ),
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            theme,
            base_url,
            telemetry_path,
        } => handle_serve(&cli.source, addr, &theme, base_url, telemetry_path),
    }
}

fn load(source: &str) -> Result<std::sync::Arc<Table>, Box<dyn Error>> {
    Ok(loader::load_cached(source)?)
}

fn handle_categories(table: &Table, source: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let categories = table.categories();
    if as_json {
        let payload = json!({ "source": source, "categories": categories });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if categories.is_empty() {
        println!("No categories found in the dataset.");
    } else {
        println!("Categories ({}):", categories.len());
        for category in &categories {
            println!("  {category}");
        }
    }
    Ok(())
}

fn handle_subcategories(
    table: &Table,
    category: String,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let subcategories = table.subcategories(&category);
    if as_json {
        let payload = json!({ "category": category, "subcategories": subcategories });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if subcategories.is_empty() {
        println!("No subcategories found under \"{category}\".");
    } else {
        println!("Subcategories of {category} ({}):", subcategories.len());
        for subcategory in &subcategories {
            println!("  {subcategory}");
        }
    }
    Ok(())
}

fn handle_keywords(
    table: &Table,
    category: String,
    subcategory: String,
    ai: bool,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let index = KeywordIndex::build(table, &category, &subcategory);
    if as_json {
        let mut payload = json!({
            "category": category,
            "subcategory": subcategory,
            "matching_rows": index.matching_rows(),
            "original": index.original_keywords(),
        });
        if ai {
            payload["ai_suggested"] = json!(index.ai_keywords());
        }
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if index.is_empty() {
        println!("No rows match {category} / {subcategory}.");
        return Ok(());
    }
    print_keyword_list(
        &format!("Keywords for {category} / {subcategory}"),
        index.original_keywords(),
    );
    if ai {
        print_keyword_list("AI-suggested terms", index.ai_keywords());
    }
    Ok(())
}

fn handle_show(
    table: &Table,
    category: String,
    subcategory: String,
    keyword: String,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let index = KeywordIndex::build(table, &category, &subcategory);
    let mut state = SelectionState::new();
    state.select_category(Some(&category));
    state.select_subcategory(Some(&subcategory));
    let formatted = format_keyword(&keyword);
    if !state.click_keyword(&index, &formatted) {
        return Err(format!(
            "No keyword {formatted:?} under {category} / {subcategory}"
        )
        .into());
    }
    let record = state
        .metadata()
        .expect("metadata is set after an accepted click");
    let synonyms: BTreeSet<String> = record
        .similar_terms()
        .into_iter()
        .map(format_keyword)
        .collect();

    if as_json {
        let payload = json!({
            "keyword": formatted,
            "category": category,
            "subcategory": subcategory,
            "ai_suggested": synonyms,
            "metadata": record,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let mut body = String::new();
    if !synonyms.is_empty() {
        body.push_str("**AI-Suggested Keywords:** ");
        body.push_str(&synonyms.iter().cloned().collect::<Vec<_>>().join(", "));
        body.push_str("\n\n");
    }
    for (label, value) in record.metadata_fields() {
        body.push_str(&format!("**{label}:** {value}\n\n"));
    }
    render_markdown_block(&format!("Keyword: {formatted}"), &body);
    Ok(())
}

fn handle_export(
    table: &Table,
    category: String,
    subcategory: String,
    all: bool,
    output: Option<PathBuf>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let index = KeywordIndex::build(table, &category, &subcategory);
    let (bytes, filename, keywords) = if all {
        (
            export::combined_export(&index),
            export::ALL_KEYWORDS_FILENAME,
            index.all_keywords(),
        )
    } else {
        (
            export::filtered_export(&index),
            export::FILTERED_KEYWORDS_FILENAME,
            index.original_keywords().clone(),
        )
    };

    match output {
        Some(path) => {
            fs::write(&path, &bytes)?;
            if as_json {
                let payload = json!({
                    "filename": filename,
                    "path": path.display().to_string(),
                    "keywords": keywords.len(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Wrote {} keywords to {}", keywords.len(), path.display());
            }
        }
        None => {
            if as_json {
                let payload = json!({ "filename": filename, "keywords": keywords });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                io::stdout().write_all(&bytes)?;
                if !bytes.is_empty() {
                    println!();
                }
            }
        }
    }
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(
    source: &str,
    addr: std::net::SocketAddr,
    theme: &str,
    base_url: Option<String>,
    telemetry_path: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    use cfl_explorer::telemetry::Telemetry;
    use cfl_explorer::web::{self, DatasetStatus, WebConfig, WebTheme};
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let theme = match theme {
        "tailwind" => WebTheme::Tailwind,
        "bootstrap" => WebTheme::Bootstrap,
        other => {
            return Err(format!("Unknown theme {other:?}; expected tailwind or bootstrap").into());
        }
    };
    // Load before the runtime starts; a failure degrades the pages rather
    // than aborting the server.
    let dataset = DatasetStatus::from_load(loader::load_cached(source));
    let telemetry = match telemetry_path {
        Some(path) => Telemetry::persistent(path),
        None => Telemetry::ephemeral(),
    };
    let config = WebConfig {
        addr,
        theme,
        base_url: base_url.unwrap_or_else(|| format!("http://{addr}")),
        source: source.to_string(),
    };
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(web::serve(config, dataset, telemetry))?;
    Ok(())
}

fn print_keyword_list(heading: &str, keywords: &BTreeSet<String>) {
    if keywords.is_empty() {
        println!("{heading}: none.");
        return;
    }
    println!("{heading} ({}):", keywords.len());
    for keyword in keywords {
        println!("  {keyword}");
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
