use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Placeholder shown wherever a bibliographic field is missing.
pub const NOT_AVAILABLE: &str = "N/A";

/// Columns retained from the source file. Anything else is dropped without
/// comment; columns listed here but absent from the source stay `None`.
pub const EXPECTED_COLUMNS: [&str; 26] = [
    "DOI",
    "Category",
    "Subcategory",
    "Keywords",
    "top_5_similar",
    "top_10_similar",
    "top_15_similar",
    "Paper Title",
    "Author",
    "Journal",
    "Year",
    "Sample size (Firms)",
    "Sample size (Observations)",
    "Sample firms",
    "Begin sample",
    "End sample",
    "Data Source for Narrative",
    "Data Source for Narrative (Other)",
    "Linguistic Variable(s) - Category",
    "Linguistic Variable(s) - Category (Details)",
    "Linguistic Variable(s) - Other",
    "Linguistic Variable(s) - Use of Thesaurus",
    "Linguistic Variable(s) - Thesaurus Development Details",
    "Outcome variable(s) category",
    "Outcome variable(s) - Other",
    "Reference",
];

/// One lexicon entry: its classification, keyword sets, and the
/// bibliographic metadata of the paper it was extracted from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexiconRecord {
    pub doi: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub keywords: BTreeSet<String>,
    pub top_5_similar: BTreeSet<String>,
    pub top_10_similar: BTreeSet<String>,
    pub top_15_similar: BTreeSet<String>,
    pub paper_title: Option<String>,
    pub author: Option<String>,
    pub journal: Option<String>,
    pub year: Option<String>,
    pub sample_size_firms: Option<String>,
    pub sample_size_observations: Option<String>,
    pub sample_firms: Option<String>,
    pub begin_sample: Option<String>,
    pub end_sample: Option<String>,
    pub narrative_source: Option<String>,
    pub narrative_source_other: Option<String>,
    pub linguistic_category: Option<String>,
    pub linguistic_category_details: Option<String>,
    pub linguistic_other: Option<String>,
    pub linguistic_thesaurus: Option<String>,
    pub linguistic_thesaurus_details: Option<String>,
    pub outcome_category: Option<String>,
    pub outcome_other: Option<String>,
    pub reference: Option<String>,
}

impl LexiconRecord {
    /// Union of the three precomputed similarity columns, raw tokens.
    pub fn similar_terms(&self) -> BTreeSet<&str> {
        self.top_5_similar
            .iter()
            .chain(self.top_10_similar.iter())
            .chain(self.top_15_similar.iter())
            .map(String::as_str)
            .collect()
    }

    /// Labeled metadata fields in side-panel order, `N/A` where missing.
    /// Every display surface renders this same list.
    pub fn metadata_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("Paper Title", or_na(&self.paper_title)),
            ("Author", or_na(&self.author)),
            ("Journal", or_na(&self.journal)),
            ("Year", or_na(&self.year)),
            ("Sample Size (Firms)", or_na(&self.sample_size_firms)),
            (
                "Sample Size (Observations)",
                or_na(&self.sample_size_observations),
            ),
            ("Sample Firms", or_na(&self.sample_firms)),
            ("Data Source for Narrative", or_na(&self.narrative_source)),
            (
                "Linguistic Variable - Category",
                or_na(&self.linguistic_category),
            ),
            (
                "Linguistic Variable - Use of Thesaurus",
                or_na(&self.linguistic_thesaurus),
            ),
            (
                "Linguistic Variable - Thesaurus Development Details",
                or_na(&self.linguistic_thesaurus_details),
            ),
            ("Reference", or_na(&self.reference)),
        ]
    }
}

/// `N/A` fallback for optional metadata fields.
pub fn or_na(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(NOT_AVAILABLE)
}

/// Parses a stringified list/tuple/set of tokens, e.g. `"['a', 'b']"`.
/// Empty input and anything malformed yield an empty set; a bad cell must
/// never abort the surrounding load.
pub fn parse_list_cell(raw: &str) -> BTreeSet<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return BTreeSet::new();
    }
    match parse_literal_elements(trimmed) {
        Some(tokens) => tokens,
        None => {
            warn!(cell = trimmed, "Ignoring malformed list cell");
            BTreeSet::new()
        }
    }
}

/// Parses the plain keyword cell: whitespace-delimited, deduplicated.
pub fn parse_keyword_cell(raw: &str) -> BTreeSet<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn parse_literal_elements(text: &str) -> Option<BTreeSet<String>> {
    let open = text.chars().next()?;
    let close = match open {
        '[' => ']',
        '(' => ')',
        '{' => '}',
        _ => return None,
    };
    if text.len() < 2 || !text.ends_with(close) {
        return None;
    }
    let inner = &text[open.len_utf8()..text.len() - close.len_utf8()];
    let mut elements = BTreeSet::new();
    let mut rest = inner.trim_start();
    while !rest.is_empty() {
        let (token, remainder) = parse_element(rest)?;
        elements.insert(token);
        rest = remainder.trim_start();
        if rest.is_empty() {
            break;
        }
        // Elements are comma-separated; a trailing comma is legal.
        rest = rest.strip_prefix(',')?.trim_start();
    }
    Some(elements)
}

fn parse_element(text: &str) -> Option<(String, &str)> {
    let mut chars = text.char_indices();
    let (_, first) = chars.next()?;
    if first == '\'' || first == '"' {
        let mut value = String::new();
        let mut escaped = false;
        for (idx, ch) in chars {
            if escaped {
                value.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == first {
                return Some((value, &text[idx + ch.len_utf8()..]));
            } else {
                value.push(ch);
            }
        }
        None
    } else {
        // Unquoted elements must be numeric literals; bare names are the
        // malformed case.
        let end = text
            .find(|c: char| c == ',' || c.is_whitespace())
            .unwrap_or(text.len());
        let token = &text[..end];
        if token.parse::<f64>().is_ok() {
            Some((token.to_string(), &text[end..]))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tokens: &[&str]) -> BTreeSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn list_cell_parses_quoted_elements() {
        assert_eq!(
            parse_list_cell("['npl_ratio','bad_debt']"),
            set(&["npl_ratio", "bad_debt"])
        );
        assert_eq!(
            parse_list_cell(r#"["alpha", "beta"]"#),
            set(&["alpha", "beta"])
        );
        assert_eq!(parse_list_cell("{'a', 'b'}"), set(&["a", "b"]));
        assert_eq!(parse_list_cell("('solo',)"), set(&["solo"]));
    }

    #[test]
    fn list_cell_deduplicates() {
        assert_eq!(parse_list_cell("['a', 'a', 'b']"), set(&["a", "b"]));
    }

    #[test]
    fn list_cell_accepts_numeric_elements() {
        assert_eq!(parse_list_cell("[1, 2, 2]"), set(&["1", "2"]));
    }

    #[test]
    fn malformed_list_cells_collapse_to_empty() {
        for cell in [
            "not-a-list",
            "[unquoted]",
            "['unterminated",
            "['a' 'b']",
            "[['nested']]",
            "[",
        ] {
            assert!(parse_list_cell(cell).is_empty(), "cell: {cell}");
        }
    }

    #[test]
    fn empty_and_blank_cells_are_empty_sets() {
        assert!(parse_list_cell("").is_empty());
        assert!(parse_list_cell("   ").is_empty());
        assert!(parse_list_cell("[]").is_empty());
    }

    #[test]
    fn keyword_cell_splits_on_whitespace() {
        assert_eq!(
            parse_keyword_cell("default_rate  loss_given_default\ndefault_rate"),
            set(&["default_rate", "loss_given_default"])
        );
        assert!(parse_keyword_cell("   ").is_empty());
    }

    #[test]
    fn metadata_fields_fall_back_to_na() {
        let record = LexiconRecord {
            paper_title: Some("Tone and Returns".to_string()),
            ..Default::default()
        };
        let fields = record.metadata_fields();
        assert_eq!(fields[0], ("Paper Title", "Tone and Returns"));
        assert!(fields[1..].iter().all(|(_, value)| *value == NOT_AVAILABLE));
    }

    #[test]
    fn similar_terms_union_spans_all_three_columns() {
        let record = LexiconRecord {
            top_5_similar: set(&["a"]),
            top_10_similar: set(&["a", "b"]),
            top_15_similar: set(&["c"]),
            ..Default::default()
        };
        let terms: Vec<&str> = record.similar_terms().into_iter().collect();
        assert_eq!(terms, vec!["a", "b", "c"]);
    }
}
