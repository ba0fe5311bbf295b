use std::collections::{BTreeSet, HashMap};

use crate::data::LexiconRecord;
use crate::loader::Table;

/// Display/lookup form of a keyword: every underscore becomes a space.
/// Applied uniformly wherever a keyword is shown, indexed, or exported, so
/// lookup keys and display strings never diverge.
pub fn format_keyword(token: &str) -> String {
    token.replace('_', " ")
}

/// Derived view of the table for one (category, subcategory) pair:
/// the distinct original keywords, the distinct AI-suggested terms, and a
/// formatted-keyword → row-snapshot map. Rebuilt when the pair changes,
/// not per render.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    category: String,
    subcategory: String,
    matching_rows: usize,
    original: BTreeSet<String>,
    ai: BTreeSet<String>,
    metadata: HashMap<String, LexiconRecord>,
}

impl KeywordIndex {
    pub fn build(table: &Table, category: &str, subcategory: &str) -> Self {
        let mut index = Self {
            category: category.to_string(),
            subcategory: subcategory.to_string(),
            ..Self::default()
        };
        for row in table.rows() {
            if row.category.as_deref() != Some(category)
                || row.subcategory.as_deref() != Some(subcategory)
            {
                continue;
            }
            index.matching_rows += 1;
            for token in &row.keywords {
                let formatted = format_keyword(token);
                index.original.insert(formatted.clone());
                // When two rows share a formatted keyword, the later row's
                // snapshot wins.
                index.metadata.insert(formatted, row.clone());
            }
            for token in row.similar_terms() {
                index.ai.insert(format_keyword(token));
            }
        }
        index
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn subcategory(&self) -> &str {
        &self.subcategory
    }

    /// Rows that matched the filter, including rows without keywords.
    pub fn matching_rows(&self) -> usize {
        self.matching_rows
    }

    /// Distinct formatted keywords tagged on the filtered rows, sorted.
    pub fn original_keywords(&self) -> &BTreeSet<String> {
        &self.original
    }

    /// Distinct formatted AI-suggested terms over the filtered rows, sorted.
    pub fn ai_keywords(&self) -> &BTreeSet<String> {
        &self.ai
    }

    /// Original ∪ AI-suggested, for the combined export.
    pub fn all_keywords(&self) -> BTreeSet<String> {
        self.original.union(&self.ai).cloned().collect()
    }

    /// Row snapshot behind a formatted keyword, if it is in this view.
    pub fn metadata_for(&self, formatted: &str) -> Option<&LexiconRecord> {
        self.metadata.get(formatted)
    }

    pub fn contains(&self, formatted: &str) -> bool {
        self.metadata.contains_key(formatted)
    }

    pub fn is_empty(&self) -> bool {
        self.matching_rows == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn set(tokens: &[&str]) -> BTreeSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn row(category: &str, subcategory: &str, keywords: &[&str]) -> LexiconRecord {
        LexiconRecord {
            category: Some(category.to_string()),
            subcategory: Some(subcategory.to_string()),
            keywords: set(keywords),
            ..Default::default()
        }
    }

    fn risk_credit_table() -> Table {
        let mut first = row("Risk", "Credit", &["default_rate"]);
        first.paper_title = Some("Default Rates".to_string());
        first.top_5_similar = set(&["npl_ratio", "bad_debt"]);
        let mut second = row("Risk", "Credit", &["loss_given_default"]);
        second.paper_title = Some("LGD Lexicon".to_string());
        second.top_10_similar = set(&["recovery_rate"]);
        let other = row("Sentiment", "Tone", &["optimism"]);
        Table::from_records(vec![first, second, other])
    }

    #[test]
    fn format_keyword_replaces_underscores_and_is_idempotent() {
        assert_eq!(format_keyword("loss_given_default"), "loss given default");
        assert_eq!(format_keyword("plain"), "plain");
        let once = format_keyword("a_b_c");
        assert_eq!(format_keyword(&once), once);
        assert!(!once.contains('_'));
    }

    #[test]
    fn build_collects_formatted_keywords_sorted() {
        let index = KeywordIndex::build(&risk_credit_table(), "Risk", "Credit");
        let keywords: Vec<&String> = index.original_keywords().iter().collect();
        assert_eq!(keywords, vec!["default rate", "loss given default"]);
        assert_eq!(index.matching_rows(), 2);
    }

    #[test]
    fn ai_keywords_union_all_similarity_columns() {
        let index = KeywordIndex::build(&risk_credit_table(), "Risk", "Credit");
        assert_eq!(
            index.ai_keywords().iter().collect::<Vec<_>>(),
            vec!["bad debt", "npl ratio", "recovery rate"]
        );
        let combined = index.all_keywords();
        assert_eq!(combined.len(), 5);
        assert!(combined.contains("default rate"));
        assert!(combined.contains("recovery rate"));
    }

    #[test]
    fn metadata_maps_each_keyword_to_its_own_row() {
        let index = KeywordIndex::build(&risk_credit_table(), "Risk", "Credit");
        let record = index.metadata_for("default rate").expect("indexed");
        assert_eq!(record.paper_title.as_deref(), Some("Default Rates"));
        let record = index.metadata_for("loss given default").expect("indexed");
        assert_eq!(record.paper_title.as_deref(), Some("LGD Lexicon"));
        assert!(index.metadata_for("default_rate").is_none());
    }

    #[test]
    fn duplicate_formatted_keyword_keeps_last_row() {
        let mut first = row("Risk", "Credit", &["default_rate"]);
        first.paper_title = Some("First".to_string());
        let mut second = row("Risk", "Credit", &["default_rate"]);
        second.paper_title = Some("Second".to_string());
        let table = Table::from_records(vec![first, second]);
        let index = KeywordIndex::build(&table, "Risk", "Credit");
        assert_eq!(index.original_keywords().len(), 1);
        let record = index.metadata_for("default rate").expect("indexed");
        assert_eq!(record.paper_title.as_deref(), Some("Second"));
    }

    #[test]
    fn filter_is_exact_string_match() {
        let index = KeywordIndex::build(&risk_credit_table(), "Risk", "Tone");
        assert!(index.is_empty());
        assert!(index.original_keywords().is_empty());
        let index = KeywordIndex::build(&risk_credit_table(), "risk", "Credit");
        assert!(index.is_empty());
    }
}
