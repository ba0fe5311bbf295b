use std::collections::BTreeSet;

use crate::index::KeywordIndex;

/// Fixed download names the surfaces offer, served as `text/csv`.
pub const FILTERED_KEYWORDS_FILENAME: &str = "filtered_keywords.csv";
pub const ALL_KEYWORDS_FILENAME: &str = "all_keywords.csv";

/// Newline-delimited UTF-8 keyword list, sorted. An empty set yields an
/// empty buffer, not a lone newline.
pub fn keyword_list_bytes(keywords: &BTreeSet<String>) -> Vec<u8> {
    keywords
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

/// Original keywords only.
pub fn filtered_export(index: &KeywordIndex) -> Vec<u8> {
    keyword_list_bytes(index.original_keywords())
}

/// Original plus AI-suggested keywords.
pub fn combined_export(index: &KeywordIndex) -> Vec<u8> {
    keyword_list_bytes(&index.all_keywords())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LexiconRecord;
    use crate::loader::Table;

    fn set(tokens: &[&str]) -> BTreeSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn round_trips_to_sorted_lines() {
        let keywords = set(&["loss given default", "default rate"]);
        let bytes = keyword_list_bytes(&keywords);
        let text = String::from_utf8(bytes).expect("utf-8");
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines, vec!["default rate", "loss given default"]);
    }

    #[test]
    fn empty_set_is_an_empty_buffer() {
        assert!(keyword_list_bytes(&BTreeSet::new()).is_empty());
    }

    #[test]
    fn combined_export_includes_ai_terms() {
        let row = LexiconRecord {
            category: Some("Risk".to_string()),
            subcategory: Some("Credit".to_string()),
            keywords: set(&["default_rate"]),
            top_5_similar: set(&["npl_ratio"]),
            ..Default::default()
        };
        let table = Table::from_records(vec![row]);
        let index = crate::index::KeywordIndex::build(&table, "Risk", "Credit");
        let filtered = String::from_utf8(filtered_export(&index)).expect("utf-8");
        assert_eq!(filtered, "default rate");
        let combined = String::from_utf8(combined_export(&index)).expect("utf-8");
        assert_eq!(combined, "default rate\nnpl ratio");
    }
}
