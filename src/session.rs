use serde::{Deserialize, Serialize};

use crate::data::LexiconRecord;
use crate::index::KeywordIndex;

/// Where the cascading selection currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPhase {
    NoCategory,
    CategorySelected,
    SubcategorySelected,
    KeywordSelected,
}

/// Per-session selection state for one browsing session. Changing an
/// upstream choice resets everything downstream of it; transitions are
/// idempotent, and a stale keyword click is ignored rather than surfaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    category: Option<String>,
    subcategory: Option<String>,
    clicked_keyword: Option<String>,
    metadata: Option<LexiconRecord>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SelectionPhase {
        if self.category.is_none() {
            SelectionPhase::NoCategory
        } else if self.subcategory.is_none() {
            SelectionPhase::CategorySelected
        } else if self.clicked_keyword.is_none() {
            SelectionPhase::SubcategorySelected
        } else {
            SelectionPhase::KeywordSelected
        }
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn subcategory(&self) -> Option<&str> {
        self.subcategory.as_deref()
    }

    pub fn clicked_keyword(&self) -> Option<&str> {
        self.clicked_keyword.as_deref()
    }

    /// Row snapshot bound to the clicked keyword.
    pub fn metadata(&self) -> Option<&LexiconRecord> {
        self.metadata.as_ref()
    }

    /// Choosing a category. Reselecting the current one changes nothing;
    /// `None` or a blank string clears the whole selection.
    pub fn select_category(&mut self, category: Option<&str>) {
        let next = normalize(category);
        if self.category == next {
            return;
        }
        self.category = next;
        self.subcategory = None;
        self.clear_click();
    }

    /// Choosing a subcategory. Ignored while no category is selected.
    pub fn select_subcategory(&mut self, subcategory: Option<&str>) {
        if self.category.is_none() {
            return;
        }
        let next = normalize(subcategory);
        if self.subcategory == next {
            return;
        }
        self.subcategory = next;
        self.clear_click();
    }

    /// A keyword click against the current index. Returns whether the click
    /// took effect: clicks outside `SubcategorySelected`/`KeywordSelected`
    /// and clicks on keywords absent from the index (stale) leave the state
    /// untouched.
    pub fn click_keyword(&mut self, index: &KeywordIndex, keyword: &str) -> bool {
        if self.subcategory.is_none() {
            return false;
        }
        match index.metadata_for(keyword) {
            Some(row) => {
                self.clicked_keyword = Some(keyword.to_string());
                self.metadata = Some(row.clone());
                true
            }
            None => false,
        }
    }

    fn clear_click(&mut self) {
        self.clicked_keyword = None;
        self.metadata = None;
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Table;
    use std::collections::BTreeSet;

    fn table() -> Table {
        let mut row = LexiconRecord {
            category: Some("Risk".to_string()),
            subcategory: Some("Credit".to_string()),
            paper_title: Some("Default Rates".to_string()),
            ..Default::default()
        };
        row.keywords = ["default_rate"]
            .iter()
            .map(|t| t.to_string())
            .collect::<BTreeSet<_>>();
        Table::from_records(vec![row])
    }

    fn selected_state(index: &KeywordIndex) -> SelectionState {
        let mut state = SelectionState::new();
        state.select_category(Some("Risk"));
        state.select_subcategory(Some("Credit"));
        assert!(state.click_keyword(index, "default rate"));
        state
    }

    #[test]
    fn phases_walk_the_cascade() {
        let table = table();
        let index = KeywordIndex::build(&table, "Risk", "Credit");
        let mut state = SelectionState::new();
        assert_eq!(state.phase(), SelectionPhase::NoCategory);
        state.select_category(Some("Risk"));
        assert_eq!(state.phase(), SelectionPhase::CategorySelected);
        state.select_subcategory(Some("Credit"));
        assert_eq!(state.phase(), SelectionPhase::SubcategorySelected);
        assert!(state.click_keyword(&index, "default rate"));
        assert_eq!(state.phase(), SelectionPhase::KeywordSelected);
        assert_eq!(
            state.metadata().and_then(|m| m.paper_title.as_deref()),
            Some("Default Rates")
        );
    }

    #[test]
    fn category_change_resets_downstream() {
        let table = table();
        let index = KeywordIndex::build(&table, "Risk", "Credit");
        let mut state = selected_state(&index);
        state.select_category(Some("Sentiment"));
        assert_eq!(state.phase(), SelectionPhase::CategorySelected);
        assert_eq!(state.subcategory(), None);
        assert_eq!(state.clicked_keyword(), None);
        assert_eq!(state.metadata(), None);
    }

    #[test]
    fn subcategory_change_resets_keyword_only() {
        let table = table();
        let index = KeywordIndex::build(&table, "Risk", "Credit");
        let mut state = selected_state(&index);
        state.select_subcategory(Some("Market"));
        assert_eq!(state.category(), Some("Risk"));
        assert_eq!(state.subcategory(), Some("Market"));
        assert_eq!(state.clicked_keyword(), None);
        assert_eq!(state.metadata(), None);
    }

    #[test]
    fn reselecting_the_same_value_is_a_no_op() {
        let table = table();
        let index = KeywordIndex::build(&table, "Risk", "Credit");
        let mut state = selected_state(&index);
        let before = state.clone();
        state.select_category(Some("Risk"));
        state.select_subcategory(Some("Credit"));
        assert_eq!(state, before);
    }

    #[test]
    fn blank_selection_clears() {
        let table = table();
        let index = KeywordIndex::build(&table, "Risk", "Credit");
        let mut state = selected_state(&index);
        state.select_category(Some("  "));
        assert_eq!(state.phase(), SelectionPhase::NoCategory);
        assert!(!state.click_keyword(&index, "default rate"));
    }

    #[test]
    fn stale_click_is_ignored() {
        let table = table();
        let index = KeywordIndex::build(&table, "Risk", "Credit");
        let mut state = selected_state(&index);
        let before = state.clone();
        assert!(!state.click_keyword(&index, "no such keyword"));
        assert_eq!(state, before);
    }

    #[test]
    fn subcategory_without_category_is_ignored() {
        let mut state = SelectionState::new();
        state.select_subcategory(Some("Credit"));
        assert_eq!(state.phase(), SelectionPhase::NoCategory);
    }
}
