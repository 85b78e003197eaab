//! Field Selector
//!
//! Presents a dictionary's labels sorted by code, pre-selects the default,
//! and resolves the chosen label back to its integer code.

use serde::Serialize;

use super::tables::{CodeTable, ALL_TABLES};

/// One selectable option
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SelectOption {
    pub code: i64,
    pub label: &'static str,
}

/// Selection state for one categorical control
#[derive(Debug, Clone, Serialize)]
pub struct FieldSelector {
    pub column: &'static str,
    pub title: &'static str,
    pub help: Option<&'static str>,
    options: Vec<SelectOption>,
    selected: usize,
    fallback_code: i64,
}

impl FieldSelector {
    /// Build a selector; a default code missing from the table falls back to the first sorted option
    pub fn new(table: &CodeTable, default_code: i64) -> Self {
        let options: Vec<SelectOption> = table
            .sorted_entries()
            .into_iter()
            .map(|(code, label)| SelectOption { code, label })
            .collect();

        let selected = options
            .iter()
            .position(|o| o.code == default_code)
            .unwrap_or(0);

        Self {
            column: table.column,
            title: table.title,
            help: None,
            options,
            selected,
            fallback_code: default_code,
        }
    }

    /// Selector using the table's documented default
    pub fn for_table(table: &CodeTable) -> Self {
        Self::new(table, table.default_code)
    }

    pub fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }

    /// Options sorted by ascending code
    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.options.iter().map(|o| o.label)
    }

    /// Index of the currently selected option
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_label(&self) -> Option<&'static str> {
        self.options.get(self.selected).map(|o| o.label)
    }

    /// Code of the currently selected option
    pub fn selected_code(&self) -> i64 {
        self.options
            .get(self.selected)
            .map(|o| o.code)
            .unwrap_or(self.fallback_code)
    }

    /// Code for a label, `None` if the label is not offered
    pub fn resolve(&self, label: &str) -> Option<i64> {
        self.options.iter().find(|o| o.label == label).map(|o| o.code)
    }

    /// Move the selection to `label`; returns false and keeps the selection if the label is unknown
    pub fn choose(&mut self, label: &str) -> bool {
        match self.options.iter().position(|o| o.label == label) {
            Some(idx) => {
                self.selected = idx;
                true
            }
            None => false,
        }
    }
}

/// Serializable form of one dictionary, entries sorted by code
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CodeTableView {
    pub column: &'static str,
    pub title: &'static str,
    pub default_code: i64,
    pub entries: Vec<SelectOption>,
}

impl CodeTableView {
    /// Every dictionary, form order
    pub fn all() -> Vec<Self> {
        ALL_TABLES
            .iter()
            .map(|table| Self::from(&FieldSelector::for_table(table)))
            .collect()
    }
}

impl From<&FieldSelector> for CodeTableView {
    fn from(selector: &FieldSelector) -> Self {
        Self {
            column: selector.column,
            title: selector.title,
            default_code: selector.selected_code(),
            entries: selector.options().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::codes::tables::{DAY_WEEK, REST_USE, WEATHR_IM};

    #[test]
    fn test_options_sorted_by_code() {
        let selector = FieldSelector::for_table(&WEATHR_IM);
        let codes: Vec<i64> = selector.options().iter().map(|o| o.code).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
        assert_eq!(codes.last(), Some(&99));
    }

    #[test]
    fn test_default_preselected() {
        let selector = FieldSelector::for_table(&REST_USE);
        assert_eq!(selector.selected_code(), 3);
        assert_eq!(selector.selected_label(), Some("Shoulder and lap belt used"));
    }

    #[test]
    fn test_absent_default_falls_back_to_first_code() {
        let selector = FieldSelector::new(&DAY_WEEK, 42);
        assert_eq!(selector.selected_index(), 0);
        assert_eq!(selector.selected_code(), 1);
        assert_eq!(selector.selected_label(), Some("Sunday"));
    }

    #[test]
    fn test_choose_and_resolve() {
        let mut selector = FieldSelector::for_table(&DAY_WEEK);
        assert!(selector.choose("Friday"));
        assert_eq!(selector.selected_code(), 6);
        assert_eq!(selector.resolve("Monday"), Some(2));

        assert!(!selector.choose("Caturday"));
        assert_eq!(selector.selected_code(), 6);
        assert_eq!(selector.resolve("Caturday"), None);
    }

    #[test]
    fn test_table_views_cover_every_dictionary() {
        let views = CodeTableView::all();
        assert_eq!(views.len(), ALL_TABLES.len());

        let weather = views.iter().find(|v| v.column == "WEATHR_IM").unwrap();
        assert_eq!(weather.default_code, 1);
        assert_eq!(weather.entries[0], SelectOption { code: 1, label: "Clear" });
        assert!(views.iter().any(|v| v.column == "body_typ_group"));
    }

    #[test]
    fn test_empty_table_returns_requested_default() {
        let empty = CodeTable {
            column: "EMPTY",
            title: "Empty",
            default_code: 5,
            entries: &[],
        };
        let selector = FieldSelector::for_table(&empty);
        assert_eq!(selector.selected_code(), 5);
        assert!(selector.selected_label().is_none());
    }
}
