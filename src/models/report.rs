//! Drop report models

use std::collections::BTreeMap;

use serde::Serialize;

use crate::utils::Table;

/// One category whose newest quote undercut every earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceDrop {
    pub new_price: u64,
    pub historical_min: u64,
    /// Always negative.
    pub difference: i64,
}

/// Categories that dropped in one detection cycle. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    drops: BTreeMap<String, PriceDrop>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, category: &str, drop: PriceDrop) {
        self.drops.insert(category.to_string(), drop);
    }

    pub fn is_empty(&self) -> bool {
        self.drops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.drops.len()
    }

    pub fn get(&self, category: &str) -> Option<&PriceDrop> {
        self.drops.get(category)
    }

    fn table(&self) -> Table {
        let mut table = Table::new(vec!["Category", "New price", "Old price", "Difference"]);
        for (category, drop) in &self.drops {
            table.add_row(vec![
                category.clone(),
                drop.new_price.to_string(),
                drop.historical_min.to_string(),
                drop.difference.to_string(),
            ]);
        }
        table
    }

    /// Plain text table for logs and text notifications.
    pub fn to_text(&self) -> String {
        self.table().render()
    }

    /// HTML table for the notification body.
    pub fn to_html(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<body>\n{}\n</body>\n</html>\n",
            self.table().render_html()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        let mut report = Report::new();
        report.record(
            "mini",
            PriceDrop {
                new_price: 480,
                historical_min: 500,
                difference: -20,
            },
        );
        report
    }

    #[test]
    fn test_text_rendering_lists_drop() {
        let text = sample().to_text();
        assert!(text.contains("Category"));
        assert!(text.contains("mini"));
        assert!(text.contains("-20"));
    }

    #[test]
    fn test_html_rendering_is_a_document() {
        let html = sample().to_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<td>480</td>"));
        assert!(html.contains("<th>Old price</th>"));
    }

    #[test]
    fn test_serializes_as_category_map() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["drops"]["mini"]["difference"], -20);
    }
}
