//! Chart generation models

use chrono::{DateTime, Utc};

use super::History;

/// One category's price line on the history chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSeries {
    pub category: String,
    pub points: Vec<(DateTime<Utc>, u64)>,
}

impl ChartSeries {
    /// One series per category, in column order.
    pub fn from_history(history: &History) -> Vec<ChartSeries> {
        history
            .categories()
            .into_iter()
            .map(|category| {
                let points = history.series(&category);
                ChartSeries { category, points }
            })
            .filter(|series| !series.points.is_empty())
            .collect()
    }
}
