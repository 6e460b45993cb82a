//! Data models for the price watcher
//!
//! Observations come in from a price source, are folded into the History,
//! and drop detection turns the pair into a Report.

pub mod chart;
pub mod history;
pub mod observation;
pub mod report;

pub use chart::ChartSeries;
pub use history::History;
pub use observation::{Observation, KNOWN_CATEGORIES};
pub use report::{PriceDrop, Report};
