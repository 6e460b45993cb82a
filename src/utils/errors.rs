use chrono::{DateTime, Utc};
use thiserror::Error;

/// Everything a polling cycle can fail with.
///
/// None of these leave the persisted history half written: the store only
/// ever swaps a fully written file into place.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to fetch prices: {0}")]
    Fetch(String),
    #[error("An observation already exists at {0}")]
    DuplicateTimestamp(DateTime<Utc>),
    #[error("Malformed observation: {0}")]
    MalformedObservation(String),
    #[error("Failed to persist history: {0}")]
    Persistence(String),
    #[error("History file is corrupt: {0}")]
    CorruptHistory(String),
    #[error("Failed to render chart: {0}")]
    Chart(String),
    #[error("Failed to send notification: {0}")]
    Notify(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WatchError {
    /// Cycle errors that leave the stored history untouched and can simply
    /// be retried on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, WatchError::Fetch(_) | WatchError::Notify(_))
    }
}

/// Strip the `Label: ` prefix thiserror puts in front of a message so only
/// the useful part ends up in the log line or notification.
pub fn extract_clean_error(error_msg: &str) -> String {
    match error_msg.split_once(": ") {
        Some((_, rest)) if !rest.trim().is_empty() => rest.trim().to_string(),
        _ => error_msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_clean_error_drops_label() {
        let err = WatchError::Fetch("connection refused".to_string());
        assert_eq!(extract_clean_error(&err.to_string()), "connection refused");
    }

    #[test]
    fn test_extract_clean_error_without_label() {
        assert_eq!(extract_clean_error("plain"), "plain");
    }

    #[test]
    fn test_transient_errors() {
        assert!(WatchError::Fetch("x".into()).is_transient());
        assert!(!WatchError::Persistence("x".into()).is_transient());
    }
}
