//! Collaborators at the edge of the watcher: where prices come from and
//! where drop notifications go.

pub mod quotes;
pub mod scraper;
pub mod webhook;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::{Itinerary, SourceConfig};
use crate::utils::errors::WatchError;

pub use quotes::{ApiError, QuoteApiClient};
pub use scraper::ScraperCommand;
pub use webhook::WebhookClient;

/// Supplies the current quote per vehicle category for an itinerary.
///
/// Implementations hand back the raw JSON object; validation happens when
/// the observation is built. No retries happen here.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_current_prices(&self, itinerary: &Itinerary) -> Result<Map<String, Value>, WatchError>;
}

/// Build the configured price source.
pub fn source_from_config(config: &SourceConfig) -> Result<Box<dyn PriceSource>, WatchError> {
    match config {
        SourceConfig::QuoteApi { url, timeout } => {
            Ok(Box::new(QuoteApiClient::new(url.clone(), *timeout)?))
        }
        SourceConfig::Scraper { program, args } => {
            Ok(Box::new(ScraperCommand::new(program.clone(), args.clone())))
        }
    }
}

/// Accept only a top-level JSON object from a source.
pub(crate) fn expect_price_object(value: Value) -> Result<Map<String, Value>, WatchError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(WatchError::MalformedObservation(format!(
            "expected a JSON object of prices, got {}",
            other
        ))),
    }
}
