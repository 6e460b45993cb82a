use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::debug;

use super::{expect_price_object, PriceSource};
use crate::config::Itinerary;
use crate::utils::errors::WatchError;

/// Runs an external scraper that drives the booking site and prints the
/// quoted prices as a JSON object on stdout.
///
/// The itinerary is appended as `--key value` arguments after the
/// configured ones.
pub struct ScraperCommand {
    program: String,
    args: Vec<String>,
}

impl ScraperCommand {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    pub fn arguments(&self, itinerary: &Itinerary) -> Vec<String> {
        let mut args = self.args.clone();
        for (key, value) in itinerary.as_pairs() {
            args.push(format!("--{}", key));
            args.push(value);
        }
        args
    }
}

#[async_trait]
impl PriceSource for ScraperCommand {
    async fn fetch_current_prices(&self, itinerary: &Itinerary) -> Result<Map<String, Value>, WatchError> {
        let args = self.arguments(itinerary);
        debug!("Running scraper {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| WatchError::Fetch(format!("failed to start {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WatchError::Fetch(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let value: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            WatchError::MalformedObservation(format!("scraper output is not JSON: {}", e))
        })?;
        expect_price_object(value)
    }
}
