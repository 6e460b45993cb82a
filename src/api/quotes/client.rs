use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client as HttpClient;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::models::ApiError;
use crate::api::{expect_price_object, PriceSource};
use crate::config::Itinerary;
use crate::utils::errors::WatchError;

/// Quote service client: one GET per cycle, itinerary passed as query
/// parameters, answer is a JSON object of prices.
pub struct QuoteApiClient {
    http_client: HttpClient,
    url: String,
}

impl QuoteApiClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, WatchError> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .default_headers(Self::create_headers())
            .build()
            .map_err(|e| WatchError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client, url })
    }

    fn create_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// GET the quote URL for `itinerary`
    pub async fn get_quotes(&self, itinerary: &Itinerary) -> Result<Value, ApiError> {
        let response = self
            .http_client
            .get(&self.url)
            .query(&itinerary.as_pairs())
            .send()
            .await
            .map_err(|e| ApiError::RequestError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status.as_u16(), body_text);
            warn!("Quote request failed: {}", err);
            return Err(err);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::DeserializationError(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl PriceSource for QuoteApiClient {
    async fn fetch_current_prices(&self, itinerary: &Itinerary) -> Result<Map<String, Value>, WatchError> {
        debug!("Requesting quotes from {}", self.url);
        let body = self.get_quotes(itinerary).await?;
        expect_price_object(body)
    }
}
