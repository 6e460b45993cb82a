use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client as HttpClient;
use serde::Serialize;

use super::ApiError;
use crate::services::notify_service::Notification;

/// JSON body posted to the webhook
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub subject: &'a str,
    pub text: &'a str,
    pub html: &'a str,
    pub report: &'a crate::models::Report,
    /// PNG chart, base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_png: Option<String>,
}

impl<'a> WebhookPayload<'a> {
    pub fn from_notification(notification: &'a Notification) -> Self {
        Self {
            subject: &notification.subject,
            text: &notification.text,
            html: &notification.html,
            report: &notification.report,
            chart_png: notification.chart.as_ref().map(|c| BASE64.encode(c)),
        }
    }
}

/// Posts drop notifications to an HTTP endpoint
pub struct WebhookClient {
    http_client: HttpClient,
    url: String,
    token: Option<String>,
}

impl WebhookClient {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            url,
            token,
        }
    }

    fn create_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::RequestError(format!("Failed to create auth header: {}", e)))?;
            headers.insert(AUTHORIZATION, auth_value);
        }
        Ok(headers)
    }

    /// POST the notification
    pub async fn post(&self, notification: &Notification) -> Result<(), ApiError> {
        let headers = self.create_headers()?;
        let body = WebhookPayload::from_notification(notification);

        let response = self
            .http_client
            .post(&self.url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::RequestError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), body_text));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Report;

    #[test]
    fn test_payload_encodes_chart() {
        let notification = Notification {
            subject: "Price dropped for Aalborg".to_string(),
            text: "text".to_string(),
            html: "<html></html>".to_string(),
            report: Report::new(),
            chart: Some(vec![0x89, b'P', b'N', b'G']),
        };

        let value = serde_json::to_value(WebhookPayload::from_notification(&notification)).unwrap();
        assert_eq!(value["subject"], "Price dropped for Aalborg");
        assert_eq!(value["chart_png"], "iVBORw==");
    }

    #[test]
    fn test_payload_omits_missing_chart() {
        let notification = Notification {
            subject: "s".to_string(),
            text: "t".to_string(),
            html: "h".to_string(),
            report: Report::new(),
            chart: None,
        };
        let value = serde_json::to_value(WebhookPayload::from_notification(&notification)).unwrap();
        assert!(value.get("chart_png").is_none());
    }
}
