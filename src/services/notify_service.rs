use async_trait::async_trait;
use tracing::info;

use crate::api::WebhookClient;
use crate::config::WebhookConfig;
use crate::models::Report;
use crate::utils::errors::WatchError;

/// Everything sent out when prices drop
#[derive(Debug, Clone)]
pub struct Notification {
    pub subject: String,
    pub text: String,
    pub html: String,
    pub report: Report,
    pub chart: Option<Vec<u8>>,
}

impl Notification {
    pub fn new(subject: String, report: Report, chart: Option<Vec<u8>>) -> Self {
        Self {
            text: report.to_text(),
            html: report.to_html(),
            subject,
            report,
            chart,
        }
    }
}

/// Delivers drop notifications. Called only with a non-empty report.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), WatchError>;
}

/// Writes the drop table to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), WatchError> {
        info!("📉 {}\n{}", notification.subject, notification.text);
        Ok(())
    }
}

pub struct WebhookNotifier {
    client: WebhookClient,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            client: WebhookClient::new(config.url.clone(), config.token.clone()),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), WatchError> {
        self.client
            .post(notification)
            .await
            .map_err(|e| WatchError::Notify(e.to_string()))?;
        info!("Webhook notified: {}", notification.subject);
        Ok(())
    }
}

/// Webhook when configured, otherwise the log.
pub fn notifier_from_config(webhook: Option<&WebhookConfig>) -> Box<dyn Notifier> {
    match webhook {
        Some(config) => Box::new(WebhookNotifier::new(config)),
        None => Box::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceDrop;

    #[test]
    fn test_notification_renders_report() {
        let mut report = Report::new();
        report.record(
            "economy",
            PriceDrop {
                new_price: 590,
                historical_min: 600,
                difference: -10,
            },
        );

        let notification = Notification::new("Price dropped for Aalborg".to_string(), report, None);
        assert!(notification.text.contains("economy"));
        assert!(notification.html.contains("<td>590</td>"));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notification = Notification::new("s".to_string(), Report::new(), None);
        assert!(LogNotifier.notify(&notification).await.is_ok());
    }
}
