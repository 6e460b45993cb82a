use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::api::PriceSource;
use crate::config::WatchConfig;
use crate::models::{Observation, Report};
use crate::services::chart_service;
use crate::services::drop_service;
use crate::services::history_service::HistoryStore;
use crate::services::notify_service::{Notification, Notifier};
use crate::utils::{extract_clean_error, WatchError};

lazy_static! {
    // One cycle at a time touches the history file.
    static ref CYCLE_LOCK: Mutex<()> = Mutex::new(());
}

/// What one polling cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub timestamp: DateTime<Utc>,
    pub observations: usize,
    pub report: Report,
    pub chart_written: bool,
    pub notified: bool,
}

/// Fetch current prices and run them through the history.
///
/// Fetch errors surface before anything is written.
pub async fn run_cycle(
    config: &WatchConfig,
    source: &dyn PriceSource,
    notifier: &dyn Notifier,
) -> Result<CycleOutcome, WatchError> {
    let _guard = CYCLE_LOCK.lock().await;

    info!("Fetching prices for {}", config.itinerary.city);
    let raw = source.fetch_current_prices(&config.itinerary).await?;
    ingest(config, &raw, Utc::now(), notifier).await
}

/// Validate, append, persist, detect, then chart and notify.
///
/// The new observation is durable once this returns `Ok`. Chart and
/// notification failures are logged and do not fail the cycle.
pub async fn ingest(
    config: &WatchConfig,
    raw: &Map<String, Value>,
    timestamp: DateTime<Utc>,
    notifier: &dyn Notifier,
) -> Result<CycleOutcome, WatchError> {
    let observation = Observation::from_raw(timestamp, raw)?;
    debug!("Observed {:?} at {}", observation.prices(), observation.timestamp());

    let store = HistoryStore::new(&config.history_path);
    let history_before = store.load()?;
    let history = store.append(&history_before, observation.clone())?;
    store.persist(&history)?;

    let report = drop_service::detect(&history_before, &observation);
    let first_run = history_before.is_empty();

    let mut outcome = CycleOutcome {
        timestamp: observation.timestamp(),
        observations: history.len(),
        report,
        chart_written: false,
        notified: false,
    };

    if first_run {
        info!("First observation recorded, nothing to compare against yet");
        return Ok(outcome);
    }

    let chart = match &config.chart_path {
        Some(path) => {
            match chart_service::render_chart(
                &history,
                &format!("Rental prices in {}", config.itinerary.city),
                chart_service::DEFAULT_WIDTH,
                chart_service::DEFAULT_HEIGHT,
            )
            .and_then(|png| chart_service::save_chart(path, &png).map(|_| png))
            {
                Ok(png) => {
                    outcome.chart_written = true;
                    Some(png)
                }
                Err(e) => {
                    warn!("Skipping chart: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    if outcome.report.is_empty() {
        info!("No price drops ({} observations)", outcome.observations);
        return Ok(outcome);
    }

    info!("{} categories dropped below their minimum", outcome.report.len());
    let notification = Notification::new(config.subject(), outcome.report.clone(), chart);
    match notifier.notify(&notification).await {
        Ok(()) => outcome.notified = true,
        Err(e) => warn!("Notification failed: {}", extract_clean_error(&e.to_string())),
    }

    Ok(outcome)
}

/// Run cycles on the configured interval until Ctrl-C.
///
/// A failed cycle is logged and the next tick goes ahead; nothing is retried
/// in between.
pub async fn run_forever(
    config: &WatchConfig,
    source: &dyn PriceSource,
    notifier: &dyn Notifier,
) -> Result<(), WatchError> {
    let period = config
        .interval
        .ok_or_else(|| WatchError::Config("no poll interval configured".to_string()))?;

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Polling every {}s", period.as_secs());

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }

        match run_cycle(config, source, notifier).await {
            Ok(outcome) => debug!("Cycle finished: {:?}", outcome),
            Err(e) if e.is_transient() => warn!("Cycle skipped: {}", e),
            Err(e) => error!("Cycle failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_itinerary;
    use crate::config::SourceConfig;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: StdMutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), WatchError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notification: &Notification) -> Result<(), WatchError> {
            Err(WatchError::Notify("smtp down".to_string()))
        }
    }

    struct FixedSource(Result<Value, String>);

    #[async_trait]
    impl PriceSource for FixedSource {
        async fn fetch_current_prices(
            &self,
            _itinerary: &crate::config::Itinerary,
        ) -> Result<Map<String, Value>, WatchError> {
            match &self.0 {
                Ok(value) => Ok(value.as_object().cloned().unwrap()),
                Err(msg) => Err(WatchError::Fetch(msg.clone())),
            }
        }
    }

    fn test_config() -> (WatchConfig, PathBuf) {
        let dir = std::env::temp_dir().join(format!("carwatch_cycle_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = WatchConfig {
            history_path: dir.join("data.csv"),
            chart_path: None,
            interval: None,
            itinerary: sample_itinerary(),
            source: SourceConfig::Scraper { program: "unused".into(), args: vec![] },
            webhook: None,
        };
        (config, dir)
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_first_cycle_records_without_notifying() {
        let (config, dir) = test_config();
        let notifier = RecordingNotifier::default();

        let outcome = ingest(&config, &raw(json!({"mini": 500})), at(0), &notifier).await.unwrap();
        assert_eq!(outcome.observations, 1);
        assert!(outcome.report.is_empty());
        assert!(!outcome.notified);
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert!(config.history_path.exists());
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_drop_is_notified_once_per_cycle() {
        let (config, dir) = test_config();
        let notifier = RecordingNotifier::default();

        ingest(&config, &raw(json!({"mini": 500})), at(0), &notifier).await.unwrap();
        let outcome = ingest(&config, &raw(json!({"mini": 480, "economy": 600})), at(1), &notifier)
            .await
            .unwrap();

        assert_eq!(outcome.observations, 2);
        assert_eq!(outcome.report.get("mini").map(|d| d.difference), Some(-20));
        assert!(outcome.report.get("economy").is_none());
        assert!(outcome.notified);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Price dropped for Aalborg");
        assert!(sent[0].chart.is_none());
        drop(sent);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_tie_does_not_notify() {
        let (config, dir) = test_config();
        let notifier = RecordingNotifier::default();

        ingest(&config, &raw(json!({"mini": 500})), at(0), &notifier).await.unwrap();
        ingest(&config, &raw(json!({"mini": 450})), at(1), &notifier).await.unwrap();
        let outcome = ingest(&config, &raw(json!({"mini": 450})), at(2), &notifier).await.unwrap();

        assert!(outcome.report.is_empty());
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_malformed_prices_are_not_stored() {
        let (config, dir) = test_config();
        let notifier = RecordingNotifier::default();

        ingest(&config, &raw(json!({"mini": 500})), at(0), &notifier).await.unwrap();
        let err = ingest(&config, &raw(json!({"mini": -1})), at(1), &notifier).await.unwrap_err();
        assert!(matches!(err, WatchError::MalformedObservation(_)));

        let history = HistoryStore::new(&config.history_path).load().unwrap();
        assert_eq!(history.len(), 1);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_duplicate_timestamp_leaves_file_untouched() {
        let (config, dir) = test_config();
        let notifier = RecordingNotifier::default();

        ingest(&config, &raw(json!({"mini": 500})), at(0), &notifier).await.unwrap();
        let before = std::fs::read_to_string(&config.history_path).unwrap();

        let err = ingest(&config, &raw(json!({"mini": 100})), at(0), &notifier).await.unwrap_err();
        assert!(matches!(err, WatchError::DuplicateTimestamp(_)));
        assert_eq!(std::fs::read_to_string(&config.history_path).unwrap(), before);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_notify_failure_keeps_observation() {
        let (config, dir) = test_config();

        ingest(&config, &raw(json!({"mini": 500})), at(0), &FailingNotifier).await.unwrap();
        let outcome = ingest(&config, &raw(json!({"mini": 400})), at(1), &FailingNotifier)
            .await
            .unwrap();

        assert!(!outcome.notified);
        assert_eq!(outcome.report.len(), 1);
        assert_eq!(HistoryStore::new(&config.history_path).load().unwrap().len(), 2);
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_fetch_error_writes_nothing() {
        let (config, dir) = test_config();
        let source = FixedSource(Err("site unavailable".to_string()));

        let err = run_cycle(&config, &source, &RecordingNotifier::default()).await.unwrap_err();
        assert!(matches!(err, WatchError::Fetch(_)));
        assert!(!config.history_path.exists());
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_run_cycle_appends_fetched_prices() {
        let (config, dir) = test_config();
        let source = FixedSource(Ok(json!({"mini": "DKK 1.250", "minibus": 3100})));

        let outcome = run_cycle(&config, &source, &RecordingNotifier::default()).await.unwrap();
        assert_eq!(outcome.observations, 1);

        let history = HistoryStore::new(&config.history_path).load().unwrap();
        assert_eq!(history.minimum("mini"), Some(1250));
        assert_eq!(history.minimum("minibus"), Some(3100));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_run_forever_requires_interval() {
        let (config, dir) = test_config();
        let source = FixedSource(Ok(json!({"mini": 1})));
        let err = run_forever(&config, &source, &RecordingNotifier::default()).await.unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
        std::fs::remove_dir_all(dir).ok();
    }
}
