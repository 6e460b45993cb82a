use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod models;
mod services;
mod utils;

use config::{parse_hour, Itinerary, RentalDate, SourceConfig, WatchConfig, WebhookConfig};
use services::{notify_service, watch_service};
use utils::WatchError;

#[derive(Parser, Debug)]
#[command(version, about = "Watch car-rental quotes for one itinerary and report price drops")]
struct Args {
    /// Country of pickup, spelled as on the booking site
    #[arg(long, env = "CARWATCH_COUNTRY")]
    country: String,

    /// City of pickup
    #[arg(long, env = "CARWATCH_CITY")]
    city: String,

    /// Pickup location
    #[arg(long, env = "CARWATCH_PICKUP")]
    pickup: String,

    /// Pickup date formatted as 6-JUNI-2022 (no 0 in front of the day)
    #[arg(long, env = "CARWATCH_PICKUP_DATE")]
    pickup_date: String,

    /// Pickup time in whole hours (e.g. 14)
    #[arg(long, env = "CARWATCH_PICKUP_TIME")]
    pickup_time: String,

    /// Dropoff date formatted as 6-JUNI-2022 (no 0 in front of the day)
    #[arg(long, env = "CARWATCH_DROPOFF_DATE")]
    dropoff_date: String,

    /// Dropoff time in whole hours (e.g. 14)
    #[arg(long, env = "CARWATCH_DROPOFF_TIME")]
    dropoff_time: String,

    /// Quote endpoint returning a JSON object of prices per category
    #[arg(long, env = "CARWATCH_QUOTE_URL", conflicts_with = "scraper")]
    quote_url: Option<String>,

    /// Timeout for the quote endpoint, in seconds
    #[arg(long, env = "CARWATCH_QUOTE_TIMEOUT", default_value = "60")]
    quote_timeout_secs: u64,

    /// Scraper program printing a JSON object of prices on stdout
    #[arg(long, env = "CARWATCH_SCRAPER")]
    scraper: Option<String>,

    /// Extra argument for the scraper (repeatable)
    #[arg(long = "scraper-arg", allow_hyphen_values = true)]
    scraper_args: Vec<String>,

    /// Price history CSV
    #[arg(long, env = "CARWATCH_HISTORY", default_value = "data.csv")]
    history: PathBuf,

    /// Where the price chart PNG is written
    #[arg(long, env = "CARWATCH_CHART", default_value = "prices.png")]
    chart: PathBuf,

    /// Do not render a chart
    #[arg(long)]
    no_chart: bool,

    /// Poll every N seconds; runs a single cycle when absent
    #[arg(long, env = "CARWATCH_INTERVAL")]
    interval_secs: Option<u64>,

    /// Webhook receiving drop notifications; drops are only logged without it
    #[arg(long, env = "CARWATCH_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Bearer token for the webhook
    #[arg(long, env = "CARWATCH_WEBHOOK_TOKEN", hide_env_values = true)]
    webhook_token: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<WatchConfig, WatchError> {
        let itinerary = Itinerary {
            country: self.country,
            city: self.city,
            pickup_location: self.pickup,
            pickup_date: self.pickup_date.parse::<RentalDate>()?,
            pickup_hour: parse_hour(&self.pickup_time)?,
            dropoff_date: self.dropoff_date.parse::<RentalDate>()?,
            dropoff_hour: parse_hour(&self.dropoff_time)?,
        };

        let source = match (self.quote_url, self.scraper) {
            (Some(url), None) => SourceConfig::QuoteApi {
                url,
                timeout: Duration::from_secs(self.quote_timeout_secs),
            },
            (None, Some(program)) => SourceConfig::Scraper {
                program,
                args: self.scraper_args,
            },
            _ => {
                return Err(WatchError::Config(
                    "exactly one of --quote-url or --scraper is required".to_string(),
                ))
            }
        };

        let config = WatchConfig {
            history_path: self.history,
            chart_path: (!self.no_chart).then_some(self.chart),
            interval: self.interval_secs.map(Duration::from_secs),
            itinerary,
            source,
            webhook: self.webhook_url.map(|url| WebhookConfig {
                url,
                token: self.webhook_token,
            }),
        };
        config.validate()?;
        Ok(config)
    }
}

async fn run(config: WatchConfig) -> Result<(), WatchError> {
    let source = api::source_from_config(&config.source)?;
    let notifier = notify_service::notifier_from_config(config.webhook.as_ref());

    if config.interval.is_some() {
        return watch_service::run_forever(&config, source.as_ref(), notifier.as_ref()).await;
    }

    let outcome = watch_service::run_cycle(&config, source.as_ref(), notifier.as_ref()).await?;
    info!(
        "Recorded prices at {} ({} observations, {} drops, chart {}, notified {})",
        outcome.timestamp,
        outcome.observations,
        outcome.report.len(),
        if outcome.chart_written { "written" } else { "skipped" },
        outcome.notified
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("carwatch=debug,reqwest=warn")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("🚗 Starting carwatch v{}", env!("CARGO_PKG_VERSION"));

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    info!(
        "Watching {} / {} from {} {}:00 to {} {}:00",
        config.itinerary.city,
        config.itinerary.pickup_location,
        config.itinerary.pickup_date,
        config.itinerary.pickup_hour,
        config.itinerary.dropoff_date,
        config.itinerary.dropoff_hour
    );

    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
