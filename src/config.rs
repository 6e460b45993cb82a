//! Runtime configuration, passed explicitly to every collaborator.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::utils::errors::WatchError;

/// A pickup or dropoff day as the booking site's date picker shows it,
/// written `D-MONTHNAME-YYYY` (e.g. `6-JUNI-2022`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalDate {
    pub day: u8,
    pub month: String,
    pub year: u16,
}

impl FromStr for RentalDate {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('-').collect();
        let [day, month, year] = parts.as_slice() else {
            return Err(WatchError::Config(format!(
                "date '{}' must look like 6-JUNI-2022",
                s
            )));
        };

        // The date picker lists days without padding; "06" never matches.
        if day.starts_with('0') {
            return Err(WatchError::Config(format!(
                "day in '{}' cannot start with 0",
                s
            )));
        }
        let day: u8 = day
            .parse()
            .ok()
            .filter(|d| (1..=31).contains(d))
            .ok_or_else(|| WatchError::Config(format!("invalid day in '{}'", s)))?;

        if month.is_empty() || !month.chars().all(|c| c.is_alphabetic()) {
            return Err(WatchError::Config(format!(
                "month in '{}' must be a name such as JUNI",
                s
            )));
        }

        let year: u16 = year
            .parse()
            .ok()
            .filter(|_| year.len() == 4)
            .ok_or_else(|| WatchError::Config(format!("invalid year in '{}'", s)))?;

        Ok(Self {
            day,
            month: month.to_uppercase(),
            year,
        })
    }
}

impl fmt::Display for RentalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.day, self.month, self.year)
    }
}

/// Parse a whole hour of the day, e.g. `14`.
pub fn parse_hour(s: &str) -> Result<u8, WatchError> {
    s.trim()
        .parse::<u8>()
        .ok()
        .filter(|h| *h < 24)
        .ok_or_else(|| WatchError::Config(format!("'{}' is not a whole hour between 0 and 23", s)))
}

/// The fixed trip whose prices are watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Itinerary {
    pub country: String,
    pub city: String,
    pub pickup_location: String,
    pub pickup_date: RentalDate,
    pub pickup_hour: u8,
    pub dropoff_date: RentalDate,
    pub dropoff_hour: u8,
}

impl Itinerary {
    pub fn validate(&self) -> Result<(), WatchError> {
        for (name, value) in [
            ("country", &self.country),
            ("city", &self.city),
            ("pickup location", &self.pickup_location),
        ] {
            if value.trim().is_empty() {
                return Err(WatchError::Config(format!("{} cannot be empty", name)));
            }
        }
        // Month names are the site's own, so only the years are comparable.
        if self.pickup_date.year > self.dropoff_date.year {
            return Err(WatchError::Config(format!(
                "dropoff year {} is earlier than pickup year {}",
                self.dropoff_date.year, self.pickup_date.year
            )));
        }
        Ok(())
    }

    /// Query/argument pairs handed to price sources.
    pub fn as_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("country", self.country.clone()),
            ("city", self.city.clone()),
            ("pickup", self.pickup_location.clone()),
            ("pickupdate", self.pickup_date.to_string()),
            ("pickuptime", self.pickup_hour.to_string()),
            ("dropoffdate", self.dropoff_date.to_string()),
            ("dropofftime", self.dropoff_hour.to_string()),
        ]
    }
}

/// Where current prices come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// HTTP endpoint answering with a JSON `{category: price}` object.
    QuoteApi { url: String, timeout: Duration },
    /// External scraper program printing the JSON object on stdout.
    Scraper { program: String, args: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub history_path: PathBuf,
    /// `None` disables chart rendering.
    pub chart_path: Option<PathBuf>,
    /// `None` runs a single cycle.
    pub interval: Option<Duration>,
    pub itinerary: Itinerary,
    pub source: SourceConfig,
    pub webhook: Option<WebhookConfig>,
}

impl WatchConfig {
    pub fn validate(&self) -> Result<(), WatchError> {
        self.itinerary.validate()?;

        if let Some(interval) = self.interval {
            if interval.is_zero() {
                return Err(WatchError::Config("poll interval must be positive".to_string()));
            }
        }

        match &self.source {
            SourceConfig::QuoteApi { url, .. } if !url.starts_with("http") => {
                return Err(WatchError::Config(format!("quote url '{}' is not http(s)", url)))
            }
            SourceConfig::Scraper { program, .. } if program.trim().is_empty() => {
                return Err(WatchError::Config("scraper program cannot be empty".to_string()))
            }
            _ => {}
        }

        if self.history_path.as_os_str().is_empty() {
            return Err(WatchError::Config("history path cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Subject line used for drop notifications.
    pub fn subject(&self) -> String {
        format!("Price dropped for {}", self.itinerary.city)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_itinerary() -> Itinerary {
        Itinerary {
            country: "Danmark".to_string(),
            city: "Aalborg".to_string(),
            pickup_location: "Lufthavn".to_string(),
            pickup_date: "6-JUNI-2022".parse().unwrap(),
            pickup_hour: 14,
            dropoff_date: "20-JUNI-2022".parse().unwrap(),
            dropoff_hour: 10,
        }
    }

    #[test]
    fn test_rental_date_parses() {
        let date: RentalDate = "6-juni-2022".parse().unwrap();
        assert_eq!(date.day, 6);
        assert_eq!(date.month, "JUNI");
        assert_eq!(date.year, 2022);
        assert_eq!(date.to_string(), "6-JUNI-2022");
    }

    #[test]
    fn test_rental_date_rejects_leading_zero() {
        assert!("06-JUNI-2022".parse::<RentalDate>().is_err());
    }

    #[test]
    fn test_rental_date_rejects_numeric_month() {
        assert!("6-06-2022".parse::<RentalDate>().is_err());
    }

    #[test]
    fn test_rental_date_rejects_bad_shape() {
        for bad in ["6-JUNI", "6/JUNI/2022", "32-JUNI-2022", "6-JUNI-22", ""] {
            assert!(bad.parse::<RentalDate>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_parse_hour() {
        assert_eq!(parse_hour("14").unwrap(), 14);
        assert!(parse_hour("24").is_err());
        assert!(parse_hour("2pm").is_err());
    }

    #[test]
    fn test_itinerary_validation() {
        let mut itinerary = sample_itinerary();
        assert!(itinerary.validate().is_ok());

        itinerary.city = " ".to_string();
        assert!(itinerary.validate().is_err());
    }

    #[test]
    fn test_itinerary_rejects_earlier_dropoff_year() {
        let mut itinerary = sample_itinerary();
        itinerary.dropoff_date = "2-JANUAR-2021".parse().unwrap();
        let err = itinerary.validate().unwrap_err();
        assert!(err.to_string().contains("dropoff year 2021 is earlier than pickup year 2022"));
    }

    #[test]
    fn test_itinerary_pairs() {
        let pairs = sample_itinerary().as_pairs();
        assert!(pairs.contains(&("pickupdate", "6-JUNI-2022".to_string())));
        assert!(pairs.contains(&("dropofftime", "10".to_string())));
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        let config = WatchConfig {
            history_path: "data.csv".into(),
            chart_path: Some("prices.png".into()),
            interval: Some(Duration::ZERO),
            itinerary: sample_itinerary(),
            source: SourceConfig::Scraper { program: "scrape".into(), args: vec![] },
            webhook: None,
        };
        assert!(matches!(config.validate(), Err(WatchError::Config(_))));
        assert_eq!(config.subject(), "Price dropped for Aalborg");
    }
}
