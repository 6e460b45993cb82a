//! Price observation models

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde_json::{Map, Value};

use crate::utils::errors::WatchError;

/// Vehicle categories quoted by the booking site, in display order.
pub const KNOWN_CATEGORIES: [&str; 6] = [
    "mini",
    "economy",
    "medium",
    "large",
    "stationcar_suv",
    "minibus",
];

/// Highest storable price. Differences between two prices always fit an `i64`.
pub const MAX_PRICE: u64 = i64::MAX as u64;

/// One timestamped snapshot of the quoted price per category.
///
/// Prices are whole minor-currency units. An observation is never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    timestamp: DateTime<Utc>,
    prices: BTreeMap<String, u64>,
}

impl Observation {
    /// Build an observation from already validated prices.
    ///
    /// The timestamp is truncated to microseconds, the granularity the
    /// history file stores. Fails when the mapping is empty, a category
    /// name is blank or a price exceeds [`MAX_PRICE`].
    pub fn new(
        timestamp: DateTime<Utc>,
        prices: BTreeMap<String, u64>,
    ) -> Result<Self, WatchError> {
        if prices.is_empty() {
            return Err(WatchError::MalformedObservation(
                "price mapping is empty".to_string(),
            ));
        }

        let mut normalized = BTreeMap::new();
        for (category, price) in prices {
            let category = normalize_category(&category)?;
            if price > MAX_PRICE {
                return Err(WatchError::MalformedObservation(format!(
                    "price {} for '{}' is out of range",
                    price, category
                )));
            }
            if normalized.insert(category.clone(), price).is_some() {
                return Err(WatchError::MalformedObservation(format!(
                    "category '{}' is quoted twice",
                    category
                )));
            }
        }

        Ok(Self {
            timestamp: timestamp.trunc_subsecs(6),
            prices: normalized,
        })
    }

    /// Validate a raw `{category: value}` object handed over by a price source.
    ///
    /// Values may be JSON integers or the price text shown on the booking
    /// site, e.g. `"DKK 1.234"`. Anything else is refused rather than stored
    /// as a default.
    pub fn from_raw(timestamp: DateTime<Utc>, raw: &Map<String, Value>) -> Result<Self, WatchError> {
        let mut prices = BTreeMap::new();
        for (category, value) in raw {
            let price = parse_price_value(category, value)?;
            prices.insert(category.clone(), price);
        }
        Self::new(timestamp, prices)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn prices(&self) -> &BTreeMap<String, u64> {
        &self.prices
    }

    pub fn price(&self, category: &str) -> Option<u64> {
        self.prices.get(category).copied()
    }
}

fn normalize_category(category: &str) -> Result<String, WatchError> {
    let name = category.trim().to_lowercase();
    if name.is_empty() {
        return Err(WatchError::MalformedObservation(
            "category name is empty".to_string(),
        ));
    }
    if name.contains(',') || name.contains('\n') || name == "date" {
        return Err(WatchError::MalformedObservation(format!(
            "category name '{}' is not allowed",
            category
        )));
    }
    Ok(name)
}

fn parse_price_value(category: &str, value: &Value) -> Result<u64, WatchError> {
    match value {
        Value::Number(n) => {
            if let Some(price) = n.as_u64().filter(|p| *p <= MAX_PRICE) {
                Ok(price)
            } else if n.as_u64().is_some() {
                Err(WatchError::MalformedObservation(format!(
                    "price {} for '{}' is out of range",
                    n, category
                )))
            } else if n.as_i64().is_some() {
                Err(WatchError::MalformedObservation(format!(
                    "negative price {} for '{}'",
                    n, category
                )))
            } else {
                Err(WatchError::MalformedObservation(format!(
                    "price {} for '{}' is not a whole amount",
                    n, category
                )))
            }
        }
        Value::String(text) => parse_price_text(text).ok_or_else(|| {
            WatchError::MalformedObservation(format!(
                "cannot read price '{}' for '{}'",
                text, category
            ))
        }),
        other => Err(WatchError::MalformedObservation(format!(
            "non-numeric price {} for '{}'",
            other, category
        ))),
    }
}

/// Parse a quoted price such as `"DKK 1.234"` or `"1234"`.
///
/// A leading currency code is dropped. Digits may be grouped in thousands
/// with one kind of separator (`.`, `,` or a space), and every group after
/// the first must hold exactly three digits. Decimals, negatives and odd
/// groupings like `"12.50"` or `"1 2 3"` give `None`.
pub fn parse_price_text(text: &str) -> Option<u64> {
    let digits_start = text.find(|c: char| c.is_ascii_digit() || c == '-')?;
    let (prefix, amount) = text.split_at(digits_start);
    if !prefix.trim().chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let amount = amount.trim();
    let groups: Vec<&str> = match amount.chars().find(|c| !c.is_ascii_digit()) {
        None => vec![amount],
        Some(sep @ ('.' | ',' | ' ' | '\u{a0}')) => amount.split(sep).collect(),
        Some(_) => return None,
    };

    let (first, rest) = groups.split_first()?;
    let well_formed = !first.is_empty()
        && first.chars().all(|c| c.is_ascii_digit())
        && (rest.is_empty() || first.len() <= 3)
        && rest
            .iter()
            .all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()));
    if !well_formed {
        return None;
    }

    let price: u64 = groups.concat().parse().ok()?;
    (price <= MAX_PRICE).then_some(price)
}
