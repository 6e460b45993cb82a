//! Price history models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{Observation, KNOWN_CATEGORIES};
use crate::utils::errors::WatchError;

/// All observations ever recorded, ordered by timestamp ascending.
///
/// Timestamps are unique. The lowest price seen per category is kept up to
/// date on every insert so drop detection never rescans the whole history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    observations: Vec<Observation>,
    minimums: BTreeMap<String, u64>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from observations in any order.
    pub fn from_observations<I>(observations: I) -> Result<Self, WatchError>
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut history = Self::new();
        for observation in observations {
            history.insert(observation)?;
        }
        Ok(history)
    }

    /// Insert an observation at its timestamp position.
    ///
    /// A timestamp collision is rejected before anything is touched, so the
    /// history is unchanged on error.
    pub fn insert(&mut self, observation: Observation) -> Result<(), WatchError> {
        let position = match self
            .observations
            .binary_search_by_key(&observation.timestamp(), |o| o.timestamp())
        {
            Ok(_) => return Err(WatchError::DuplicateTimestamp(observation.timestamp())),
            Err(position) => position,
        };

        for (category, &price) in observation.prices() {
            self.minimums
                .entry(category.clone())
                .and_modify(|min| *min = (*min).min(price))
                .or_insert(price);
        }
        self.observations.insert(position, observation);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    pub fn latest(&self) -> Option<&Observation> {
        self.observations.last()
    }

    /// Lowest price ever recorded for `category`, if it was ever quoted.
    pub fn minimum(&self, category: &str) -> Option<u64> {
        self.minimums.get(category).copied()
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.observations
            .binary_search_by_key(&timestamp, |o| o.timestamp())
            .is_ok()
    }

    /// Column order for the persisted table and the chart legend: known
    /// categories first, then the rest in order of first appearance.
    pub fn categories(&self) -> Vec<String> {
        let mut columns: Vec<String> = KNOWN_CATEGORIES
            .iter()
            .filter(|c| self.minimums.contains_key(**c))
            .map(|c| c.to_string())
            .collect();

        for observation in &self.observations {
            for category in observation.prices().keys() {
                if !columns.contains(category) {
                    columns.push(category.clone());
                }
            }
        }
        columns
    }

    /// Every recorded (timestamp, price) pair for one category.
    pub fn series(&self, category: &str) -> Vec<(DateTime<Utc>, u64)> {
        self.observations
            .iter()
            .filter_map(|o| o.price(category).map(|p| (o.timestamp(), p)))
            .collect()
    }
}
