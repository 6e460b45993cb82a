use crate::models::{History, Observation, PriceDrop, Report};

/// Compare a new observation against everything recorded before it.
///
/// A category drops when its new price is strictly below the lowest price
/// ever recorded for it. Categories the history has never quoted have no
/// baseline and are skipped, so an empty history always yields an empty
/// report. Pure: the same inputs always give the same report.
pub fn detect(history_before: &History, new_observation: &Observation) -> Report {
    let mut report = Report::new();

    for (category, &new_price) in new_observation.prices() {
        let Some(historical_min) = history_before.minimum(category) else {
            continue;
        };

        // Observations cap prices at MAX_PRICE, so both fit an i64.
        let difference = new_price as i64 - historical_min as i64;
        if difference < 0 {
            report.record(
                category,
                PriceDrop {
                    new_price,
                    historical_min,
                    difference,
                },
            );
        }
    }

    report
}
