//! Event extraction: change intervals, fall rates and candidate rise events.
//!
//! Every function here is pure. Intervals are rebuilt from the series on each
//! call and only ever span two consecutive samples.

use crate::config::RiseRule;
use crate::logging::{self, Component};
use crate::model::{ChangeInterval, FallRate, RechargeError, Series};

/// Δh for every consecutive pair of samples, `len(series) - 1` intervals.
///
/// A single-sample series yields no intervals.
pub fn change_intervals(series: &Series) -> Vec<ChangeInterval> {
    series
        .samples()
        .windows(2)
        .enumerate()
        .map(|(i, pair)| ChangeInterval::between(i, &pair[0], &pair[1]))
        .collect()
}

/// Rates of decline, Δh/Δt in units per day, for falling intervals only.
///
/// Fails with `InsufficientData` when the series has fewer than two samples,
/// since no rate is defined. A series without falls yields an empty vector.
pub fn fall_rates(series: &Series) -> Result<Vec<FallRate>, RechargeError> {
    if series.len() < 2 {
        return Err(RechargeError::InsufficientData(format!(
            "at least 2 samples are needed to compute fall rates, got {}",
            series.len()
        )));
    }

    Ok(change_intervals(series)
        .into_iter()
        .map(|interval| FallRate {
            elevation: interval.right_elevation,
            rate: interval.dh / interval.dt_days(),
            interval,
        })
        .filter(|fall| fall.rate < 0.0)
        .collect())
}

/// Intervals selected as candidate recharge events under `rule`.
///
/// `Rises` keeps strictly positive Δh; `All` keeps every interval. An empty
/// selection is an `InsufficientData` failure, never an empty result.
pub fn select_event_intervals(
    series: &Series,
    rule: RiseRule,
) -> Result<Vec<ChangeInterval>, RechargeError> {
    let intervals = change_intervals(series);
    let total = intervals.len();

    let selected: Vec<ChangeInterval> = match rule {
        RiseRule::Rises => intervals.into_iter().filter(|i| i.dh > 0.0).collect(),
        RiseRule::All => intervals,
    };

    if selected.is_empty() {
        return Err(RechargeError::InsufficientData(format!(
            "no recharge events found with rise rule '{}' in {} intervals; \
             check the water table data and the rise rule",
            rule, total
        )));
    }

    logging::debug(
        Component::Events,
        series.name(),
        &format!("{} of {} intervals selected with rule '{}'", selected.len(), total, rule),
    );

    Ok(selected)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
