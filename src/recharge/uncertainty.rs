//! Specific-yield uncertainty bands.
//!
//! The rise events are computed once; only the scaling and resampling steps
//! are repeated for the lower and upper yields.

use serde::Serialize;

use crate::config::{Frequency, SpecificYieldUncertainty};
use crate::model::{RechargeError, RechargeSeries, RiseEvent};

use super::recharge_from_rises;

/// Mean, lower and upper recharge series for a specific-yield range.
///
/// The range is resolved against the point estimate here, so a band that
/// leaves `[0, 1]` fails only when bands are requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RechargeBands {
    pub sy_mean: f64,
    pub sy_lower: f64,
    pub sy_upper: f64,
    pub mean: RechargeSeries,
    pub lower: RechargeSeries,
    pub upper: RechargeSeries,
}

pub fn recharge_bands(
    rises: &[RiseEvent],
    specific_yield: f64,
    uncertainty: SpecificYieldUncertainty,
    freq: Frequency,
    series: Option<&str>,
) -> Result<RechargeBands, RechargeError> {
    let (sy_lower, sy_upper) = uncertainty.bounds(specific_yield)?;

    Ok(RechargeBands {
        sy_mean: specific_yield,
        sy_lower,
        sy_upper,
        mean: recharge_from_rises(rises, specific_yield, freq, series)?,
        lower: recharge_from_rises(rises, sy_lower, freq, series)?,
        upper: recharge_from_rises(rises, sy_upper, freq, series)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeInterval;
    use crate::model::Sample;
    use chrono::{Duration, TimeZone, Utc};

    fn rises() -> Vec<RiseEvent> {
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        [(0, 1.0), (2, 0.5)]
            .iter()
            .map(|&(i, rise)| {
                let left = Sample::new(t0 + Duration::days(i), 10.0);
                let right = Sample::new(t0 + Duration::days(i + 1), 10.0 + rise);
                RiseEvent {
                    interval: ChangeInterval::between(i as usize, &left, &right),
                    left_hand: 10.0,
                    rise,
                }
            })
            .collect()
    }

    #[test]
    fn test_fractional_bands_bracket_the_mean() {
        let bands = recharge_bands(
            &rises(),
            0.2,
            SpecificYieldUncertainty::Fraction(0.1),
            Frequency::Daily,
            Some("MW-1"),
        )
        .unwrap();

        assert!((bands.sy_lower - 0.18).abs() < 1e-12);
        assert!((bands.sy_upper - 0.22).abs() < 1e-12);
        assert_eq!(bands.mean.len(), bands.lower.len());
        assert_eq!(bands.mean.len(), bands.upper.len());
        for ((m, l), u) in bands.mean.points.iter().zip(&bands.lower.points).zip(&bands.upper.points) {
            assert_eq!(m.time, l.time);
            assert!(l.value <= m.value && m.value <= u.value);
        }
        assert!((bands.mean.points[0].value - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_bounds_are_used_verbatim() {
        let bands = recharge_bands(
            &rises(),
            0.1,
            SpecificYieldUncertainty::Bounds(0.05, 0.3),
            Frequency::Daily,
            Some("MW-1"),
        )
        .unwrap();

        assert_eq!(bands.sy_lower, 0.05);
        assert_eq!(bands.sy_upper, 0.3);
        assert!((bands.upper.points[0].value - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_bounds_are_rejected() {
        let result = recharge_bands(
            &rises(),
            0.1,
            SpecificYieldUncertainty::Bounds(0.3, 0.05),
            Frequency::Daily,
            Some("MW-1"),
        );
        assert!(matches!(result, Err(RechargeError::InvalidConfiguration(_))));
    }
}
