//! Resampling of irregular recharge events onto a uniform grid.
//!
//! Buckets are labelled by their start, aligned to the epoch (UTC midnight
//! for daily buckets). Each bucket takes the value of the first event at or
//! after its label, so gaps are filled from the future ("backfill"), never
//! carried forward from the past.

use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::config::Frequency;
use crate::model::{RechargeError, RechargePoint, RechargeSeries};

/// Upper bound on the number of buckets a single resample may produce.
pub const MAX_BUCKETS: i64 = 10_000_000;

fn bucket_start(time: DateTime<Utc>, step: Duration) -> Result<DateTime<Utc>, RechargeError> {
    time.duration_trunc(step).map_err(|e| {
        RechargeError::InvalidConfiguration(format!("cannot align {} to buckets of {}: {}", time, step, e))
    })
}

/// Resamples time-ordered `points` to `freq` with look-ahead backfill.
pub fn resample_backfill(
    points: &[RechargePoint],
    freq: Frequency,
) -> Result<RechargeSeries, RechargeError> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(RechargeError::InsufficientData(
            "no recharge values to resample".to_string(),
        ));
    };

    let step = freq.step();
    let start = bucket_start(first.time, step)?;
    let end = bucket_start(last.time, step)?;

    let step_ns = step.num_nanoseconds().unwrap_or(i64::MAX);
    let buckets = (end - start)
        .num_nanoseconds()
        .map(|span| span / step_ns + 1)
        .filter(|&n| n <= MAX_BUCKETS)
        .ok_or_else(|| {
            RechargeError::InvalidConfiguration(format!(
                "resampling {} .. {} at {} frequency exceeds {} buckets",
                first.time, last.time, freq, MAX_BUCKETS
            ))
        })?;

    let mut resampled = Vec::with_capacity(buckets as usize);
    let mut next = 0;
    for k in 0..buckets {
        let label = start + Duration::nanoseconds(k * step_ns);
        while next + 1 < points.len() && points[next].time < label {
            next += 1;
        }
        resampled.push(RechargePoint {
            time: label,
            value: points[next].value,
        });
    }

    Ok(RechargeSeries {
        freq,
        points: resampled,
    })
}

/// Sets negative bucket values to zero, returning how many were clipped.
pub fn clip_negative(series: &mut RechargeSeries) -> usize {
    let mut clipped = 0;
    for point in series.points.iter_mut().filter(|p| p.value < 0.0) {
        point.value = 0.0;
        clipped += 1;
    }
    clipped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, d, h, 0, 0).unwrap()
    }

    fn point(time: DateTime<Utc>, value: f64) -> RechargePoint {
        RechargePoint { time, value }
    }

    #[test]
    fn test_daily_events_resample_without_gaps() {
        let points: Vec<RechargePoint> = (2..=10).map(|d| point(at(d, 0), 0.1)).collect();
        let series = resample_backfill(&points, Frequency::Daily).unwrap();

        assert_eq!(series.len(), 9);
        assert_eq!(series.points[0].time, at(2, 0));
        assert_eq!(series.points[8].time, at(10, 0));
        assert!(series.points.windows(2).all(|w| w[1].time - w[0].time == Duration::days(1)));
    }

    #[test]
    fn test_gaps_are_filled_from_the_next_event() {
        let points = vec![point(at(1, 0), 1.0), point(at(4, 0), 4.0)];
        let series = resample_backfill(&points, Frequency::Daily).unwrap();

        assert_eq!(series.values(), vec![1.0, 4.0, 4.0, 4.0], "days 2 and 3 take day 4's value");
    }

    #[test]
    fn test_sub_bucket_events_use_first_event_at_or_after_label() {
        let points = vec![
            point(at(1, 6), 1.0),
            point(at(1, 18), 2.0),
            point(at(3, 12), 3.0),
        ];
        let series = resample_backfill(&points, Frequency::Daily).unwrap();

        assert_eq!(series.times(), vec![at(1, 0), at(2, 0), at(3, 0)]);
        assert_eq!(series.values(), vec![1.0, 3.0, 3.0]);
    }

    #[test]
    fn test_hourly_buckets_align_to_the_hour() {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 5, 30, 0).unwrap();
        let points = vec![point(t, 1.0), point(t + Duration::hours(2), 2.0)];
        let series = resample_backfill(&points, Frequency::Hourly).unwrap();

        assert_eq!(series.times(), vec![at(1, 5), at(1, 6), at(1, 7)]);
        assert_eq!(series.values(), vec![1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_single_event_yields_single_bucket() {
        let series = resample_backfill(&[point(at(5, 13), 0.3)], Frequency::Daily).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.points[0].time, at(5, 0));
    }

    #[test]
    fn test_empty_input_is_insufficient_data() {
        let result = resample_backfill(&[], Frequency::Daily);
        assert!(matches!(result, Err(RechargeError::InsufficientData(_))));
    }

    #[test]
    fn test_too_many_buckets_is_rejected() {
        let points = vec![point(at(1, 0), 1.0), point(at(2, 0), 1.0)];
        let result = resample_backfill(&points, Frequency::Nanosecond);
        assert!(
            matches!(result, Err(RechargeError::InvalidConfiguration(_))),
            "a day at nanosecond resolution is far beyond the bucket limit"
        );
    }

    #[test]
    fn test_clip_negative_zeroes_only_negative_values() {
        let points = vec![point(at(1, 0), -0.5), point(at(2, 0), 0.0), point(at(3, 0), 0.2)];
        let mut series = resample_backfill(&points, Frequency::Daily).unwrap();

        assert_eq!(clip_negative(&mut series), 1);
        assert_eq!(series.values(), vec![0.0, 0.0, 0.2]);
    }
}
