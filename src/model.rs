//! Core data types for the water-table fluctuation recharge estimator.
//!
//! This module defines the shared domain model imported by all other modules:
//! the validated input series, the intervals derived from it, the recharge
//! output, and the crate-wide error type. It contains no numerical logic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Frequency;
use crate::logging::FailureType;

/// Seconds in one day, used to normalise rates to units per day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

// ---------------------------------------------------------------------------
// Input series
// ---------------------------------------------------------------------------

/// A single water-table measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: DateTime<Utc>,
    pub elevation: f64,
}

impl Sample {
    pub fn new(time: DateTime<Utc>, elevation: f64) -> Self {
        Self { time, elevation }
    }
}

/// An ordered, validated water-table series.
///
/// Construction guarantees the series is non-empty, that timestamps are
/// strictly increasing and that every elevation is finite. Core components
/// rely on these guarantees and do not re-check them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    name: Option<String>,
    samples: Vec<Sample>,
}

impl Series {
    /// Validates and wraps a list of samples.
    pub fn new(samples: Vec<Sample>) -> Result<Self, RechargeError> {
        if samples.is_empty() {
            return Err(RechargeError::InvalidInput(
                "the series is empty, provide at least one sample".to_string(),
            ));
        }

        if let Some((i, s)) = samples
            .iter()
            .enumerate()
            .find(|(_, s)| !s.elevation.is_finite())
        {
            return Err(RechargeError::InvalidInput(format!(
                "elevation at position {} ({}) is not finite: {}",
                i, s.time, s.elevation
            )));
        }

        if let Some(i) = samples.windows(2).position(|w| w[1].time <= w[0].time) {
            return Err(RechargeError::InvalidInput(format!(
                "timestamps must be strictly increasing, but {} follows {}",
                samples[i + 1].time,
                samples[i].time
            )));
        }

        Ok(Self { name: None, samples })
    }

    /// Builds a series from `(timestamp, elevation)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, RechargeError>
    where
        I: IntoIterator<Item = (DateTime<Utc>, f64)>,
    {
        Self::new(pairs.into_iter().map(|(t, h)| Sample::new(t, h)).collect())
    }

    /// Attaches a label used in log lines and reports.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false` for a validated series; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> &Sample {
        &self.samples[0]
    }

    pub fn last(&self) -> &Sample {
        &self.samples[self.samples.len() - 1]
    }

    /// Smallest and largest elevation in the series.
    pub fn elevation_range(&self) -> (f64, f64) {
        self.samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.elevation), hi.max(s.elevation))
        })
    }

    /// Returns the samples with `tmin <= time <= tmax`.
    ///
    /// Missing bounds default to the start and end of the series. Fails with
    /// `InsufficientData` if the window holds no samples.
    pub fn window(
        &self,
        tmin: Option<DateTime<Utc>>,
        tmax: Option<DateTime<Utc>>,
    ) -> Result<Series, RechargeError> {
        let tmin = tmin.unwrap_or(self.first().time);
        let tmax = tmax.unwrap_or(self.last().time);

        let samples: Vec<Sample> = self
            .samples
            .iter()
            .filter(|s| s.time >= tmin && s.time <= tmax)
            .copied()
            .collect();

        if samples.is_empty() {
            return Err(RechargeError::InsufficientData(format!(
                "no samples between {} and {}",
                tmin, tmax
            )));
        }

        Ok(Series { name: self.name.clone(), samples })
    }
}

// ---------------------------------------------------------------------------
// Derived intervals
// ---------------------------------------------------------------------------

/// The span between two consecutive samples, `(left, right]`.
///
/// `index` is the position of the left sample in the source series; the right
/// sample is always `index + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChangeInterval {
    pub index: usize,
    pub left: DateTime<Utc>,
    pub right: DateTime<Utc>,
    pub left_elevation: f64,
    pub right_elevation: f64,
    /// `right_elevation - left_elevation`
    pub dh: f64,
}

impl ChangeInterval {
    /// Builds the interval between two consecutive samples.
    pub fn between(index: usize, left: &Sample, right: &Sample) -> Self {
        Self {
            index,
            left: left.time,
            right: right.time,
            left_elevation: left.elevation,
            right_elevation: right.elevation,
            dh: right.elevation - left.elevation,
        }
    }

    pub fn dt(&self) -> Duration {
        self.right - self.left
    }

    /// Elapsed time in (fractional) days.
    pub fn dt_days(&self) -> f64 {
        let dt = self.dt();
        match dt.num_nanoseconds() {
            Some(ns) => ns as f64 / (SECONDS_PER_DAY * 1e9),
            None => dt.num_seconds() as f64 / SECONDS_PER_DAY,
        }
    }
}

/// Rate of decline over a falling interval, in elevation units per day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FallRate {
    pub interval: ChangeInterval,
    /// Elevation the rate is paired with when fitting (the right endpoint).
    pub elevation: f64,
    /// Always strictly negative.
    pub rate: f64,
}

/// A change interval with a strictly positive net rise after correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiseEvent {
    pub interval: ChangeInterval,
    /// Elevation the rise is measured from: the raw left elevation, or the
    /// recession-extrapolated one.
    pub left_hand: f64,
    /// `interval.right_elevation - left_hand`, always > 0.
    pub rise: f64,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One resampled recharge bucket, labelled by the bucket start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RechargePoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// Uniformly spaced, non-negative recharge series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RechargeSeries {
    pub freq: Frequency,
    pub points: Vec<RechargePoint>,
}

impl RechargeSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn times(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.time).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Sum of all bucket values.
    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by the recharge pipeline. None are retried or defaulted.
#[derive(Debug, Clone, PartialEq)]
pub enum RechargeError {
    /// The input series is malformed (empty, unordered, non-finite values).
    InvalidInput(String),
    /// Too few samples, falling observations, or qualifying events.
    InsufficientData(String),
    /// Rate estimation or extrapolation was requested before a fit and no
    /// parameters were supplied.
    ModelNotFitted,
    /// Out-of-range or unrecognised configuration value.
    InvalidConfiguration(String),
    /// The recession optimizer stopped without converging.
    FitDivergence { iterations: u64, status: String },
    /// A result could not be encoded for export.
    Serialization(String),
}

impl RechargeError {
    /// Whether the failure follows from the data itself or points at a
    /// configuration problem or misuse.
    pub fn failure_type(&self) -> FailureType {
        match self {
            RechargeError::InsufficientData(_) => FailureType::Expected,
            RechargeError::InvalidInput(_)
            | RechargeError::ModelNotFitted
            | RechargeError::InvalidConfiguration(_)
            | RechargeError::FitDivergence { .. }
            | RechargeError::Serialization(_) => FailureType::Unexpected,
        }
    }
}

impl std::fmt::Display for RechargeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RechargeError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            RechargeError::InsufficientData(msg) => write!(f, "Insufficient data: {}", msg),
            RechargeError::ModelNotFitted => write!(
                f,
                "Recession model not fitted: fit the model or supply both parameters a and b"
            ),
            RechargeError::InvalidConfiguration(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            RechargeError::FitDivergence { iterations, status } => write!(
                f,
                "Recession fit did not converge after {} iterations: {}",
                iterations, status
            ),
            RechargeError::Serialization(msg) => write!(f, "Serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for RechargeError {}

impl From<argmin::core::Error> for RechargeError {
    fn from(err: argmin::core::Error) -> Self {
        RechargeError::FitDivergence {
            iterations: 0,
            status: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
