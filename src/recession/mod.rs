//! Master recession curve (MCR).
//!
//! Models the background decline of the water table as a linear function of
//! elevation,
//!
//! ```text
//! dh/dt = -a·h + b
//! ```
//!
//! fitted to the falling sections of a series. The fitted curve is used to
//! extrapolate where the water table would have been at the end of an
//! interval had no recharge occurred.
//!
//! Submodules:
//! - `fit`: the `argmin` least-squares problem and standard errors.

pub mod fit;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::FitOptions;
use crate::events;
use crate::logging::{self, Component};
use crate::model::{ChangeInterval, FallRate, RechargeError, Series};

/// Evaluates the recession curve `-a·h + b`.
pub fn recession_rate(h: f64, a: f64, b: f64) -> f64 {
    -a * h + b
}

/// Fitted recession curve. Only ever produced by a successful fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecessionParameters {
    pub a: f64,
    pub b: f64,
    pub a_stderr: f64,
    pub b_stderr: f64,
    /// Number of falling intervals the curve was fitted to.
    pub n_observations: usize,
    /// Sum of squared residuals at the optimum.
    pub ssr: f64,
    pub iterations: u64,
}

impl RecessionParameters {
    pub fn rate(&self, h: f64) -> f64 {
        recession_rate(h, self.a, self.b)
    }
}

/// A recession curve model owned by a single analysis.
///
/// Parameters are replaced as a whole by `fit`; a failed fit leaves the
/// previous state untouched.
#[derive(Debug, Clone, Default)]
pub struct RecessionCurveModel {
    options: FitOptions,
    parameters: Option<RecessionParameters>,
    fall_rates: Vec<FallRate>,
}

impl RecessionCurveModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FitOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    pub fn parameters(&self) -> Option<&RecessionParameters> {
        self.parameters.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.parameters.is_some()
    }

    /// Falling intervals used by the last successful fit (diagnostic plots).
    pub fn fall_rates(&self) -> &[FallRate] {
        &self.fall_rates
    }

    /// Fits `(a, b)` to the fall rates within `[tmin, tmax]`.
    ///
    /// Missing bounds default to the full series. Fails with
    /// `InsufficientData` when fewer than two falls, or falls at fewer than
    /// two distinct elevations, are available, and with `FitDivergence` when
    /// the optimizer exhausts its iteration budget.
    pub fn fit(
        &mut self,
        series: &Series,
        tmin: Option<DateTime<Utc>>,
        tmax: Option<DateTime<Utc>>,
    ) -> Result<&RecessionParameters, RechargeError> {
        match self.solve(series, tmin, tmax) {
            Ok((params, falls)) => {
                logging::log_fit_summary(series.name(), &params);
                self.fall_rates = falls;
                Ok(self.parameters.insert(params))
            }
            Err(e) => {
                logging::log_failure(Component::Recession, series.name(), "Recession fit", &e);
                Err(e)
            }
        }
    }

    fn solve(
        &self,
        series: &Series,
        tmin: Option<DateTime<Utc>>,
        tmax: Option<DateTime<Utc>>,
    ) -> Result<(RecessionParameters, Vec<FallRate>), RechargeError> {
        self.options.validate()?;

        let window = series.window(tmin, tmax)?;
        let falls = events::fall_rates(&window)?;
        if falls.len() < 2 {
            return Err(RechargeError::InsufficientData(format!(
                "recession fit needs at least 2 falling intervals, found {}",
                falls.len()
            )));
        }

        let elevations: Vec<f64> = falls.iter().map(|f| f.elevation).collect();
        let rates: Vec<f64> = falls.iter().map(|f| f.rate).collect();

        let mut distinct = elevations.clone();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        if distinct.len() < 2 {
            return Err(RechargeError::InsufficientData(format!(
                "all {} falling intervals end at the same elevation {}",
                falls.len(),
                distinct[0]
            )));
        }

        let solution = fit::least_squares(&elevations, &rates, &self.options)?;
        let (a_stderr, b_stderr) = fit::standard_errors(&elevations, solution.ssr)?;

        let params = RecessionParameters {
            a: solution.a,
            b: solution.b,
            a_stderr,
            b_stderr,
            n_observations: falls.len(),
            ssr: solution.ssr,
            iterations: solution.iterations,
        };
        Ok((params, falls))
    }

    /// Evaluates `-a·h + b` with the supplied parameters, or with the fitted
    /// ones unless both `a` and `b` are given.
    pub fn estimate_rate(
        &self,
        h: f64,
        a: Option<f64>,
        b: Option<f64>,
    ) -> Result<f64, RechargeError> {
        let (a, b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                let params = self.parameters.as_ref().ok_or(RechargeError::ModelNotFitted)?;
                (params.a, params.b)
            }
        };
        Ok(recession_rate(h, a, b))
    }

    /// Expected elevation at the right end of each interval had the water
    /// table kept receding from its left-end elevation.
    ///
    /// The modelled per-day rate is applied as a single-step displacement,
    /// `h_left + rate(h_left)`, regardless of the interval's length.
    pub fn extrapolate(
        &self,
        series: &Series,
        intervals: &[ChangeInterval],
    ) -> Result<Vec<f64>, RechargeError> {
        let params = self.parameters.as_ref().ok_or(RechargeError::ModelNotFitted)?;
        let samples = series.samples();

        intervals
            .iter()
            .map(|interval| {
                let left = samples.get(interval.index).ok_or_else(|| {
                    RechargeError::InvalidInput(format!(
                        "interval starting at {} is outside the series",
                        interval.left
                    ))
                })?;
                Ok(left.elevation + params.rate(left.elevation))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
