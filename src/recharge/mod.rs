//! Recharge estimation.
//!
//! A `RechargeModel` owns one water-table series and its configuration and
//! runs the full pipeline: select event intervals, correct them with a
//! recession curve when one is configured, keep the positive rises, scale
//! them by the specific yield and resample the result onto a uniform grid.
//!
//! Submodules:
//! - `resample`: backfill resampling and clipping.
//! - `uncertainty`: mean/lower/upper bands for a specific-yield range.

pub mod resample;
pub mod uncertainty;

use chrono::{DateTime, Utc};

use crate::config::{Frequency, RechargeConfig, validate_specific_yield};
use crate::events;
use crate::logging::{self, Component};
use crate::model::{ChangeInterval, RechargeError, RechargePoint, RechargeSeries, RiseEvent, Series};
use crate::recession::{RecessionCurveModel, RecessionParameters};

pub use uncertainty::RechargeBands;

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

/// Net rise of each interval, measured from the raw left elevation or, with a
/// recession model, from the extrapolated one. Non-positive rises are
/// discarded; if none remain the call fails.
pub fn rise_events(
    series: &Series,
    intervals: &[ChangeInterval],
    recession: Option<&RecessionCurveModel>,
) -> Result<Vec<RiseEvent>, RechargeError> {
    let left_hand: Vec<f64> = match recession {
        Some(model) => model.extrapolate(series, intervals)?,
        None => intervals.iter().map(|i| i.left_elevation).collect(),
    };

    let rises: Vec<RiseEvent> = intervals
        .iter()
        .zip(left_hand)
        .map(|(interval, left_hand)| RiseEvent {
            interval: *interval,
            left_hand,
            rise: interval.right_elevation - left_hand,
        })
        .filter(|event| event.rise > 0.0)
        .collect();

    if rises.is_empty() {
        return Err(RechargeError::InsufficientData(format!(
            "no recharge: none of the {} event intervals has a positive net rise",
            intervals.len()
        )));
    }

    Ok(rises)
}

/// Scales rises by `specific_yield`, keys them by interval end and resamples
/// to `freq`. Negative buckets are clipped to zero; `series` labels the
/// warning logged when that happens.
pub fn recharge_from_rises(
    rises: &[RiseEvent],
    specific_yield: f64,
    freq: Frequency,
    series: Option<&str>,
) -> Result<RechargeSeries, RechargeError> {
    validate_specific_yield(specific_yield)?;

    let points: Vec<RechargePoint> = rises
        .iter()
        .map(|event| RechargePoint {
            time: event.interval.right,
            value: event.rise * specific_yield,
        })
        .collect();

    let mut recharge = resample::resample_backfill(&points, freq)?;
    let clipped = resample::clip_negative(&mut recharge);
    if clipped > 0 {
        logging::warn(
            Component::Recharge,
            series,
            &format!("{} negative recharge buckets clipped to zero", clipped),
        );
    }
    Ok(recharge)
}

/// One-shot estimate for a series under `config`.
pub fn estimate(series: &Series, config: &RechargeConfig) -> Result<RechargeSeries, RechargeError> {
    RechargeModel::new(series.clone(), config.clone())?.estimate()
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Recharge estimator for a single water-table series.
///
/// Intermediate results of the last successful estimate (`events`, `rises`)
/// and the recession model stay available for reporting.
#[derive(Debug, Clone)]
pub struct RechargeModel {
    series: Series,
    config: RechargeConfig,
    recession: Option<RecessionCurveModel>,
    events: Vec<ChangeInterval>,
    rises: Vec<RiseEvent>,
}

impl RechargeModel {
    pub fn new(series: Series, config: RechargeConfig) -> Result<Self, RechargeError> {
        config.validate()?;
        Ok(Self {
            series,
            config,
            recession: None,
            events: Vec::new(),
            rises: Vec::new(),
        })
    }

    /// Attaches a recession model. An attached model is always used to
    /// correct rises, so it must be fitted before `estimate` unless
    /// `use_recession_model` is set.
    pub fn with_recession(mut self, model: RecessionCurveModel) -> Self {
        self.recession = Some(model);
        self
    }

    /// Labels the estimator's series for logs and reports.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.series = self.series.with_name(name);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.series.name()
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn config(&self) -> &RechargeConfig {
        &self.config
    }

    pub fn recession(&self) -> Option<&RecessionCurveModel> {
        self.recession.as_ref()
    }

    pub fn recession_parameters(&self) -> Option<&RecessionParameters> {
        self.recession.as_ref().and_then(|m| m.parameters())
    }

    /// Intervals selected by the last estimate.
    pub fn events(&self) -> &[ChangeInterval] {
        &self.events
    }

    /// Positive rise events of the last estimate.
    pub fn rises(&self) -> &[RiseEvent] {
        &self.rises
    }

    /// Fits the recession curve on `[tmin, tmax]`, creating a model for this
    /// estimator if none is attached.
    pub fn fit_recession(
        &mut self,
        tmin: Option<DateTime<Utc>>,
        tmax: Option<DateTime<Utc>>,
    ) -> Result<&RecessionParameters, RechargeError> {
        let options = self.config.fit;
        let model = self
            .recession
            .get_or_insert_with(|| RecessionCurveModel::with_options(options));
        model.fit(&self.series, tmin, tmax)
    }

    /// Makes sure an attached or requested recession model is fitted.
    fn prepare_recession(&mut self) -> Result<(), RechargeError> {
        let fitted = self.recession.as_ref().is_some_and(|m| m.is_fitted());
        if self.config.use_recession_model && !fitted {
            self.fit_recession(None, None)?;
        }
        match &self.recession {
            Some(model) if !model.is_fitted() => Err(RechargeError::ModelNotFitted),
            _ => Ok(()),
        }
    }

    fn compute_rises(&mut self) -> Result<(), RechargeError> {
        self.prepare_recession()?;
        let events = events::select_event_intervals(&self.series, self.config.rise_rule)?;
        let rises = rise_events(&self.series, &events, self.recession.as_ref())?;
        self.events = events;
        self.rises = rises;
        Ok(())
    }

    fn log_outcome<T>(&self, operation: &str, result: &Result<T, RechargeError>, recharge: Option<&RechargeSeries>) {
        match (result, recharge) {
            (Err(e), _) => logging::log_failure(Component::Recharge, self.name(), operation, e),
            (Ok(_), Some(series)) => logging::log_recharge_summary(
                self.name(),
                self.events.len(),
                self.rises.len(),
                series.len(),
                series.total(),
            ),
            (Ok(_), None) => {}
        }
    }

    /// Estimates recharge with the configured specific yield.
    pub fn estimate(&mut self) -> Result<RechargeSeries, RechargeError> {
        let result = self
            .compute_rises()
            .and_then(|_| {
                recharge_from_rises(
                    &self.rises,
                    self.config.specific_yield,
                    self.config.freq,
                    self.name(),
                )
            });
        self.log_outcome("Recharge estimate", &result, result.as_ref().ok());
        result
    }

    /// Estimates recharge with `specific_yield`, which becomes the model's
    /// configured yield once it passes validation.
    pub fn estimate_with_specific_yield(
        &mut self,
        specific_yield: f64,
    ) -> Result<RechargeSeries, RechargeError> {
        validate_specific_yield(specific_yield)?;
        self.config.specific_yield = specific_yield;
        self.estimate()
    }

    /// Estimates mean, lower and upper recharge for the configured
    /// specific-yield uncertainty.
    pub fn estimate_with_uncertainty(&mut self) -> Result<RechargeBands, RechargeError> {
        let result = self.compute_rises().and_then(|_| {
            uncertainty::recharge_bands(
                &self.rises,
                self.config.specific_yield,
                self.config.specific_yield_uncertainty,
                self.config.freq,
                self.name(),
            )
        });
        self.log_outcome("Recharge uncertainty estimate", &result, result.as_ref().ok().map(|b| &b.mean));
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
