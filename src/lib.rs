//! Groundwater recharge from water-table fluctuations.
//!
//! Recharge is estimated from the rises of a water-table hydrograph, scaled by
//! the aquifer's specific yield. Rises can be measured against the raw
//! preceding elevation or against a master recession curve fitted to the
//! series' falls.
//!
//! - `model`: series, intervals, events and the error type.
//! - `config`: estimator settings, loaded from TOML.
//! - `events`: change intervals, fall rates and event selection.
//! - `recession`: the linear recession curve and its fit.
//! - `recharge`: the estimator, resampling and uncertainty bands.
//! - `report`: JSON snapshot of an estimate.
//! - `logging`: leveled console/file logging.

pub mod config;
pub mod events;
pub mod logging;
pub mod model;
pub mod recession;
pub mod recharge;
pub mod report;
