//! JSON report of a recharge estimate.

use serde::Serialize;

use crate::config::RechargeConfig;
use crate::model::{ChangeInterval, RechargeError, RechargeSeries, RiseEvent};
use crate::recession::RecessionParameters;
use crate::recharge::{RechargeBands, RechargeModel};

/// Everything needed to reproduce or plot one estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RechargeReport {
    pub series: Option<String>,
    pub samples: usize,
    pub config: RechargeConfig,
    pub recession: Option<RecessionParameters>,
    pub events: Vec<ChangeInterval>,
    pub rises: Vec<RiseEvent>,
    pub recharge: RechargeSeries,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bands: Option<RechargeBands>,
}

impl RechargeReport {
    /// Snapshot of `model` after an estimate produced `recharge`.
    pub fn from_model(model: &RechargeModel, recharge: RechargeSeries) -> Self {
        Self {
            series: model.name().map(str::to_string),
            samples: model.series().len(),
            config: model.config().clone(),
            recession: model.recession_parameters().copied(),
            events: model.events().to_vec(),
            rises: model.rises().to_vec(),
            recharge,
            bands: None,
        }
    }

    /// Same as `from_model`, using the mean band as the recharge series.
    pub fn with_bands(model: &RechargeModel, bands: RechargeBands) -> Self {
        let mut report = Self::from_model(model, bands.mean.clone());
        report.bands = Some(bands);
        report
    }

    /// Runs the estimate on `model` and captures the result.
    pub fn generate(model: &mut RechargeModel) -> Result<Self, RechargeError> {
        let recharge = model.estimate()?;
        Ok(Self::from_model(model, recharge))
    }

    pub fn to_json(&self) -> Result<String, RechargeError> {
        encode(self, false)
    }

    pub fn to_json_pretty(&self) -> Result<String, RechargeError> {
        encode(self, true)
    }
}

fn encode<T: Serialize>(value: &T, pretty: bool) -> Result<String, RechargeError> {
    let encoded = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    encoded.map_err(|e| RechargeError::Serialization(e.to_string()))
}
