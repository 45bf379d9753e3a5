//! Configuration surface consumed by the recharge pipeline.
//!
//! Rise rules and resampling frequencies are closed enums, parsed and
//! validated once when the configuration is built. A `RechargeConfig` can be
//! constructed in code, parsed from TOML, or located through the
//! `GWTF_CONFIG` environment variable (optionally set in a `.env` file).
//!
//! ```toml
//! freq = "daily"
//! rise_rule = "rises"
//! specific_yield = 0.15
//! specific_yield_uncertainty = [0.1, 0.2]
//! use_recession_model = true
//!
//! [fit]
//! max_iters = 2000
//!
//! [logging]
//! level = "info"
//! file = "recharge.log"
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::logging::{self, Component, LogLevel};
use crate::model::RechargeError;

/// Environment variable naming a TOML configuration file.
pub const CONFIG_ENV_VAR: &str = "GWTF_CONFIG";

// ---------------------------------------------------------------------------
// Resampling frequency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    #[default]
    Daily,
    Hourly,
    Minute,
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl Frequency {
    /// Width of one resampling bucket.
    pub fn step(&self) -> Duration {
        match self {
            Frequency::Daily => Duration::days(1),
            Frequency::Hourly => Duration::hours(1),
            Frequency::Minute => Duration::minutes(1),
            Frequency::Second => Duration::seconds(1),
            Frequency::Millisecond => Duration::milliseconds(1),
            Frequency::Microsecond => Duration::microseconds(1),
            Frequency::Nanosecond => Duration::nanoseconds(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Hourly => "hourly",
            Frequency::Minute => "minute",
            Frequency::Second => "second",
            Frequency::Millisecond => "millisecond",
            Frequency::Microsecond => "microsecond",
            Frequency::Nanosecond => "nanosecond",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = RechargeError;

    /// Accepts the long names and the usual offset aliases (`D`, `H`, `min`,
    /// `T`, `S`, `ms`, `L`, `us`, `U`, `ns`, `N`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "daily" | "day" | "D" | "d" => Ok(Frequency::Daily),
            "hourly" | "hour" | "H" | "h" => Ok(Frequency::Hourly),
            "minute" | "min" | "T" => Ok(Frequency::Minute),
            "second" | "S" | "s" => Ok(Frequency::Second),
            "millisecond" | "ms" | "L" => Ok(Frequency::Millisecond),
            "microsecond" | "us" | "U" => Ok(Frequency::Microsecond),
            "nanosecond" | "ns" | "N" => Ok(Frequency::Nanosecond),
            other => Err(RechargeError::InvalidConfiguration(format!(
                "unrecognised resampling frequency '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = RechargeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(value: Frequency) -> Self {
        value.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Rise rule
// ---------------------------------------------------------------------------

/// Which change intervals are candidate recharge events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RiseRule {
    /// Only intervals where the raw water table rose.
    #[default]
    Rises,
    /// Every interval; a recession correction may turn a flat or falling
    /// segment into a net rise.
    All,
}

impl RiseRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiseRule::Rises => "rises",
            RiseRule::All => "all",
        }
    }
}

impl fmt::Display for RiseRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RiseRule {
    type Err = RechargeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rises" | "rise" => Ok(RiseRule::Rises),
            "all" | "both" => Ok(RiseRule::All),
            other => Err(RechargeError::InvalidConfiguration(format!(
                "rise rule should be 'rises' or 'all', got '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for RiseRule {
    type Error = RechargeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RiseRule> for String {
    fn from(value: RiseRule) -> Self {
        value.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Specific yield uncertainty
// ---------------------------------------------------------------------------

/// Spread around the specific-yield point estimate.
///
/// A bare number is a fraction of the point estimate (`0.05` = ±5 %); a
/// two-element array gives explicit lower and upper yields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecificYieldUncertainty {
    Fraction(f64),
    Bounds(f64, f64),
}

impl Default for SpecificYieldUncertainty {
    fn default() -> Self {
        SpecificYieldUncertainty::Fraction(0.05)
    }
}

impl SpecificYieldUncertainty {
    /// Checks the band on its own: a fraction in `[0, 1]`, or ordered bounds
    /// that are themselves valid yields. Does not look at the point estimate.
    pub fn validate(&self) -> Result<(), RechargeError> {
        match *self {
            SpecificYieldUncertainty::Fraction(f) => {
                if !(f.is_finite() && (0.0..=1.0).contains(&f)) {
                    return Err(RechargeError::InvalidConfiguration(format!(
                        "specific yield uncertainty must be a fraction in [0, 1], got {}",
                        f
                    )));
                }
                Ok(())
            }
            SpecificYieldUncertainty::Bounds(lower, upper) => {
                validate_specific_yield(lower)?;
                validate_specific_yield(upper)?;
                if lower > upper {
                    return Err(RechargeError::InvalidConfiguration(format!(
                        "specific yield bounds ({}, {}) are not ordered",
                        lower, upper
                    )));
                }
                Ok(())
            }
        }
    }

    /// Resolves `(lower, upper)` yields around `sy`. Explicit bounds must
    /// enclose `sy` and every resolved yield must lie in `[0, 1]`.
    pub fn bounds(&self, sy: f64) -> Result<(f64, f64), RechargeError> {
        self.validate()?;
        let (lower, upper) = match *self {
            SpecificYieldUncertainty::Fraction(f) => (sy - f * sy, sy + f * sy),
            SpecificYieldUncertainty::Bounds(lower, upper) => {
                if !(lower <= sy && sy <= upper) {
                    return Err(RechargeError::InvalidConfiguration(format!(
                        "specific yield bounds ({}, {}) must enclose the estimate {}",
                        lower, upper, sy
                    )));
                }
                (lower, upper)
            }
        };

        validate_specific_yield(lower)?;
        validate_specific_yield(upper)?;
        Ok((lower, upper))
    }
}

/// Specific yield must be a finite fraction in `[0, 1]`.
pub fn validate_specific_yield(sy: f64) -> Result<(), RechargeError> {
    if sy.is_finite() && (0.0..=1.0).contains(&sy) {
        Ok(())
    } else {
        Err(RechargeError::InvalidConfiguration(format!(
            "specific yield must be in [0, 1], got {}",
            sy
        )))
    }
}

// ---------------------------------------------------------------------------
// Fit and logging options
// ---------------------------------------------------------------------------

/// Budget and tolerance for the recession curve optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Iteration budget; exhausting it is a fit divergence.
    pub max_iters: u64,
    /// Convergence threshold on the spread of simplex costs, relative to the
    /// initial sum of squared residuals.
    pub sd_tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            sd_tolerance: 1e-12,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<(), RechargeError> {
        if self.max_iters == 0 {
            return Err(RechargeError::InvalidConfiguration(
                "fit.max_iters must be positive".to_string(),
            ));
        }
        if !(self.sd_tolerance.is_finite() && self.sd_tolerance > 0.0) {
            return Err(RechargeError::InvalidConfiguration(format!(
                "fit.sd_tolerance must be positive and finite, got {}",
                self.sd_tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            timestamps: false,
        }
    }
}

impl LoggingConfig {
    /// Installs the global logger described by this section.
    pub fn init(&self) {
        logging::init_logger(self.level, self.file.as_deref(), self.timestamps);
    }
}

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RechargeConfig {
    pub freq: Frequency,
    pub rise_rule: RiseRule,
    pub specific_yield: f64,
    pub specific_yield_uncertainty: SpecificYieldUncertainty,
    /// Correct rises with a recession curve, fitting one over the full
    /// series if none has been fitted yet.
    pub use_recession_model: bool,
    pub fit: FitOptions,
    pub logging: LoggingConfig,
}

impl Default for RechargeConfig {
    fn default() -> Self {
        Self {
            freq: Frequency::Daily,
            rise_rule: RiseRule::Rises,
            specific_yield: 0.1,
            specific_yield_uncertainty: SpecificYieldUncertainty::default(),
            use_recession_model: false,
            fit: FitOptions::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RechargeConfig {
    pub fn with_specific_yield(mut self, sy: f64) -> Self {
        self.specific_yield = sy;
        self
    }

    pub fn with_rise_rule(mut self, rule: RiseRule) -> Self {
        self.rise_rule = rule;
        self
    }

    pub fn with_freq(mut self, freq: Frequency) -> Self {
        self.freq = freq;
        self
    }

    pub fn with_recession_model(mut self, enabled: bool) -> Self {
        self.use_recession_model = enabled;
        self
    }

    pub fn with_uncertainty(mut self, uncertainty: SpecificYieldUncertainty) -> Self {
        self.specific_yield_uncertainty = uncertainty;
        self
    }

    /// Checks every range constraint. Enum fields are valid by construction.
    /// The uncertainty band is only resolved against the yield when bands are
    /// estimated.
    pub fn validate(&self) -> Result<(), RechargeError> {
        validate_specific_yield(self.specific_yield)?;
        self.specific_yield_uncertainty.validate()?;
        self.fit.validate()
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, RechargeError> {
        let config: RechargeConfig = toml::from_str(text)
            .map_err(|e| RechargeError::InvalidConfiguration(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RechargeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RechargeError::InvalidConfiguration(format!(
                "cannot read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&text).inspect_err(|e| {
            logging::log_failure(Component::Config, None, "Loading configuration", e)
        })?;
        logging::debug(
            Component::Config,
            None,
            &format!("Loaded configuration from {}", path.display()),
        );
        Ok(config)
    }

    /// Loads the file named by `GWTF_CONFIG` (a `.env` file is honoured),
    /// or returns the defaults when the variable is unset.
    pub fn from_env() -> Result<Self, RechargeError> {
        dotenv::dotenv().ok();
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load(path),
            Err(_) => {
                logging::debug(
                    Component::Config,
                    None,
                    &format!("{} not set, using default configuration", CONFIG_ENV_VAR),
                );
                Ok(Self::default())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_parses_long_names_and_aliases() {
        assert_eq!("daily".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert_eq!("D".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert_eq!("h".parse::<Frequency>().unwrap(), Frequency::Hourly);
        assert_eq!("min".parse::<Frequency>().unwrap(), Frequency::Minute);
        assert_eq!("ms".parse::<Frequency>().unwrap(), Frequency::Millisecond);
        assert_eq!("us".parse::<Frequency>().unwrap(), Frequency::Microsecond);
        assert_eq!("nanosecond".parse::<Frequency>().unwrap(), Frequency::Nanosecond);
    }

    #[test]
    fn test_unknown_frequency_is_invalid_configuration() {
        let result = "fortnightly".parse::<Frequency>();
        assert!(matches!(result, Err(RechargeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_frequency_steps_are_ordered() {
        let steps: Vec<Duration> = [
            Frequency::Nanosecond,
            Frequency::Microsecond,
            Frequency::Millisecond,
            Frequency::Second,
            Frequency::Minute,
            Frequency::Hourly,
            Frequency::Daily,
        ]
        .iter()
        .map(|f| f.step())
        .collect();
        assert!(steps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_rise_rule_accepts_both_as_alias_for_all() {
        assert_eq!("rises".parse::<RiseRule>().unwrap(), RiseRule::Rises);
        assert_eq!("both".parse::<RiseRule>().unwrap(), RiseRule::All);
        assert_eq!("ALL".parse::<RiseRule>().unwrap(), RiseRule::All);
        assert!("peaks".parse::<RiseRule>().is_err());
    }

    #[test]
    fn test_specific_yield_out_of_range_is_rejected() {
        assert!(validate_specific_yield(0.0).is_ok());
        assert!(validate_specific_yield(1.0).is_ok());
        assert!(validate_specific_yield(-0.1).is_err());
        assert!(validate_specific_yield(1.5).is_err());
        assert!(validate_specific_yield(f64::NAN).is_err());
    }

    #[test]
    fn test_fractional_uncertainty_scales_the_estimate() {
        let (lower, upper) = SpecificYieldUncertainty::Fraction(0.1).bounds(0.2).unwrap();
        assert!((lower - 0.18).abs() < 1e-12);
        assert!((upper - 0.22).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_bounds_must_enclose_the_estimate() {
        assert!(SpecificYieldUncertainty::Bounds(0.05, 0.2).bounds(0.1).is_ok());
        let result = SpecificYieldUncertainty::Bounds(0.15, 0.2).bounds(0.1);
        assert!(
            matches!(result, Err(RechargeError::InvalidConfiguration(_))),
            "lower bound above the estimate should be rejected, got {:?}",
            result
        );
    }

    #[test]
    fn test_fractional_band_above_one_is_rejected() {
        let result = SpecificYieldUncertainty::Fraction(0.5).bounds(0.9);
        assert!(result.is_err(), "0.9 + 50% exceeds a specific yield of 1");
    }

    #[test]
    fn test_band_shape_is_checked_without_the_estimate() {
        assert!(SpecificYieldUncertainty::Bounds(0.2, 0.3).validate().is_ok());
        assert!(SpecificYieldUncertainty::Bounds(0.3, 0.2).validate().is_err());
        assert!(SpecificYieldUncertainty::Bounds(0.1, 1.2).validate().is_err());
        assert!(SpecificYieldUncertainty::Fraction(1.5).validate().is_err());
    }

    #[test]
    fn test_yield_near_one_is_valid_with_default_band() {
        for sy in [0.97, 1.0] {
            let config = RechargeConfig::default().with_specific_yield(sy);
            assert!(config.validate().is_ok(), "sy = {} is a valid yield", sy);
        }
        let config = RechargeConfig::from_toml_str("specific_yield = 0.97").unwrap();
        assert_eq!(config.specific_yield, 0.97);
        assert!(
            config.specific_yield_uncertainty.bounds(0.97).is_err(),
            "the default band around 0.97 still exceeds 1 when bands are requested"
        );
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RechargeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.freq, Frequency::Daily);
        assert_eq!(config.rise_rule, RiseRule::Rises);
        assert_eq!(config.specific_yield, 0.1);
        assert!(!config.use_recession_model);
    }

    #[test]
    fn test_toml_round_trip_of_every_section() {
        let text = r#"
            freq = "hourly"
            rise_rule = "all"
            specific_yield = 0.15
            specific_yield_uncertainty = [0.1, 0.2]
            use_recession_model = true

            [fit]
            max_iters = 250

            [logging]
            level = "debug"
            timestamps = true
        "#;
        let config = RechargeConfig::from_toml_str(text).expect("valid TOML should parse");
        assert_eq!(config.freq, Frequency::Hourly);
        assert_eq!(config.rise_rule, RiseRule::All);
        assert_eq!(config.specific_yield, 0.15);
        assert_eq!(
            config.specific_yield_uncertainty,
            SpecificYieldUncertainty::Bounds(0.1, 0.2)
        );
        assert!(config.use_recession_model);
        assert_eq!(config.fit.max_iters, 250);
        assert_eq!(config.fit.sd_tolerance, FitOptions::default().sd_tolerance);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.timestamps);
    }

    #[test]
    fn test_toml_with_unknown_frequency_fails() {
        let result = RechargeConfig::from_toml_str(r#"freq = "weekly""#);
        assert!(matches!(result, Err(RechargeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_toml_with_out_of_range_yield_fails() {
        let result = RechargeConfig::from_toml_str("specific_yield = 1.2");
        assert!(matches!(result, Err(RechargeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_load_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recharge.toml");
        std::fs::write(&path, "specific_yield = 0.25\nfreq = \"D\"\n").unwrap();

        let config = RechargeConfig::load(&path).expect("config file should load");
        assert_eq!(config.specific_yield, 0.25);
        assert_eq!(config.freq, Frequency::Daily);
    }

    #[test]
    fn test_load_missing_file_is_invalid_configuration() {
        let result = RechargeConfig::load("/nonexistent/recharge.toml");
        assert!(matches!(result, Err(RechargeError::InvalidConfiguration(_))));
    }
}
