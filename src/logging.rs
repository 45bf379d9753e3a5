//! Structured logging for the recharge estimator
//!
//! Provides context-rich logging with pipeline component and series
//! identifiers, timestamps, and severity levels. Supports both console
//! output and file-based logging for batch runs. Nothing is emitted until
//! `init_logger` has been called, so library users opt in.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::RechargeError;
use crate::recession::RecessionParameters;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Events,
    Recession,
    Recharge,
    Config,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Events => write!(f, "EVENTS"),
            Component::Recession => write!(f, "MCR"),
            Component::Recharge => write!(f, "RECHARGE"),
            Component::Config => write!(f, "CONFIG"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the series simply has no usable events or falls
    Expected,
    /// Unexpected failure - bad configuration, malformed input, a diverged
    /// fit or API misuse
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    fn log(&self, level: LogLevel, component: Component, series: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let series_part = series.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format_entry(level, component, series, message);

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, series_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, series_part, message),
                LogLevel::Info => println!("   {}{}: {}", component, series_part, message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", component, series_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// Formats a full log line: `<utc timestamp> <LEVEL> <COMPONENT>[ [series]]: message`.
fn format_entry(level: LogLevel, component: Component, series: Option<&str>, message: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let series_part = series.map(|s| format!(" [{}]", s)).unwrap_or_default();
    format!("{} {} {}{}: {}", timestamp, level, component, series_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize (or replace) the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    let logger = Logger {
        min_level,
        log_file: log_file.map(String::from),
        console_timestamps,
    };
    // A poisoned lock only means another thread panicked mid-log; the slot is still usable.
    let mut slot = LOGGER.lock().unwrap_or_else(|e| e.into_inner());
    *slot = Some(logger);
}

fn dispatch(level: LogLevel, component: Component, series: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, series, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, series: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, component, series, message);
}

/// Log a warning message
pub fn warn(component: Component, series: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, component, series, message);
}

/// Log an error message
pub fn error(component: Component, series: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, component, series, message);
}

/// Log a debug message
pub fn debug(component: Component, series: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, component, series, message);
}

// ---------------------------------------------------------------------------
// Structured Summaries
// ---------------------------------------------------------------------------

/// Log a pipeline failure at a level matching its classification
pub fn log_failure(component: Component, series: Option<&str>, operation: &str, err: &RechargeError) {
    let failure_type = err.failure_type();
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(component, series, &message),
        FailureType::Unexpected => error(component, series, &message),
    }
}

/// Log the outcome of a recession curve fit
pub fn log_fit_summary(series: Option<&str>, params: &RecessionParameters) {
    let message = format!(
        "Recession fit on {} falls in {} iterations: a = {:.6} ± {:.6}, b = {:.6} ± {:.6}",
        params.n_observations,
        params.iterations,
        params.a,
        params.a_stderr,
        params.b,
        params.b_stderr
    );
    info(Component::Recession, series, &message);
}

/// Log a summary of a recharge estimate
pub fn log_recharge_summary(series: Option<&str>, events: usize, rises: usize, buckets: usize, total: f64) {
    let message = format!(
        "Recharge estimated: {}/{} intervals kept as rises, {} buckets, total {:.6}",
        rises, events, buckets, total
    );

    if rises == events {
        info(Component::Recharge, series, &message);
    } else {
        debug(Component::Recharge, series, &message);
    }
}
