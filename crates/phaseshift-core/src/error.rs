//! Core error types for phaseshift-core.
//!
//! This module defines the error hierarchy using thiserror. Validation
//! failures are always reported before any state is touched, so a caller
//! receiving an error can rely on the previous state being intact.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for phaseshift-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Pomodoro settings rejected by validation
    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    /// Engine construction or duration errors
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Accuracy measurement errors
    #[error("Accuracy measurement error: {0}")]
    Accuracy(#[from] AccuracyError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identifies a field of [`PomodoroSettings`](crate::PomodoroSettings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsField {
    WorkDurationSeconds,
    ShortBreakDurationSeconds,
    LongBreakDurationSeconds,
    TotalWorkUnits,
    WorkUnitsBeforeLongBreak,
}

impl SettingsField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkDurationSeconds => "work_duration_seconds",
            Self::ShortBreakDurationSeconds => "short_break_duration_seconds",
            Self::LongBreakDurationSeconds => "long_break_duration_seconds",
            Self::TotalWorkUnits => "total_work_units",
            Self::WorkUnitsBeforeLongBreak => "work_units_before_long_break",
        }
    }
}

impl fmt::Display for SettingsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// A duration or count is below its lower bound
    #[error("'{field}' must be at least {min}, got {value}")]
    BelowMinimum {
        field: SettingsField,
        min: u32,
        value: u32,
    },

    /// The short break is configured longer than the long break
    #[error("'short_break_duration_seconds' ({short}) must not exceed 'long_break_duration_seconds' ({long})")]
    ShortBreakExceedsLongBreak { short: u32, long: u32 },

    /// Too many work units to lay out as a phase plan
    #[error("'total_work_units' ({value}) is too large to plan, at most {max} are supported")]
    TooManyUnitsToPlan { value: u32, max: u32 },
}

impl SettingsError {
    /// The field that failed validation.
    pub fn field(&self) -> SettingsField {
        match self {
            Self::BelowMinimum { field, .. } => *field,
            Self::ShortBreakExceedsLongBreak { .. } => SettingsField::ShortBreakDurationSeconds,
            Self::TooManyUnitsToPlan { .. } => SettingsField::TotalWorkUnits,
        }
    }
}

/// Engine-level errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// A countdown duration must be strictly positive
    #[error("Invalid duration {0:?}: must be greater than zero")]
    InvalidDuration(Duration),

    /// The tick interval must be strictly positive
    #[error("Invalid tick interval: must be greater than zero")]
    InvalidInterval,

    /// No runtime handle was supplied and none is current
    #[error("No tokio runtime available to drive the timer loop")]
    NoRuntime,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not exist in the configuration
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Could not determine the configuration directory
    #[error("Configuration directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Accuracy measurement errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccuracyError {
    /// An option is below its lower bound
    #[error("'{name}' must be at least 1, got {value}")]
    InvalidOption { name: &'static str, value: u64 },

    /// A sample task failed to produce a measurement
    #[error("Sample failed: {0}")]
    SampleFailed(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
