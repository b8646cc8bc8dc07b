//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Measurement directory not found
    #[error("Measurement directory not found: {path}")]
    MeasurementNotFound { path: String },

    /// Two measurements would share a working directory
    #[error("Measurement name '{name}' given more than once")]
    DuplicateMeasurement { name: String },

    /// Preparing one measurement failed
    #[error("Preparation of '{measurement}' failed: {source}")]
    Preparation {
        measurement: String,
        #[source]
        source: ContractError,
    },

    /// A worker task panicked or was cancelled
    #[error("Worker for '{measurement}' did not finish: {message}")]
    Worker {
        measurement: String,
        message: String,
    },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn measurement_not_found(path: impl Into<String>) -> Self {
        Self::MeasurementNotFound { path: path.into() }
    }

    pub fn preparation(measurement: impl Into<String>, source: ContractError) -> Self {
        Self::Preparation {
            measurement: measurement.into(),
            source,
        }
    }

    pub fn worker(measurement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Worker {
            measurement: measurement.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
