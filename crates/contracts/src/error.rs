//! Layered error definitions
//!
//! Categorized by source: timestamp / config / layout / sync / trim / label index / io

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Unified error type
///
/// Every variant aborts the preparation of the measurement it was raised for.
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Timestamp Errors =====
    /// Filename is not a valid `HH_MM_SS_mmm` timestamp
    #[error("malformed timestamp '{value}': {message}")]
    MalformedTimestamp { value: String, message: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Unknown camera group or missing measurement metadata
    #[error("configuration error: {message}")]
    Configuration { message: String },

    // ===== Layout Errors =====
    /// Measurement has no camera directory at all
    #[error("no camera data found in measurement '{measurement}'")]
    NoCameraData { measurement: String },

    /// Measurement has no timeseries directory, or none usable as reference
    #[error("no IMU data found in measurement '{measurement}': {message}")]
    NoImuData {
        measurement: String,
        message: String,
    },

    /// Both stereo halves share one directory
    #[error("unsupported layout in sensor '{sensor}': {message}")]
    UnsupportedLayout { sensor: String, message: String },

    /// Sensor directory without any sample file
    #[error("sensor '{sensor}' contains no samples")]
    EmptyStream { sensor: String },

    /// Sample file could not be parsed into a numeric array
    #[error("sample format error in '{}': {message}", .path.display())]
    SampleFormat { path: PathBuf, message: String },

    // ===== Sync Errors =====
    /// Residual still exceeds the tolerance after the allowed correction passes
    #[error(
        "synchronization diverged after {iterations} iteration(s): camera '{camera}' residual {residual_ms}ms exceeds {tolerance_ms}ms"
    )]
    SynchronizationDivergence {
        iterations: u32,
        camera: String,
        residual_ms: i64,
        tolerance_ms: i64,
    },

    // ===== Trim Errors =====
    /// Reference timestamp cannot be reached in the first file of a stream
    #[error("head trim failed for sensor '{sensor}': {message}")]
    HeadTrim { sensor: String, message: String },

    /// Not enough samples left to cut a single window
    #[error("insufficient data for sensor '{sensor}': {message}")]
    InsufficientData { sensor: String, message: String },

    // ===== Label Index Errors =====
    /// Row count did not change by exactly one for a removed id
    #[error("label index inconsistency for '{id}': {message}")]
    LabelIndexConsistency { id: String, message: String },

    // ===== General Errors =====
    /// IO error with the offending path
    #[error("io error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ContractError {
    /// Create malformed timestamp error
    pub fn malformed_timestamp(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedTimestamp {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create unsupported layout error
    pub fn unsupported_layout(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedLayout {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    /// Create sample format error
    pub fn sample_format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SampleFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create head trim error
    pub fn head_trim(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HeadTrim {
            sensor: sensor.into(),
            message: message.into(),
        }
    }

    /// Create label index consistency error
    pub fn label_index(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LabelIndexConsistency {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Wrap an io error with the path it occurred at
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Attach a path to a bare `std::io::Result`
pub trait IoResultExt<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| ContractError::io(path, e))
    }
}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, ContractError>;
