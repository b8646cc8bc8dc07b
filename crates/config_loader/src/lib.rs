//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON preparation configuration files
//! - Validate configuration legality
//! - Load per-measurement `info.json` metadata
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("prep.toml")).unwrap();
//! println!("Window size: {}", config.windows.window_size);
//! ```

mod parser;
mod validator;

pub use contracts::{MeasurementInfo, PreparationConfig};
pub use parser::ConfigFormat;

use contracts::{ContractError, IoResultExt, MEASUREMENT_INFO_FILE};
use std::path::Path;
use tracing::debug;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<PreparationConfig, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PreparationConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already constructed configuration
    pub fn validate(config: &PreparationConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Load `info.json` from a measurement directory
    ///
    /// # Errors
    /// - `Configuration` if the file is missing
    /// - `ConfigParse` if it is not valid measurement metadata
    pub fn load_measurement_info(measurement: &Path) -> Result<MeasurementInfo, ContractError> {
        let path = measurement.join(MEASUREMENT_INFO_FILE);
        if !path.is_file() {
            return Err(ContractError::configuration(format!(
                "missing {MEASUREMENT_INFO_FILE} in measurement '{}'",
                measurement.display()
            )));
        }
        let content = Self::read_file(&path)?;
        let info = MeasurementInfo::from_json_str(&content)?;
        debug!(
            measurement = %measurement.display(),
            date = %info.measurement_date,
            "Measurement info loaded"
        );
        Ok(info)
    }

    /// Serialize PreparationConfig to TOML string
    pub fn to_toml(config: &PreparationConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize PreparationConfig to JSON string
    pub fn to_json(config: &PreparationConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        std::fs::read_to_string(path).at_path(path)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PreparationConfig, ContractError> {
        let config = format.parse(content)?;
        validator::validate(&config)?;
        Ok(config)
    }
}
