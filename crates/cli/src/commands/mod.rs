//! Command implementations.

mod info;
mod prepare;
mod validate;

pub use info::run_info;
pub use prepare::run_prepare;
pub use validate::run_validate;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::PreparationConfig;
use std::path::Path;
use tracing::info;

use crate::error::CliError;

/// Load the configuration file, or the validated defaults if none is given
pub(crate) fn load_config(path: Option<&Path>) -> Result<PreparationConfig> {
    let Some(path) = path else {
        info!("No configuration file given, using defaults");
        let config = PreparationConfig::default();
        ConfigLoader::validate(&config).context("Default configuration is invalid")?;
        return Ok(config);
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    info!(config = %path.display(), "Loading configuration");
    ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
