//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::PreparationConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    camera_marker: String,
    reference_sensors: Vec<String>,
    camera_groups: usize,
    max_iterations: u32,
    window_size: usize,
    normalize_measurement_based: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    corrupt_threshold: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_label: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    camera_marker: config.sensors.camera_marker.clone(),
                    reference_sensors: config.sensors.reference_sensors.clone(),
                    camera_groups: config.sensors.camera_groups.len(),
                    max_iterations: config.sync.max_iterations,
                    window_size: config.windows.window_size,
                    normalize_measurement_based: config.windows.normalize_measurement_based,
                    corrupt_threshold: config.windows.corrupt_threshold,
                    default_label: config.labels.default_label.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &PreparationConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.labels.default_label.is_none() {
        warnings.push(
            "labels.default_label is not set - every measurement needs --label or an info.json label"
                .to_string(),
        );
    }

    if config.windows.corrupt_threshold.is_none() {
        warnings.push("windows.corrupt_threshold is not set - stuck sensors go undetected".to_string());
    }

    for camera in &config.sensors.double_rate_cameras {
        if config.sensors.camera_group(camera).is_none() {
            warnings.push(format!(
                "Double-rate camera '{}' matches no camera group prefix",
                camera
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Camera marker: {}", summary.camera_marker);
            println!("  Reference sensors: {:?}", summary.reference_sensors);
            println!("  Camera groups: {}", summary.camera_groups);
            println!("  Sync iterations: {}", summary.max_iterations);
            println!("  Window size: {}", summary.window_size);
            println!(
                "  Measurement-based normalization: {}",
                summary.normalize_measurement_based
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn args(path: &Path) -> ValidateArgs {
        ValidateArgs {
            config: path.to_path_buf(),
            json: false,
        }
    }

    #[test]
    fn test_valid_file_with_warnings() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prep.toml");
        std::fs::write(&path, "[windows]\nwindow_size = 30\n").unwrap();

        let result = validate_config(&args(&path));
        assert!(result.valid);
        assert_eq!(result.summary.unwrap().window_size, 30);
        assert_eq!(result.warnings.unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prep.toml");
        std::fs::write(&path, "[windows]\nwindow_size = 45\n").unwrap();

        let result = validate_config(&args(&path));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("window_size"));

        assert!(!validate_config(&args(&dir.path().join("missing.toml"))).valid);
    }
}
