//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// FTDD Prep - timestamp synchronization and resampling for quadruped robot measurements
#[derive(Parser, Debug)]
#[command(
    name = "ftdd-prep",
    author,
    version,
    about = "FTDD measurement synchronization and resampling pipeline",
    long_about = "Prepares raw quadruped robot measurements for training.\n\n\
                  Downsamples IMU data, synchronizes camera and IMU start times, \n\
                  renumbers images to a fixed 200 ms grid, cuts sliding IMU windows \n\
                  and assembles a labelled dataset."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FTDD_PREP_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FTDD_PREP_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prepare measurements and optionally combine them into a dataset
    Prepare(PrepareArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display sensors, timestamps and clock offsets of a measurement
    Info(InfoArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Prepare(_) => "prepare",
            Commands::Validate(_) => "validate",
            Commands::Info(_) => "info",
        }
    }
}

/// Arguments for the `prepare` command
#[derive(Parser, Debug, Clone)]
pub struct PrepareArgs {
    /// Raw measurement directories
    #[arg(required = true)]
    pub measurements: Vec<PathBuf>,

    /// Path to configuration file (TOML or JSON); built-in defaults if omitted
    #[arg(short, long, env = "FTDD_PREP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory receiving one working copy per measurement
    #[arg(short, long, default_value = "prepared", env = "FTDD_PREP_WORKDIR")]
    pub workdir: PathBuf,

    /// Combine successfully prepared measurements into this dataset directory
    #[arg(short, long, env = "FTDD_PREP_DATASET")]
    pub dataset: Option<PathBuf>,

    /// Label for every measurement, overriding info.json and the configured default
    #[arg(short, long)]
    pub label: Option<String>,

    /// Number of measurements prepared concurrently
    #[arg(short, long, default_value = "1", env = "FTDD_PREP_JOBS")]
    pub jobs: usize,

    /// Validate configuration and inputs, then exit without preparing
    #[arg(long)]
    pub dry_run: bool,

    /// Print the per-measurement reports as JSON
    #[arg(long)]
    pub json: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FTDD_PREP_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "prep.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Raw measurement directory
    pub measurement: PathBuf,

    /// Path to configuration file; built-in defaults if omitted
    #[arg(short, long, env = "FTDD_PREP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
