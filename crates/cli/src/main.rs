//! # FTDD Prep CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 多测量并发处理与数据集合并
//! - 测量目录检查

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::{LogFormat, ObservabilityConfig};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_prepare, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // FTDD_PREP_* defaults may come from .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;
    info!(version = env!("CARGO_PKG_VERSION"), command = cli.command.name(), "ftdd-prep starting");

    let result = match &cli.command {
        Commands::Prepare(args) => run_prepare(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        let message = format!("{e:#}");
        tracing::error!(command = cli.command.name(), error = %message, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
///
/// `RUST_LOG` takes precedence over `-v` / `--quiet`. With `-v` every stage
/// span also logs its duration when it closes.
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let log_format = match cli.log_format {
        cli::LogFormat::Json => LogFormat::Json,
        cli::LogFormat::Pretty => LogFormat::Pretty,
        cli::LogFormat::Compact => LogFormat::Compact,
    };

    // metrics exporter is started by `prepare --metrics-port`
    observability::init_with_config(ObservabilityConfig {
        log_format,
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
        span_timings: cli.verbose > 0,
    })
}
