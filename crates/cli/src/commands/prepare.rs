//! `prepare` command implementation.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use super::load_config;
use crate::cli::PrepareArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `prepare` command
pub async fn run_prepare(args: &PrepareArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;

    info!(
        measurements = args.measurements.len(),
        window_size = config.windows.window_size,
        max_iterations = config.sync.max_iterations,
        corrupt_threshold = ?config.windows.corrupt_threshold,
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        config: Arc::new(config),
        measurements: args.measurements.clone(),
        workdir: args.workdir.clone(),
        dataset: args.dataset.clone(),
        label: args.label.clone(),
        jobs: args.jobs,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    // Dry run - just validate and exit
    if args.dry_run {
        let jobs = pipeline.plan()?;
        info!("Dry run mode - inputs are valid, exiting");
        for job in &jobs {
            println!("{} -> {}", job.source.display(), job.target.display());
        }
        return Ok(());
    }

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    tokio::select! {
        result = pipeline.run() => {
            let stats = result.context("Pipeline execution failed")?;

            if args.json {
                let json = serde_json::to_string_pretty(&stats.prepared)
                    .context("Failed to serialize preparation reports")?;
                println!("{}", json);
            } else {
                stats.print_summary();
            }

            if stats.failed() > 0 {
                anyhow::bail!(
                    "{} of {} measurements failed",
                    stats.failed(),
                    stats.measurements
                );
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, no further measurements will be started");
            anyhow::bail!("Interrupted");
        }
    }

    info!("FTDD Prep finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
