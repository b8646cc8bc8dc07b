//! Pipeline orchestrator - prepares measurements concurrently and combines them.
//!
//! Every measurement is prepared into its own working directory on the
//! blocking pool; a semaphore bounds how many run at once. Only measurements
//! that succeeded are combined, after all of them finished.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::PreparationConfig;
use dataset::{combine_measurements, prepare_measurement, PreparationReport};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated preparation configuration
    pub config: Arc<PreparationConfig>,

    /// Raw measurement directories
    pub measurements: Vec<PathBuf>,

    /// Parent of the per-measurement working directories
    pub workdir: PathBuf,

    /// Dataset directory to combine into (None = keep working copies only)
    pub dataset: Option<PathBuf>,

    /// Label override for every measurement
    pub label: Option<String>,

    /// Concurrent preparations
    pub jobs: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// One measurement scheduled for preparation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub index: usize,
    pub name: String,
    pub source: PathBuf,
    pub target: PathBuf,
}

type JobOutcome = (Job, std::result::Result<PreparationReport, CliError>);

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Check the inputs and derive one working directory per measurement
    pub fn plan(&self) -> crate::error::Result<Vec<Job>> {
        let mut names = BTreeSet::new();
        let mut jobs = Vec::with_capacity(self.config.measurements.len());

        for (index, source) in self.config.measurements.iter().enumerate() {
            if !source.is_dir() {
                return Err(CliError::measurement_not_found(source.display().to_string()));
            }
            let name = measurement_name(source);
            if !names.insert(name.clone()) {
                return Err(CliError::DuplicateMeasurement { name });
            }
            jobs.push(Job {
                index,
                target: self.config.workdir.join(&name),
                name,
                source: source.clone(),
            });
        }
        Ok(jobs)
    }

    /// Run the pipeline to completion
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let jobs = self.plan()?;
        std::fs::create_dir_all(&self.config.workdir).with_context(|| {
            format!(
                "Failed to create working directory {}",
                self.config.workdir.display()
            )
        })?;

        let mut stats = PipelineStats::new(jobs.len());
        let semaphore = Arc::new(Semaphore::new(self.config.jobs.max(1)));
        let mut tasks = JoinSet::new();

        info!(
            measurements = jobs.len(),
            jobs = self.config.jobs.max(1),
            workdir = %self.config.workdir.display(),
            "Preparing measurements"
        );

        for job in jobs {
            let semaphore = semaphore.clone();
            let config = self.config.config.clone();
            let label = self.config.label.clone();
            tasks.spawn(async move {
                let result = prepare_job(&job, semaphore, config, label).await;
                (job, result)
            });
        }

        let mut outcomes: Vec<JobOutcome> = Vec::with_capacity(stats.measurements);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(error = %e, "Worker task failed");
                    stats.record_failure("<unknown>", e.to_string());
                    observability::record_measurement(false, 0);
                }
            }
        }
        outcomes.sort_by_key(|(job, _)| job.index);

        for (job, result) in outcomes {
            match result {
                Ok(report) => {
                    observability::record_measurement(true, report.samples);
                    stats.record_success(report);
                }
                Err(e) => {
                    error!(measurement = %job.name, error = %e, "Measurement failed");
                    observability::record_measurement(false, 0);
                    stats.record_failure(&job.name, e.to_string());
                }
            }
        }

        if let Some(dataset) = self.config.dataset.clone() {
            stats.combined = self.combine(&stats.prepared, dataset).await?;
        }

        stats.duration = start_time.elapsed();
        info!(
            prepared = stats.prepared.len(),
            failed = stats.failed(),
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline finished"
        );

        Ok(stats)
    }

    async fn combine(
        &self,
        prepared: &[PreparationReport],
        dataset: PathBuf,
    ) -> Result<Option<dataset::CombineReport>> {
        if prepared.is_empty() {
            warn!("No measurement prepared successfully, nothing to combine");
            return Ok(None);
        }

        let outputs: Vec<PathBuf> = prepared.iter().map(|r| r.output.clone()).collect();
        let target = dataset.clone();
        let report = tokio::task::spawn_blocking(move || combine_measurements(&outputs, &target))
            .await
            .context("Combine worker did not finish")?
            .with_context(|| format!("Failed to combine into {}", dataset.display()))?;
        Ok(Some(report))
    }
}

async fn prepare_job(
    job: &Job,
    semaphore: Arc<Semaphore>,
    config: Arc<PreparationConfig>,
    label: Option<String>,
) -> std::result::Result<PreparationReport, CliError> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| CliError::worker(&job.name, e.to_string()))?;

    let span = info_span!("measurement", name = %job.name);
    let source = job.source.clone();
    let target = job.target.clone();

    tokio::task::spawn_blocking(move || {
        span.in_scope(|| prepare_measurement(&source, &target, &config, label.as_deref()))
    })
    .await
    .map_err(|e| CliError::worker(&job.name, e.to_string()))?
    .map_err(|e| CliError::preparation(&job.name, e))
}

/// Directory name of a measurement
pub fn measurement_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
