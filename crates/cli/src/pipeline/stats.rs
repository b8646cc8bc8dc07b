//! Pipeline statistics and metrics.

use std::time::Duration;

use dataset::{CombineReport, PreparationReport};
use observability::PreparationAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Measurements handed to the pipeline
    pub measurements: usize,

    /// Reports of successfully prepared measurements, in input order
    pub prepared: Vec<PreparationReport>,

    /// Result of combining into the dataset, if requested
    pub combined: Option<CombineReport>,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Preparation metrics aggregator
    pub aggregator: PreparationAggregator,
}

impl PipelineStats {
    pub fn new(measurements: usize) -> Self {
        Self {
            measurements,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self, report: PreparationReport) {
        self.aggregator.update(&report);
        self.prepared.push(report);
    }

    pub fn record_failure(&mut self, measurement: &str, reason: impl Into<String>) {
        self.aggregator.record_failure(measurement, reason);
    }

    pub fn failed(&self) -> usize {
        self.aggregator.failed as usize
    }

    /// Samples left over all prepared measurements
    pub fn samples(&self) -> usize {
        self.prepared.iter().map(|r| r.samples).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Preparation Statistics                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Measurements: {}", self.measurements);
        println!("   ├─ Prepared: {}", self.prepared.len());
        println!("   ├─ Failed: {}", self.failed());
        println!("   └─ Samples: {}", self.samples());

        if !self.prepared.is_empty() {
            println!("\n📁 Measurements");
            for (i, report) in self.prepared.iter().enumerate() {
                let prefix = if i + 1 == self.prepared.len() { "└─" } else { "├─" };
                println!(
                    "   {} {} [{}]: {} samples, {} missing frames, {} corrupt windows -> {}",
                    prefix,
                    report.measurement,
                    report.label,
                    report.samples,
                    report.missing_frames(),
                    report.corrupt_windows(),
                    report.output.display()
                );
            }
        }

        if let Some(ref combined) = self.combined {
            println!("\n🗂  Dataset");
            println!("   ├─ Path: {}", combined.dataset.display());
            println!("   ├─ Measurements: {}", combined.measurements);
            println!("   ├─ Files moved: {}", combined.files);
            println!("   └─ Samples: {}", combined.samples);
        }

        println!("\n📈 {}", self.aggregator.summary());
    }
}
