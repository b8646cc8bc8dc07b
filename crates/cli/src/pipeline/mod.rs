//! Pipeline orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{measurement_name, Pipeline, PipelineConfig};
pub use stats::PipelineStats;
