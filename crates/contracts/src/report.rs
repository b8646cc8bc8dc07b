//! Stage reports
//!
//! Every preparation stage returns a small report of what it changed. The
//! driver bundles them into a `PreparationReport`, observability aggregates
//! them across measurements.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{SynchronizationOutcome, Timestamp};

/// Result of downsampling all timeseries sensors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownsampleReport {
    /// Sensor whose duplicate pattern drove the decision
    pub reference_sensor: String,
    /// Sensors rewritten in lockstep
    pub sensors: usize,
    /// Files processed per sensor
    pub files: usize,
    /// Reference rows before downsampling
    pub rows_in: usize,
    /// Reference rows after downsampling
    pub rows_out: usize,
    /// Longest run of identical values seen
    pub max_run: usize,
    /// Runs with odd length (rounded up)
    pub odd_runs: usize,
    /// Runs with even length
    pub even_runs: usize,
}

impl DownsampleReport {
    /// Share of odd runs in percent
    pub fn odd_ratio_percent(&self) -> f64 {
        let runs = self.odd_runs + self.even_runs;
        if runs == 0 {
            0.0
        } else {
            self.odd_runs as f64 * 100.0 / runs as f64
        }
    }
}

/// Result of renumbering one camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenumberReport {
    pub camera: String,
    /// Files that received a slot on the fixed-rate timeline
    pub renamed: usize,
    /// Timestamp of the last assigned slot
    pub last_timestamp: Option<Timestamp>,
    /// Nominal slots with no capture
    pub missing: Vec<Timestamp>,
    /// Captures that replaced the previous slot
    pub overwritten: usize,
}

/// Result of cutting windows for one timeseries sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowReport {
    pub sensor: String,
    /// Windows written
    pub emitted: usize,
    /// Window ids withheld as sensor faults
    pub corrupt: Vec<String>,
    /// End timestamp of the last cut window, written or not
    pub last_window_end: Option<Timestamp>,
    /// Channels left unnormalized because their deviation was ~0
    pub skipped_channels: Vec<usize>,
}

/// Outcome of preparing one measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparationReport {
    /// Measurement directory name
    pub measurement: String,
    /// Prepared working directory
    pub output: PathBuf,
    pub label: String,
    pub downsample: DownsampleReport,
    pub sync: SynchronizationOutcome,
    pub renumber: Vec<RenumberReport>,
    pub windows: Vec<WindowReport>,
    /// Last timestamp every sensor covers
    pub tail_boundary: Timestamp,
    /// Ids dropped because at least one sensor lacked them
    pub incomplete_ids: Vec<String>,
    /// Rows left in the label index
    pub samples: usize,
}

impl PreparationReport {
    pub fn missing_frames(&self) -> usize {
        self.renumber.iter().map(|r| r.missing.len()).sum()
    }

    pub fn overwritten_frames(&self) -> usize {
        self.renumber.iter().map(|r| r.overwritten).sum()
    }

    pub fn corrupt_windows(&self) -> usize {
        self.windows.iter().map(|w| w.corrupt.len()).sum()
    }
}
