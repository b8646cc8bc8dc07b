//! Sliding windows over IMU data.
//!
//! After trimming, the per-file chunks of a timeseries sensor are concatenated
//! and cut into windows of `window_size` rows every [`WINDOW_STRIDE`] rows, so
//! each camera frame gets exactly one new window. A window is named after
//! `start + (window_size + i * stride) * 20ms`.

use std::fs;

use contracts::{
    IoResultExt, Result, Timestamp, WindowReport, IMU_SAMPLE_PERIOD_MS, WINDOW_STRIDE,
};
use ingestion::{
    concat_rows, move_file, read_samples, remove_file, write_samples, SampleArray,
    SensorStream,
};
use tracing::{info, instrument, warn};

/// Channels with a deviation below this are left unnormalized
pub const MIN_STD: f64 = 1e-5;

const STAGING_DIR: &str = ".windows";

/// Per-channel mean and population standard deviation
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ChannelStats {
    pub fn compute(samples: &SampleArray) -> Self {
        let mut mean = Vec::with_capacity(samples.ncols());
        let mut std = Vec::with_capacity(samples.ncols());
        for column in samples.column_iter() {
            if column.is_empty() {
                mean.push(0.0);
                std.push(0.0);
            } else {
                mean.push(column.mean());
                std.push(column.variance().sqrt());
            }
        }
        Self { mean, std }
    }

    /// Statistics over every file of a stream
    pub fn of_stream(stream: &SensorStream) -> Result<Self> {
        let samples = load_stream(stream)?;
        Ok(Self::compute(&samples))
    }

    /// Channels whose deviation is too small to divide by
    pub fn degenerate_channels(&self) -> Vec<usize> {
        self.std
            .iter()
            .enumerate()
            .filter(|(_, std)| **std < MIN_STD)
            .map(|(channel, _)| channel)
            .collect()
    }

    /// Z-score `samples` in place, skipping degenerate channels
    pub fn normalize(&self, samples: &mut SampleArray) {
        for (channel, mut column) in samples.column_iter_mut().enumerate() {
            let (Some(mean), Some(std)) = (self.mean.get(channel), self.std.get(channel)) else {
                continue;
            };
            if *std < MIN_STD {
                continue;
            }
            column.apply(|v| *v = (*v - mean) / std);
        }
    }
}

/// Concatenate all files of a stream in filename order
pub fn load_stream(stream: &SensorStream) -> Result<SampleArray> {
    let arrays = stream
        .entries()
        .iter()
        .map(|entry| read_samples(&entry.path))
        .collect::<Result<Vec<_>>>()?;
    concat_rows(stream.dir(), &arrays)
}

/// End timestamp of window `index`
pub fn window_end(start: Timestamp, window_size: usize, index: usize) -> Timestamp {
    let samples = (window_size + index * WINDOW_STRIDE) as i64;
    start.add_millis(samples * IMU_SAMPLE_PERIOD_MS)
}

/// Number of complete windows in `rows` rows
pub fn window_count(rows: usize, window_size: usize) -> usize {
    if window_size == 0 || rows < window_size {
        0
    } else {
        (rows - window_size) / WINDOW_STRIDE + 1
    }
}

/// Longest run of identical consecutive values in any channel
pub fn longest_identical_run(window: &SampleArray) -> usize {
    let mut longest = 0;
    for column in window.column_iter() {
        let mut run = 0;
        let mut previous: Option<f64> = None;
        for value in column.iter() {
            run = if previous == Some(*value) { run + 1 } else { 1 };
            previous = Some(*value);
            longest = longest.max(run);
        }
    }
    longest
}

/// Cuts one sensor's trimmed data into windows and replaces its files with them
#[derive(Debug, Clone)]
pub struct SlidingWindowBuilder {
    window_size: usize,
    normalization: Option<ChannelStats>,
    corrupt_threshold: Option<usize>,
}

impl SlidingWindowBuilder {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            normalization: None,
            corrupt_threshold: None,
        }
    }

    /// Z-score every window with measurement-wide statistics
    pub fn with_normalization(mut self, stats: ChannelStats) -> Self {
        self.normalization = Some(stats);
        self
    }

    /// Withhold windows whose longest identical run exceeds `threshold`
    pub fn with_corrupt_threshold(mut self, threshold: Option<usize>) -> Self {
        self.corrupt_threshold = threshold;
        self
    }

    /// Replace the chunk files of `stream` with its windows
    ///
    /// Corrupt windows are not written; their ids are reported so they can
    /// be removed from every other sensor too.
    #[instrument(name = "build_windows", skip_all, fields(sensor = %stream.name(), start = %start))]
    pub fn build(&self, stream: &SensorStream, start: Timestamp) -> Result<WindowReport> {
        let mut samples = load_stream(stream)?;
        let raw = samples.clone();

        let mut skipped_channels = Vec::new();
        if let Some(stats) = &self.normalization {
            skipped_channels = stats.degenerate_channels();
            for channel in &skipped_channels {
                warn!(
                    sensor = %stream.name(),
                    channel,
                    "Standard deviation ~0, channel left unnormalized"
                );
            }
            stats.normalize(&mut samples);
        }

        let count = window_count(samples.nrows(), self.window_size);
        let staging = stream.dir().join(STAGING_DIR);
        fs::create_dir_all(&staging).at_path(&staging)?;

        let mut report = WindowReport {
            sensor: stream.name().to_string(),
            emitted: 0,
            corrupt: Vec::new(),
            last_window_end: None,
            skipped_channels,
        };

        let mut staged = Vec::with_capacity(count);
        for index in 0..count {
            let first_row = index * WINDOW_STRIDE;
            let end = window_end(start, self.window_size, index);
            report.last_window_end = Some(end);

            if let Some(threshold) = self.corrupt_threshold {
                let run = longest_identical_run(
                    &raw.rows(first_row, self.window_size).into_owned(),
                );
                if run > threshold {
                    warn!(
                        sensor = %stream.name(),
                        window = %end,
                        run,
                        threshold,
                        "Corrupt window, sensor stuck on one value"
                    );
                    report.corrupt.push(end.encode());
                    continue;
                }
            }

            let file_name = stream.codec().file_name(end, stream.descriptor().kind.extension())?;
            let window = samples.rows(first_row, self.window_size).into_owned();
            write_samples(&staging.join(&file_name), &window)?;
            staged.push(file_name);
        }

        for entry in stream.entries() {
            remove_file(&entry.path)?;
        }
        for file_name in &staged {
            move_file(&staging.join(file_name), &stream.dir().join(file_name))?;
        }
        fs::remove_dir(&staging).at_path(&staging)?;

        report.emitted = staged.len();
        info!(
            rows = samples.nrows(),
            emitted = report.emitted,
            corrupt = report.corrupt.len(),
            "Windows built"
        );
        observability::record_windows(&report.sensor, report.emitted, report.corrupt.len());

        Ok(report)
    }
}
