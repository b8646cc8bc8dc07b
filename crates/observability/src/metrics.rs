//! 预处理指标收集模块
//!
//! 各阶段完成后记录指标，并在内存中聚合跨测量的统计。

use std::collections::BTreeMap;

use contracts::PreparationReport;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// 注册全部指标的说明，导出器安装后调用一次
pub fn describe_metrics() {
    describe_counter!(
        "ftdd_prep_rows_downsampled_total",
        Unit::Count,
        "Duplicate IMU rows removed by downsampling"
    );
    describe_histogram!(
        "ftdd_prep_sync_iterations",
        Unit::Count,
        "Correction passes until all cameras were within one frame period"
    );
    describe_histogram!(
        "ftdd_prep_sync_residual_ms",
        Unit::Milliseconds,
        "Distance between corrected IMU start and the chosen camera frame"
    );
    describe_counter!(
        "ftdd_prep_missing_frames_total",
        Unit::Count,
        "Camera frames missing from the 200 ms grid"
    );
    describe_counter!(
        "ftdd_prep_duplicate_frames_total",
        Unit::Count,
        "Camera frames overwritten by an out-of-cadence duplicate"
    );
    describe_counter!("ftdd_prep_windows_emitted_total", Unit::Count, "IMU windows written");
    describe_counter!(
        "ftdd_prep_corrupt_windows_total",
        Unit::Count,
        "IMU windows dropped as sensor faults"
    );
    describe_counter!(
        "ftdd_prep_incomplete_samples_total",
        Unit::Count,
        "Sample ids removed because a sensor had no file for them"
    );
    describe_counter!(
        "ftdd_prep_measurements_total",
        Unit::Count,
        "Measurements processed, by status"
    );
    describe_gauge!(
        "ftdd_prep_last_measurement_samples",
        Unit::Count,
        "Samples kept by the most recently prepared measurement"
    );
}

/// 记录降采样结果
pub fn record_downsampling(reference_sensor: &str, rows_in: usize, rows_out: usize) {
    counter!(
        "ftdd_prep_rows_downsampled_total",
        "reference" => reference_sensor.to_string()
    )
    .increment(rows_in.saturating_sub(rows_out) as u64);
}

/// 记录同步结果
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_synchronization;
///
/// let outcome = synchronizer.synchronize(&layout)?;
/// record_synchronization(outcome.iterations, &outcome.residuals_ms);
/// ```
pub fn record_synchronization(iterations: u32, residuals_ms: &BTreeMap<String, i64>) {
    histogram!("ftdd_prep_sync_iterations").record(iterations as f64);

    for (camera, residual) in residuals_ms {
        histogram!(
            "ftdd_prep_sync_residual_ms",
            "camera" => camera.clone()
        )
        .record(*residual as f64);
    }
}

/// 记录相机重编号结果
pub fn record_renumbering(camera: &str, missing: usize, overwritten: usize) {
    if missing > 0 {
        counter!(
            "ftdd_prep_missing_frames_total",
            "camera" => camera.to_string()
        )
        .increment(missing as u64);
    }
    if overwritten > 0 {
        counter!(
            "ftdd_prep_duplicate_frames_total",
            "camera" => camera.to_string()
        )
        .increment(overwritten as u64);
    }
}

/// 记录窗口生成结果
pub fn record_windows(sensor: &str, emitted: usize, corrupt: usize) {
    counter!(
        "ftdd_prep_windows_emitted_total",
        "sensor" => sensor.to_string()
    )
    .increment(emitted as u64);

    if corrupt > 0 {
        counter!(
            "ftdd_prep_corrupt_windows_total",
            "sensor" => sensor.to_string()
        )
        .increment(corrupt as u64);
    }
}

/// 记录不完整样本数
pub fn record_incomplete_samples(count: usize) {
    counter!("ftdd_prep_incomplete_samples_total").increment(count as u64);
}

/// 记录单个测量的处理结果
pub fn record_measurement(success: bool, samples: usize) {
    let status = if success { "ok" } else { "failed" };
    counter!("ftdd_prep_measurements_total", "status" => status).increment(1);
    if success {
        gauge!("ftdd_prep_last_measurement_samples").set(samples as f64);
    }
}

/// 预处理指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct PreparationAggregator {
    /// 成功的测量数
    pub prepared: u64,

    /// 失败的测量数
    pub failed: u64,

    /// 保留的样本总数
    pub total_samples: u64,

    /// 丢失的相机帧总数
    pub missing_frames: u64,

    /// 被覆盖的重复帧总数
    pub overwritten_frames: u64,

    /// 损坏窗口总数
    pub corrupt_windows: u64,

    /// 不完整样本总数
    pub incomplete_samples: u64,

    /// 每个测量的样本数统计
    pub sample_stats: RunningStats,

    /// 同步迭代次数统计
    pub iteration_stats: RunningStats,

    /// 各相机同步残差统计
    pub residual_stats: BTreeMap<String, RunningStats>,

    /// 失败原因
    pub failures: BTreeMap<String, String>,
}

impl PreparationAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, report: &PreparationReport) {
        self.prepared += 1;
        self.total_samples += report.samples as u64;
        self.missing_frames += report.missing_frames() as u64;
        self.overwritten_frames += report.overwritten_frames() as u64;
        self.corrupt_windows += report.corrupt_windows() as u64;
        self.incomplete_samples += report.incomplete_ids.len() as u64;

        self.sample_stats.push(report.samples as f64);
        self.iteration_stats.push(report.sync.iterations as f64);

        for (camera, residual) in &report.sync.residuals_ms {
            self.residual_stats
                .entry(camera.clone())
                .or_default()
                .push(*residual as f64);
        }
    }

    /// 记录失败的测量
    pub fn record_failure(&mut self, measurement: &str, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.insert(measurement.to_string(), reason.into());
    }

    /// 生成摘要报告
    pub fn summary(&self) -> PreparationSummary {
        let total = self.prepared + self.failed;
        PreparationSummary {
            prepared: self.prepared,
            failed: self.failed,
            failure_rate: if total > 0 {
                self.failed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            total_samples: self.total_samples,
            missing_frames: self.missing_frames,
            overwritten_frames: self.overwritten_frames,
            corrupt_windows: self.corrupt_windows,
            incomplete_samples: self.incomplete_samples,
            samples_per_measurement: StatsSummary::from(&self.sample_stats),
            sync_iterations: StatsSummary::from(&self.iteration_stats),
            residual_ms: self
                .residual_stats
                .iter()
                .map(|(camera, stats)| (camera.clone(), StatsSummary::from(stats)))
                .collect(),
            failures: self.failures.clone(),
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct PreparationSummary {
    pub prepared: u64,
    pub failed: u64,
    pub failure_rate: f64,
    pub total_samples: u64,
    pub missing_frames: u64,
    pub overwritten_frames: u64,
    pub corrupt_windows: u64,
    pub incomplete_samples: u64,
    pub samples_per_measurement: StatsSummary,
    pub sync_iterations: StatsSummary,
    pub residual_ms: BTreeMap<String, StatsSummary>,
    pub failures: BTreeMap<String, String>,
}

impl std::fmt::Display for PreparationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Preparation Summary ===")?;
        writeln!(
            f,
            "Measurements: {} prepared, {} failed ({:.2}%)",
            self.prepared, self.failed, self.failure_rate
        )?;
        writeln!(f, "Samples: {}", self.total_samples)?;
        writeln!(f, "Samples per measurement: {}", self.samples_per_measurement)?;
        writeln!(f, "Sync iterations: {}", self.sync_iterations)?;
        writeln!(
            f,
            "Missing frames: {}, overwritten frames: {}",
            self.missing_frames, self.overwritten_frames
        )?;
        writeln!(
            f,
            "Corrupt windows: {}, incomplete samples: {}",
            self.corrupt_windows, self.incomplete_samples
        )?;

        if !self.residual_ms.is_empty() {
            writeln!(f, "Sync residual per camera (ms):")?;
            for (camera, stats) in &self.residual_ms {
                writeln!(f, "  {}: {}", camera, stats)?;
            }
        }

        if !self.failures.is_empty() {
            writeln!(f, "Failures:")?;
            for (measurement, reason) in &self.failures {
                writeln!(f, "  {}: {}", measurement, reason)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use contracts::{
        DownsampleReport, RenumberReport, SynchronizationOutcome, Timestamp, WindowReport,
    };
    use std::path::PathBuf;

    fn report(samples: usize) -> PreparationReport {
        let date = NaiveDate::from_ymd_opt(2023, 7, 25).unwrap();
        let t = Timestamp::decode("10_00_00_000", date).unwrap();
        let mut sync = SynchronizationOutcome {
            iterations: 2,
            ..Default::default()
        };
        sync.residuals_ms.insert("HeadCamLeft".into(), 40);
        PreparationReport {
            measurement: "m1".into(),
            output: PathBuf::from("/tmp/m1"),
            label: "tiles".into(),
            downsample: DownsampleReport::default(),
            sync,
            renumber: vec![RenumberReport {
                camera: "HeadCamLeft".into(),
                renamed: samples,
                last_timestamp: Some(t),
                missing: vec![t],
                overwritten: 2,
            }],
            windows: vec![WindowReport {
                sensor: "gyroscope".into(),
                emitted: samples,
                corrupt: vec!["10_00_01_000".into()],
                last_window_end: Some(t),
                skipped_channels: vec![],
            }],
            tail_boundary: t,
            incomplete_ids: vec!["10_00_01_000".into()],
            samples,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = PreparationAggregator::new();
        aggregator.update(&report(100));
        aggregator.update(&report(50));
        aggregator.record_failure("m3", "no camera data found");

        assert_eq!(aggregator.prepared, 2);
        assert_eq!(aggregator.failed, 1);
        assert_eq!(aggregator.total_samples, 150);
        assert_eq!(aggregator.missing_frames, 2);
        assert_eq!(aggregator.overwritten_frames, 4);
        assert_eq!(aggregator.corrupt_windows, 2);
        assert_eq!(aggregator.residual_stats["HeadCamLeft"].count(), 2);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = PreparationAggregator::new();
        aggregator.update(&report(100));
        aggregator.record_failure("m2", "synchronization diverged");

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("1 prepared, 1 failed (50.00%)"));
        assert!(output.contains("HeadCamLeft"));
        assert!(output.contains("m2: synchronization diverged"));
    }
}
