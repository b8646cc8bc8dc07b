//! IMU 降采样
//!
//! 机器人内部 IMU 以 50 Hz 输出，采集端以约 100 Hz 轮询，所以大部分值会连续出现两次，
//! 偶尔只出现一次。降采样按参考传感器第一通道的连续相同值游程决定每个值保留几份：
//! 偶数长度 `n` 保留 `n / 2`，奇数长度保留 `n / 2 + 1`。
//!
//! 所有时间序列传感器同步采样，因此用参考传感器得出的行索引同时作用于全部传感器，
//! 保证各传感器行数始终一致。

use contracts::{ContractError, DownsampleReport, Result, SensorDescriptor};
use ingestion::{read_samples, select_rows, write_samples, MeasurementLayout, SampleArray};
use tracing::{debug, info, instrument};

/// 一段连续相同值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// 游程起始行
    pub start: usize,
    /// 游程长度
    pub len: usize,
}

/// 游程长度对应的保留份数
pub fn downsampled_count(run_len: usize) -> usize {
    if run_len % 2 == 0 {
        run_len / 2
    } else {
        run_len / 2 + 1
    }
}

/// 按第一通道划分最大连续相同值游程
pub fn detect_runs(reference: &SampleArray) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    if reference.ncols() == 0 {
        return runs;
    }

    let column = reference.column(0);
    for (row, value) in column.iter().enumerate() {
        match runs.last_mut() {
            Some(run) if column[run.start] == *value => run.len += 1,
            _ => runs.push(Run { start: row, len: 1 }),
        }
    }
    runs
}

/// 单个文件的降采样计划
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownsamplePlan {
    /// 输入行数
    pub rows_in: usize,
    /// 输出行对应的原始行索引
    pub rows: Vec<usize>,
    pub max_run: usize,
    pub odd_runs: usize,
    pub even_runs: usize,
}

impl DownsamplePlan {
    /// 根据参考数组生成计划
    pub fn from_reference(reference: &SampleArray) -> Self {
        let mut plan = Self {
            rows_in: reference.nrows(),
            ..Self::default()
        };
        for run in detect_runs(reference) {
            if run.len % 2 == 0 {
                plan.even_runs += 1;
            } else {
                plan.odd_runs += 1;
            }
            plan.max_run = plan.max_run.max(run.len);
            plan.rows
                .extend(std::iter::repeat_n(run.start, downsampled_count(run.len)));
        }
        plan
    }

    /// 将计划应用到任意传感器的同名文件
    pub fn apply(&self, samples: &SampleArray) -> SampleArray {
        select_rows(samples, &self.rows)
    }
}

/// IMU 降采样器
#[derive(Debug, Clone)]
pub struct ImuDownsampler {
    reference_sensors: Vec<String>,
}

impl ImuDownsampler {
    /// `reference_sensors` 为可作参考的传感器名，按优先级排列
    pub fn new(reference_sensors: Vec<String>) -> Self {
        Self { reference_sensors }
    }

    /// 对测量中所有时间序列传感器降采样，原文件被覆盖
    ///
    /// 文件按文件名 (即时间) 顺序处理。
    ///
    /// # Errors
    /// - `NoImuData` 没有时间序列目录，或没有可用的参考传感器
    /// - `SampleFormat` 同名文件在不同传感器间行数不一致
    #[instrument(name = "imu_downsample", skip_all, fields(measurement = %layout.measurement_name()))]
    pub fn run(&self, layout: &MeasurementLayout) -> Result<DownsampleReport> {
        let sensors = layout.require_timeseries()?;
        let reference = layout.reference_sensor(&self.reference_sensors)?;
        let reference_stream = layout.open_stream(reference)?;
        reference_stream.require_entries()?;

        info!(
            reference = %reference.name,
            sensors = sensors.len(),
            files = reference_stream.len(),
            "Downsampling timeseries sensors"
        );

        let mut report = DownsampleReport {
            reference_sensor: reference.name.clone(),
            sensors: sensors.len(),
            ..Default::default()
        };

        for entry in reference_stream.entries() {
            let file_name = entry.file_name();
            let plan = self.downsample_file(layout, reference, &sensors, &file_name)?;

            report.files += 1;
            report.rows_in += plan.rows_in;
            report.rows_out += plan.rows.len();
            report.max_run = report.max_run.max(plan.max_run);
            report.odd_runs += plan.odd_runs;
            report.even_runs += plan.even_runs;
        }

        info!(
            reference = %report.reference_sensor,
            files = report.files,
            rows_out = report.rows_out,
            max_run = report.max_run,
            odd_percent = report.odd_ratio_percent(),
            "Downsampling finished"
        );
        observability::record_downsampling(&report.reference_sensor, report.rows_in, report.rows_out);

        Ok(report)
    }

    /// 对一个文件名在所有传感器上执行降采样，返回所用计划
    fn downsample_file(
        &self,
        layout: &MeasurementLayout,
        reference: &SensorDescriptor,
        sensors: &[&SensorDescriptor],
        file_name: &str,
    ) -> Result<DownsamplePlan> {
        let reference_path = layout.sensor_dir(reference).join(file_name);
        let reference_samples = read_samples(&reference_path)?;
        let plan = DownsamplePlan::from_reference(&reference_samples);

        for sensor in sensors {
            let path = layout.sensor_dir(sensor).join(file_name);
            let samples = if sensor.name == reference.name {
                reference_samples.clone()
            } else {
                read_samples(&path)?
            };

            if samples.nrows() != reference_samples.nrows() {
                return Err(ContractError::sample_format(
                    &path,
                    format!(
                        "{} rows, reference sensor '{}' has {}",
                        samples.nrows(),
                        reference.name,
                        reference_samples.nrows()
                    ),
                ));
            }

            write_samples(&path, &plan.apply(&samples))?;
        }

        debug!(
            file = file_name,
            rows_in = reference_samples.nrows(),
            rows_out = plan.rows.len(),
            max_run = plan.max_run,
            "File downsampled"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use contracts::TimestampCodec;
    use nalgebra::DMatrix;
    use rand::Rng;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn column(values: &[f64]) -> SampleArray {
        DMatrix::from_column_slice(values.len(), 1, values)
    }

    #[test]
    fn test_downsampled_count() {
        assert_eq!(downsampled_count(1), 1);
        assert_eq!(downsampled_count(2), 1);
        assert_eq!(downsampled_count(6), 3);
        assert_eq!(downsampled_count(7), 4);
    }

    #[test]
    fn test_runs_use_first_channel() {
        let data = DMatrix::from_row_slice(
            5,
            2,
            &[1.0, 10.0, 1.0, 11.0, 2.0, 12.0, 2.0, 12.0, 1.0, 13.0],
        );
        let runs = detect_runs(&data);
        assert_eq!(
            runs,
            vec![
                Run { start: 0, len: 2 },
                Run { start: 2, len: 2 },
                Run { start: 4, len: 1 }
            ]
        );
    }

    #[test]
    fn test_plan_keeps_run_start_rows() {
        let reference = column(&[5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 6.0, 6.0, 6.0, 6.0, 6.0, 6.0]);
        let plan = DownsamplePlan::from_reference(&reference);
        assert_eq!(plan.rows, vec![0, 0, 0, 0, 7, 7, 7]);
        assert_eq!(plan.odd_runs, 1);
        assert_eq!(plan.even_runs, 1);
        assert_eq!(plan.max_run, 7);
    }

    #[test]
    fn test_random_runs_halved() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let mut values = Vec::new();
            let mut expected = 0;
            let runs: usize = rng.random_range(1..20);
            for run in 0..runs {
                let len: usize = rng.random_range(1..9);
                expected += len.div_ceil(2);
                values.extend(std::iter::repeat_n(run as f64, len));
            }
            let plan = DownsamplePlan::from_reference(&column(&values));
            assert_eq!(plan.rows.len(), expected);
            assert_eq!(plan.odd_runs + plan.even_runs, runs);
        }
    }

    fn write(dir: &Path, sensor: &str, file: &str, content: &str) {
        fs::create_dir_all(dir.join(sensor)).unwrap();
        fs::write(dir.join(sensor).join(file), content).unwrap();
    }

    fn layout(root: &Path) -> MeasurementLayout {
        let codec = TimestampCodec::new(NaiveDate::from_ymd_opt(2023, 7, 25).unwrap());
        MeasurementLayout::discover(root, codec, "Cam").unwrap()
    }

    #[test]
    fn test_lockstep_across_sensors() {
        let root = TempDir::new().unwrap();
        write(root.path(), "gyroscope", "10_00_00_000.csv", "1;0\n1;0\n2;0\n3;0\n3;0\n");
        write(root.path(), "footForce", "10_00_00_000.csv", "10\n11\n12\n13\n14\n");
        fs::create_dir(root.path().join("HeadCamLeft")).unwrap();

        let downsampler = ImuDownsampler::new(vec!["gyroscope".into()]);
        let report = downsampler.run(&layout(root.path())).unwrap();

        assert_eq!(report.reference_sensor, "gyroscope");
        assert_eq!(report.files, 1);
        assert_eq!(report.rows_in, 5);
        assert_eq!(report.rows_out, 3);

        let foot = read_samples(&root.path().join("footForce/10_00_00_000.csv")).unwrap();
        assert_eq!(foot.as_slice(), &[10.0, 12.0, 13.0]);
        let gyro = read_samples(&root.path().join("gyroscope/10_00_00_000.csv")).unwrap();
        assert_eq!(gyro.nrows(), 3);
    }

    #[test]
    fn test_no_reference_sensor() {
        let root = TempDir::new().unwrap();
        write(root.path(), "footForce", "10_00_00_000.csv", "10\n");
        let err = ImuDownsampler::new(vec!["gyroscope".into()])
            .run(&layout(root.path()))
            .unwrap_err();
        assert!(matches!(err, ContractError::NoImuData { .. }));
    }

    #[test]
    fn test_row_mismatch_rejected() {
        let root = TempDir::new().unwrap();
        write(root.path(), "gyroscope", "10_00_00_000.csv", "1\n1\n2\n");
        write(root.path(), "velocity", "10_00_00_000.csv", "1\n");
        let err = ImuDownsampler::new(vec!["gyroscope".into()])
            .run(&layout(root.path()))
            .unwrap_err();
        assert!(matches!(err, ContractError::SampleFormat { .. }));
    }
}
