//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合成测量目录 (两个相机 + 三个 IMU 传感器，已知时钟偏移)
//! - 端到端处理与合并测试

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use contracts::{Timestamp, TimestampCodec};

/// 合成测量目录
///
/// IMU 以 50 Hz 采样、约 100 Hz 记录，所以每个样本在文件中出现两次；每个文件
/// 含 50 个样本 (1 s)。头部相机比 IMU 晚 350 ms 开始并位于快 1000 ms 的远端
/// 时钟上，腹部相机以 100 ms 节拍运行并位于慢 500 ms 的远端时钟上。
#[derive(Debug, Clone)]
pub struct SyntheticMeasurement {
    pub name: String,
    pub date: NaiveDate,
    /// 第一个 IMU 文件的时间 `HH_MM_SS_mmm`
    pub start: String,
    pub imu_files: usize,
    pub head_frames: usize,
    pub belly_frames: usize,
    pub label: Option<String>,
    /// 冻结陀螺仪第一通道的样本区间 (含两端)
    pub frozen_gyroscope: Option<(usize, usize)>,
}

pub const SAMPLES_PER_FILE: usize = 50;
pub const HEAD_SHIFT_MS: i64 = 1000;
pub const BELLY_SHIFT_MS: i64 = -500;

impl SyntheticMeasurement {
    pub fn new(name: &str, start: &str) -> Self {
        Self {
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2023, 7, 25).unwrap_or_default(),
            start: start.to_string(),
            imu_files: 6,
            head_frames: 35,
            belly_frames: 70,
            label: Some("grass".to_string()),
            frozen_gyroscope: None,
        }
    }

    pub fn codec(&self) -> TimestampCodec {
        TimestampCodec::new(self.date)
    }

    /// 第一个 IMU 文件对应的时间戳
    pub fn imu_start(&self) -> contracts::Result<Timestamp> {
        self.codec().decode(&self.start)
    }

    /// 在 `parent` 下写出测量目录
    pub fn write(&self, parent: &Path) -> contracts::Result<PathBuf> {
        let root = parent.join(&self.name);
        let codec = self.codec();
        let start = self.imu_start()?;
        let io_err = |path: &Path, e: io::Error| contracts::ContractError::io(path, e);

        for sensor in ["accelerometer", "gyroscope", "footForce", "HeadCamLeft", "BellyCamLeft"] {
            let dir = root.join(sensor);
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }

        for file in 0..self.imu_files {
            let first = start.add_millis(file as i64 * 1000);
            let name = codec.file_name(first, "csv")?;
            let samples = (file * SAMPLES_PER_FILE)..((file + 1) * SAMPLES_PER_FILE);

            for (sensor, row) in [
                ("accelerometer", accelerometer as fn(usize) -> String),
                ("gyroscope", gyroscope),
                ("footForce", foot_force),
            ] {
                let mut content = String::new();
                for k in samples.clone() {
                    let line = match (sensor, self.frozen_gyroscope) {
                        ("gyroscope", Some((from, to))) if (from..=to).contains(&k) => {
                            frozen_gyroscope(k)
                        }
                        _ => row(k),
                    };
                    // each sample polled twice
                    content.push_str(&line);
                    content.push('\n');
                    content.push_str(&line);
                    content.push('\n');
                }
                let path = root.join(sensor).join(&name);
                fs::write(&path, content).map_err(|e| io_err(&path, e))?;
            }
        }

        // head camera: local start + 350 ms, every 200 ms, remote clock ahead
        for k in 0..self.head_frames {
            let local = start.add_millis(350 + k as i64 * 200);
            let path = root
                .join("HeadCamLeft")
                .join(codec.file_name(local.add_millis(HEAD_SHIFT_MS), "jpg")?);
            fs::write(&path, format!("head {k}")).map_err(|e| io_err(&path, e))?;
        }

        // belly camera: local start + 30 ms, every 100 ms, remote clock behind
        for k in 0..self.belly_frames {
            let local = start.add_millis(30 + k as i64 * 100);
            let path = root
                .join("BellyCamLeft")
                .join(codec.file_name(local.add_millis(BELLY_SHIFT_MS), "jpg")?);
            fs::write(&path, format!("belly {k}")).map_err(|e| io_err(&path, e))?;
        }

        let mut info = serde_json::json!({
            "measurement_date": self.date.format("%d.%m.%Y").to_string(),
            "time_diff_13_in_ms": {"corrected": HEAD_SHIFT_MS, "later timestamp on": "remote PC"},
            "time_diff_15_in_ms": {"corrected": -BELLY_SHIFT_MS, "later timestamp on": "local PC"},
        });
        if let Some(label) = &self.label {
            info["label"] = serde_json::Value::from(label.as_str());
        }
        let path = root.join("info.json");
        fs::write(&path, info.to_string()).map_err(|e| io_err(&path, e))?;

        Ok(root)
    }
}

fn accelerometer(k: usize) -> String {
    format!("{};{};{}", k, k as f64 * 0.5, 1 + k % 7)
}

fn gyroscope(k: usize) -> String {
    format!("{};{};{}", 1000 + k, k as f64 * 0.1 + 3.0, (k % 5) as f64 - 2.0)
}

fn frozen_gyroscope(k: usize) -> String {
    format!("{};{};{}", 0, k as f64 * 0.1 + 3.0, (k % 5) as f64 - 2.0)
}

fn foot_force(k: usize) -> String {
    format!("{};{};{};{}", 2 * k, 3 * k, 4 * k, 5 * k)
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::BTreeSet;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ContractError, PreparationConfig, SensorDescriptor};
    use dataset::{combine_measurements, prepare_measurement, LabelIndex};
    use ingestion::{read_samples, SensorStream};
    use tempfile::TempDir;

    use super::*;

    fn stream_ids(dir: &Path, descriptor: SensorDescriptor, codec: TimestampCodec) -> Vec<String> {
        SensorStream::open(&dir.join(&descriptor.name), descriptor.clone(), codec)
            .unwrap()
            .timestamps()
            .map(|t| t.encode())
            .collect()
    }

    fn sensors() -> Vec<SensorDescriptor> {
        vec![
            SensorDescriptor::timeseries("accelerometer"),
            SensorDescriptor::timeseries("gyroscope"),
            SensorDescriptor::timeseries("footForce"),
            SensorDescriptor::camera("HeadCamLeft"),
            SensorDescriptor::camera("BellyCamLeft"),
        ]
    }

    /// 端到端：降采样、两轮同步、裁剪、重编号、窗口、完整性过滤
    #[test]
    fn test_prepare_synthetic_measurement() {
        let root = TempDir::new().unwrap();
        let fixture = SyntheticMeasurement::new("2023-07-25_grass", "10_00_00_000");
        let raw = fixture.write(root.path()).unwrap();
        let work = root.path().join("work").join(&fixture.name);

        let report =
            prepare_measurement(&raw, &work, &PreparationConfig::default(), None).unwrap();

        // 600 raw rows per sensor halve to 300
        assert_eq!(report.downsample.reference_sensor, "accelerometer");
        assert_eq!(report.downsample.files, 6);
        assert_eq!(report.downsample.rows_in, 600);
        assert_eq!(report.downsample.rows_out, 300);

        // head camera 350 ms late: one correction of 340 ms
        let start = fixture.imu_start().unwrap();
        assert_eq!(report.sync.iterations, 2);
        assert_eq!(report.sync.timestamps.imu(), Some(start.add_millis(340)));
        assert!(report.sync.max_residual_ms() <= 10);

        assert_eq!(report.missing_frames(), 0);
        assert_eq!(report.label, "grass");
        // 283 rows after the head trim -> 24 windows, last one ends at +5940 ms
        assert!(report.windows.iter().all(|w| w.emitted == 24));
        assert_eq!(report.tail_boundary, start.add_millis(5940));
        // camera frames before the first window end have no IMU counterpart
        assert_eq!(report.incomplete_ids.len(), 5);
        assert_eq!(report.samples, 24);

        let codec = fixture.codec();
        let index = LabelIndex::load(&work).unwrap();
        let labelled: Vec<String> = index.rows().iter().map(|r| r.timestamp.clone()).collect();
        assert_eq!(labelled.len(), 24);
        assert_eq!(labelled[0], start.add_millis(1340).encode());
        for sensor in sensors() {
            assert_eq!(stream_ids(&work, sensor.clone(), codec), labelled, "{}", sensor.name);
        }

        let first_window =
            read_samples(&work.join("accelerometer").join(format!("{}.csv", labelled[0]))).unwrap();
        assert_eq!(first_window.nrows(), 50);
        assert_eq!(first_window[(0, 0)], 17.0);
        assert_eq!(first_window[(49, 0)], 66.0);

        // raw measurement untouched
        assert_eq!(fs::read_dir(raw.join("HeadCamLeft")).unwrap().count(), 35);
        assert!(raw.join("accelerometer/10_00_00_000.csv").is_file());
    }

    #[test]
    fn test_corrupt_windows_removed_everywhere() {
        let root = TempDir::new().unwrap();
        let mut fixture = SyntheticMeasurement::new("2023-07-25_stuck", "10_00_00_000");
        fixture.frozen_gyroscope = Some((200, 230));
        let raw = fixture.write(root.path()).unwrap();
        let work = root.path().join("work").join(&fixture.name);

        let config = ConfigLoader::load_from_str(
            "[windows]\ncorrupt_threshold = 10\n",
            ConfigFormat::Toml,
        )
        .unwrap();
        let report = prepare_measurement(&raw, &work, &config, None).unwrap();

        // frozen rows 183..=213 exceed the threshold in windows 15..=20
        assert_eq!(report.corrupt_windows(), 6);
        let start = fixture.imu_start().unwrap();
        let corrupt: BTreeSet<String> = (15..=20)
            .map(|i| start.add_millis(1340 + i * 200).encode())
            .collect();
        let gyro = report.windows.iter().find(|w| w.sensor == "gyroscope").unwrap();
        assert_eq!(gyro.corrupt.iter().cloned().collect::<BTreeSet<_>>(), corrupt);

        assert_eq!(report.samples, 18);
        let codec = fixture.codec();
        for sensor in sensors() {
            let ids = stream_ids(&work, sensor.clone(), codec);
            assert_eq!(ids.len(), 18, "{}", sensor.name);
            assert!(ids.iter().all(|id| !corrupt.contains(id)));
        }
    }

    #[test]
    fn test_divergence_keeps_raw_data() {
        let root = TempDir::new().unwrap();
        let fixture = SyntheticMeasurement::new("2023-07-25_grass", "10_00_00_000");
        let raw = fixture.write(root.path()).unwrap();
        let work = root.path().join("work").join(&fixture.name);

        let mut config = PreparationConfig::default();
        config.sync.max_iterations = 1;
        let err = prepare_measurement(&raw, &work, &config, None).unwrap_err();

        assert!(matches!(
            err,
            ContractError::SynchronizationDivergence { residual_ms: 350, .. }
        ));
        assert_eq!(fs::read_dir(raw.join("BellyCamLeft")).unwrap().count(), 70);
    }

    #[test]
    fn test_label_override_and_missing_label() {
        let root = TempDir::new().unwrap();
        let mut fixture = SyntheticMeasurement::new("2023-07-25_unlabelled", "10_00_00_000");
        fixture.label = None;
        let raw = fixture.write(root.path()).unwrap();

        let err = prepare_measurement(
            &raw,
            &root.path().join("a"),
            &PreparationConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::Configuration { .. }));

        let report = prepare_measurement(
            &raw,
            &root.path().join("b"),
            &PreparationConfig::default(),
            Some("tiles"),
        )
        .unwrap();
        assert_eq!(report.label, "tiles");
        let index = LabelIndex::load(&root.path().join("b")).unwrap();
        assert!(index.rows().iter().all(|r| r.label == "tiles"));
    }

    #[test]
    fn test_combine_two_measurements() {
        let root = TempDir::new().unwrap();
        let morning = SyntheticMeasurement::new("2023-07-25_grass", "10_00_00_000");
        let mut noon = SyntheticMeasurement::new("2023-07-25_tiles", "12_00_00_000");
        noon.label = Some("tiles".to_string());

        let mut prepared = Vec::new();
        for fixture in [&morning, &noon] {
            let raw = fixture.write(&root.path().join("raw")).unwrap();
            let work = root.path().join("work").join(&fixture.name);
            prepare_measurement(&raw, &work, &PreparationConfig::default(), None).unwrap();
            prepared.push(work);
        }

        let dataset = root.path().join("dataset");
        let report = combine_measurements(&prepared, &dataset).unwrap();
        assert_eq!(report.measurements, 2);
        assert_eq!(report.samples, 48);
        assert_eq!(report.files, 48 * 5);

        let index = LabelIndex::load(&dataset).unwrap();
        assert_eq!(index.rows()[0].label, "grass");
        assert_eq!(index.rows()[47].label, "tiles");
        let codec = morning.codec();
        for sensor in sensors() {
            assert_eq!(stream_ids(&dataset, sensor.clone(), codec).len(), 48);
        }
    }

    #[test]
    fn test_combine_rejects_overlapping_measurements() {
        let root = TempDir::new().unwrap();
        let mut prepared = Vec::new();
        for name in ["2023-07-25_a", "2023-07-25_b"] {
            let fixture = SyntheticMeasurement::new(name, "10_00_00_000");
            let raw = fixture.write(&root.path().join("raw")).unwrap();
            let work = root.path().join("work").join(name);
            prepare_measurement(&raw, &work, &PreparationConfig::default(), None).unwrap();
            prepared.push(work);
        }

        let err = combine_measurements(&prepared, &root.path().join("dataset")).unwrap_err();
        assert!(matches!(err, ContractError::LabelIndexConsistency { .. }));
    }
}
