//! 合并已处理的测量
//!
//! 把每个测量的传感器文件移入同一个数据集目录，并拼接各自的标签索引。
//! 移动任何文件之前先检查样本 id 是否跨测量重复。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use contracts::{ContractError, IoResultExt, Result};
use ingestion::{list_subdirectories, move_file};
use tracing::{info, instrument};

use crate::label_index::LabelIndex;

/// 合并结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombineReport {
    pub dataset: PathBuf,
    /// 合并的测量数
    pub measurements: usize,
    /// 移动的文件数
    pub files: usize,
    /// 合并后标签索引行数
    pub samples: usize,
}

/// 合并 `prepared` 中的测量到 `dataset`
///
/// `dataset` 中已有的标签索引会被保留并参与重复检查，因此可以分批合并。
/// 调用方只应传入处理成功的测量。
///
/// # Errors
/// `LabelIndexConsistency` 同一 id 出现在多个测量中
#[instrument(name = "combine_measurements", skip_all, fields(dataset = %dataset.display(), measurements = prepared.len()))]
pub fn combine_measurements(prepared: &[PathBuf], dataset: &Path) -> Result<CombineReport> {
    fs::create_dir_all(dataset).at_path(dataset)?;

    let mut combined = if LabelIndex::path_in(dataset).is_file() {
        LabelIndex::load(dataset)?
    } else {
        LabelIndex::from_rows(dataset, Vec::new())
    };

    let mut owners: BTreeMap<String, String> = combined
        .rows()
        .iter()
        .map(|row| (row.timestamp.clone(), dataset.display().to_string()))
        .collect();

    let mut indexes = Vec::with_capacity(prepared.len());
    for measurement in prepared {
        let index = LabelIndex::load(measurement)?;
        let owner = measurement.display().to_string();
        for row in index.rows() {
            if let Some(previous) = owners.insert(row.timestamp.clone(), owner.clone()) {
                return Err(ContractError::label_index(
                    row.timestamp.as_str(),
                    format!("present in both '{previous}' and '{owner}'"),
                ));
            }
        }
        indexes.push(index);
    }

    let mut report = CombineReport {
        dataset: dataset.to_path_buf(),
        ..Default::default()
    };

    for (measurement, index) in prepared.iter().zip(indexes) {
        for sensor in list_subdirectories(measurement)? {
            let source = measurement.join(&sensor);
            let target = dataset.join(&sensor);
            fs::create_dir_all(&target).at_path(&target)?;
            for entry in fs::read_dir(&source).at_path(&source)? {
                let path = entry.at_path(&source)?.path();
                if !path.is_file() {
                    continue;
                }
                if let Some(file_name) = path.file_name() {
                    move_file(&path, &target.join(file_name))?;
                    report.files += 1;
                }
            }
        }
        combined.extend(index.rows().iter().cloned());
        report.measurements += 1;
    }

    combined.save()?;
    report.samples = combined.len();

    info!(
        measurements = report.measurements,
        files = report.files,
        samples = report.samples,
        "Measurements combined"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn prepared(root: &Path, name: &str, ids: &[&str]) -> PathBuf {
        let dir = root.join(name);
        for sensor in ["HeadCamLeft", "gyroscope"] {
            fs::create_dir_all(dir.join(sensor)).unwrap();
        }
        for id in ids {
            fs::write(dir.join("HeadCamLeft").join(format!("{id}.jpg")), b"img").unwrap();
            fs::write(dir.join("gyroscope").join(format!("{id}.csv")), b"0\n").unwrap();
        }
        LabelIndex::create(&dir, ids.iter().copied(), name).unwrap();
        dir
    }

    #[test]
    fn test_combine_concatenates() {
        let root = TempDir::new().unwrap();
        let a = prepared(root.path(), "grass", &["10_00_01_000", "10_00_01_200"]);
        let b = prepared(root.path(), "gravel", &["11_00_01_000"]);
        let dataset = root.path().join("dataset");

        let report = combine_measurements(&[a, b], &dataset).unwrap();
        assert_eq!(report.measurements, 2);
        assert_eq!(report.files, 6);
        assert_eq!(report.samples, 3);

        let index = LabelIndex::load(&dataset).unwrap();
        assert_eq!(index.rows()[2].label, "gravel");
        assert!(dataset.join("gyroscope/11_00_01_000.csv").is_file());
        assert!(dataset.join("HeadCamLeft/10_00_01_200.jpg").is_file());
    }

    #[test]
    fn test_duplicate_id_moves_nothing() {
        let root = TempDir::new().unwrap();
        let a = prepared(root.path(), "grass", &["10_00_01_000"]);
        let b = prepared(root.path(), "gravel", &["10_00_01_000"]);
        let dataset = root.path().join("dataset");

        let err = combine_measurements(&[a.clone(), b], &dataset).unwrap_err();
        assert!(matches!(err, ContractError::LabelIndexConsistency { .. }));
        assert!(a.join("gyroscope/10_00_01_000.csv").is_file());
        assert!(!LabelIndex::path_in(&dataset).exists());
    }

    #[test]
    fn test_incremental_combine_checks_existing_rows() {
        let root = TempDir::new().unwrap();
        let dataset = root.path().join("dataset");
        let a = prepared(root.path(), "grass", &["10_00_01_000"]);
        combine_measurements(&[a], &dataset).unwrap();

        let again = prepared(root.path(), "grass2", &["10_00_01_000"]);
        assert!(combine_measurements(&[again], &dataset).is_err());

        let other = prepared(root.path(), "tiles", &["12_00_00_000"]);
        let report = combine_measurements(&[other], &dataset).unwrap();
        assert_eq!(report.samples, 2);
    }
}
