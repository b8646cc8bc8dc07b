//! Completeness filter
//!
//! A sample id is complete when every sensor directory holds a file for it.
//! Incomplete ids are removed from all sensors and from the label index.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use contracts::{IoResultExt, Result, SensorDescriptor, SensorKind};
use ingestion::{list_subdirectories, remove_file_if_exists};
use tracing::{debug, info, instrument, warn};

use crate::label_index::LabelIndex;

/// Result of a completeness scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletenessScan {
    /// Ids missing from at least one sensor
    pub incomplete: BTreeSet<String>,
    /// Expected files that do not exist
    pub missing_files: Vec<PathBuf>,
    /// Sensor files whose id has no label row
    pub unlabelled: BTreeSet<String>,
}

/// Checks that every sample id exists in every sensor directory
#[derive(Debug, Clone)]
pub struct CompletenessFilter {
    camera_marker: String,
}

impl CompletenessFilter {
    pub fn new(camera_marker: impl Into<String>) -> Self {
        Self {
            camera_marker: camera_marker.into(),
        }
    }

    fn sensors(&self, dataset: &Path) -> Result<Vec<SensorDescriptor>> {
        Ok(list_subdirectories(dataset)?
            .into_iter()
            .map(|name| {
                let kind = SensorKind::classify(&name, &self.camera_marker);
                SensorDescriptor::new(name, kind)
            })
            .collect())
    }

    /// Find label-index ids that lack a file in some sensor
    ///
    /// Files whose id has no row are reported in `unlabelled`, never as
    /// incomplete.
    #[instrument(name = "completeness_scan", skip_all, fields(dataset = %dataset.display()))]
    pub fn scan(&self, dataset: &Path) -> Result<CompletenessScan> {
        let index = LabelIndex::load(dataset)?;
        let ids = index.ids();
        let sensors = self.sensors(dataset)?;
        let mut scan = CompletenessScan::default();

        for sensor in &sensors {
            for id in &ids {
                let path = dataset.join(&sensor.name).join(sensor.file_name(id));
                if !path.is_file() {
                    scan.incomplete.insert(id.to_string());
                    scan.missing_files.push(path);
                }
            }

            let dir = dataset.join(&sensor.name);
            for entry in fs::read_dir(&dir).at_path(&dir)? {
                let path = entry.at_path(&dir)?.path();
                if !path.is_file() {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if stem.starts_with('.') || ids.contains(stem) {
                    continue;
                }
                if scan.unlabelled.insert(stem.to_string()) {
                    debug!(sensor = %sensor.name, id = stem, "Sample without label row");
                }
            }
        }

        info!(
            sensors = sensors.len(),
            samples = ids.len(),
            incomplete = scan.incomplete.len(),
            unlabelled = scan.unlabelled.len(),
            "Completeness scan finished"
        );
        Ok(scan)
    }

    /// Delete the files of `ids` from every sensor; returns the number removed
    pub fn delete(&self, dataset: &Path, ids: &BTreeSet<String>) -> Result<usize> {
        let mut removed = 0;
        for sensor in self.sensors(dataset)? {
            for id in ids {
                if remove_file_if_exists(&dataset.join(&sensor.name).join(sensor.file_name(id)))? {
                    removed += 1;
                }
            }
        }
        debug!(ids = ids.len(), files = removed, "Incomplete samples deleted");
        Ok(removed)
    }

    /// Drop the rows of `ids` from the label index
    ///
    /// # Errors
    /// `LabelIndexConsistency` if an id matches no row or more than one; the
    /// index on disk is left unchanged then.
    pub fn update_label_index(&self, dataset: &Path, ids: &BTreeSet<String>) -> Result<usize> {
        let mut index = LabelIndex::load(dataset)?;
        let removed = index.remove_ids(ids)?;
        index.save()?;
        Ok(removed)
    }

    /// Scan, delete and update the index in one pass
    ///
    /// Unlabelled files are deleted along with incomplete ids.
    pub fn run(&self, dataset: &Path) -> Result<CompletenessScan> {
        let scan = self.scan(dataset)?;

        for path in &scan.missing_files {
            warn!(path = %path.display(), "Sample file missing");
        }
        if !scan.unlabelled.is_empty() {
            warn!(ids = scan.unlabelled.len(), "Deleting sample files without label row");
            self.delete(dataset, &scan.unlabelled)?;
        }
        if !scan.incomplete.is_empty() {
            self.delete(dataset, &scan.incomplete)?;
            self.update_label_index(dataset, &scan.incomplete)?;
            observability::record_incomplete_samples(scan.incomplete.len());
        }
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label_index::LabelRow;
    use contracts::ContractError;
    use tempfile::TempDir;

    fn touch(root: &Path, sensor: &str, file: &str) {
        fs::create_dir_all(root.join(sensor)).unwrap();
        fs::write(root.join(sensor).join(file), b"0").unwrap();
    }

    fn dataset() -> TempDir {
        let root = TempDir::new().unwrap();
        for id in ["a", "b", "c"] {
            touch(root.path(), "HeadCamLeft", &format!("{id}.jpg"));
        }
        for id in ["a", "c"] {
            touch(root.path(), "gyroscope", &format!("{id}.csv"));
        }
        LabelIndex::create(root.path(), ["a", "b", "c"], "grass").unwrap();
        root
    }

    #[test]
    fn test_scan_reports_missing() {
        let root = dataset();
        let scan = CompletenessFilter::new("Cam").scan(root.path()).unwrap();
        assert_eq!(scan.incomplete, BTreeSet::from(["b".to_string()]));
        assert_eq!(scan.missing_files, vec![root.path().join("gyroscope/b.csv")]);
    }

    #[test]
    fn test_run_removes_everywhere() {
        let root = dataset();
        // a window without label row is deleted but never looked up in the index
        touch(root.path(), "gyroscope", "d.csv");

        let scan = CompletenessFilter::new("Cam").run(root.path()).unwrap();
        assert_eq!(scan.incomplete, BTreeSet::from(["b".to_string()]));
        assert_eq!(scan.unlabelled, BTreeSet::from(["d".to_string()]));

        assert!(!root.path().join("HeadCamLeft/b.jpg").exists());
        assert!(!root.path().join("gyroscope/d.csv").exists());
        let index = LabelIndex::load(root.path()).unwrap();
        assert_eq!(index.ids(), BTreeSet::from(["a", "c"]));

        let again = CompletenessFilter::new("Cam").scan(root.path()).unwrap();
        assert!(again.incomplete.is_empty());
    }

    #[test]
    fn test_delete_tolerates_absent_files() {
        let root = dataset();
        let removed = CompletenessFilter::new("Cam")
            .delete(root.path(), &BTreeSet::from(["b".to_string()]))
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_update_rejects_absent_id() {
        let root = dataset();
        let err = CompletenessFilter::new("Cam")
            .update_label_index(
                root.path(),
                &BTreeSet::from(["a".to_string(), "zzz".to_string()]),
            )
            .unwrap_err();
        assert!(matches!(err, ContractError::LabelIndexConsistency { ref id, .. } if id == "zzz"));
        assert_eq!(LabelIndex::load(root.path()).unwrap().len(), 3);
    }

    #[test]
    fn test_update_rejects_duplicate_row() {
        let root = dataset();
        let mut index = LabelIndex::load(root.path()).unwrap();
        index.extend([LabelRow::new("b", "grass")]);
        index.save().unwrap();

        let filter = CompletenessFilter::new("Cam");
        let err = filter
            .update_label_index(root.path(), &BTreeSet::from(["b".to_string()]))
            .unwrap_err();
        assert!(matches!(err, ContractError::LabelIndexConsistency { .. }));
        assert_eq!(LabelIndex::load(root.path()).unwrap().len(), 4);

        let removed = filter
            .update_label_index(
                root.path(),
                &BTreeSet::from(["a".to_string(), "c".to_string()]),
            )
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(LabelIndex::load(root.path()).unwrap().len(), 2);
    }
}
