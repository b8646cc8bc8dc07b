//! 相机重编号
//!
//! 把已裁剪的图像按 200 ms 固定节拍重新命名，起点为同步后的 IMU 起始时间。
//! 相邻帧间隔用 180 ms 作除数换算成节拍数，以吸收定时抖动：
//! - 节拍数 > 1：中间缺帧，记录缺失的节拍时间戳
//! - 节拍数 = 0 且间隔 > 150 ms：视为下一帧
//! - 节拍数 = 0 且间隔 <= 150 ms：重复拍摄，覆盖上一个节拍

use std::fs;

use contracts::{IoResultExt, RenumberReport, Result, Timestamp, CAMERA_FRAME_PERIOD_MS};
use ingestion::{move_file, SensorStream};
use tracing::{info, instrument, warn};

/// 抖动容忍的节拍除数
pub const PERIOD_DIVISOR_MS: i64 = 180;

/// 节拍数为 0 时仍视为新帧的最小间隔
pub const DUPLICATE_THRESHOLD_MS: i64 = 150;

const STAGING_DIR: &str = ".renumber";

/// 重编号计划
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenumberPlan {
    /// 与输入一一对应的新时间戳
    pub targets: Vec<Timestamp>,
    /// 缺失的节拍
    pub missing: Vec<Timestamp>,
    /// 覆盖上一节拍的帧数
    pub overwritten: usize,
}

impl RenumberPlan {
    /// 最后一个分配的节拍
    pub fn last(&self) -> Option<Timestamp> {
        self.targets.last().copied()
    }
}

/// 根据原始时间戳 (已排序) 计算新时间戳
pub fn plan_renumbering(frames: &[Timestamp], start: Timestamp) -> RenumberPlan {
    let mut plan = RenumberPlan::default();
    let mut previous_present: Option<Timestamp> = None;
    let mut previous_new = start;

    for frame in frames {
        if let Some(previous) = previous_present {
            let elapsed = frame.millis_since(previous);
            let mut periods = elapsed / PERIOD_DIVISOR_MS;

            if periods == 0 {
                if elapsed > DUPLICATE_THRESHOLD_MS {
                    periods = 1;
                } else {
                    plan.overwritten += 1;
                }
            }
            for k in 1..periods {
                plan.missing
                    .push(previous_new.add_millis(k * CAMERA_FRAME_PERIOD_MS));
            }
            previous_new = previous_new.add_millis(periods * CAMERA_FRAME_PERIOD_MS);
        }

        plan.targets.push(previous_new);
        previous_present = Some(*frame);
    }
    plan
}

/// 按计划重命名一个相机目录下的全部图像
///
/// 文件先整体移入暂存目录再移回新名字，避免新旧文件名冲突；重复帧按顺序覆盖。
#[instrument(name = "renumber_images", skip_all, fields(camera = %stream.name(), start = %start))]
pub fn renumber_images(stream: &SensorStream, start: Timestamp) -> Result<RenumberReport> {
    let entries = stream.require_entries()?;
    let frames: Vec<Timestamp> = entries.iter().map(|e| e.timestamp).collect();
    let plan = plan_renumbering(&frames, start);

    for missing in &plan.missing {
        warn!(camera = %stream.name(), timestamp = %missing, "Missing camera frame");
    }
    if plan.overwritten > 0 {
        warn!(
            camera = %stream.name(),
            overwritten = plan.overwritten,
            "Duplicate frames overwrote their predecessor"
        );
    }

    let staging = stream.dir().join(STAGING_DIR);
    fs::create_dir_all(&staging).at_path(&staging)?;

    for entry in entries {
        move_file(&entry.path, &staging.join(entry.file_name()))?;
    }
    for (entry, target) in entries.iter().zip(&plan.targets) {
        move_file(&staging.join(entry.file_name()), &stream.path_for(*target)?)?;
    }
    fs::remove_dir(&staging).at_path(&staging)?;

    let report = RenumberReport {
        camera: stream.name().to_string(),
        renamed: entries.len() - plan.overwritten,
        last_timestamp: plan.last(),
        missing: plan.missing,
        overwritten: plan.overwritten,
    };

    info!(
        renamed = report.renamed,
        missing = report.missing.len(),
        overwritten = report.overwritten,
        "Camera renumbered"
    );
    observability::record_renumbering(&report.camera, report.missing.len(), report.overwritten);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use contracts::{SensorDescriptor, TimestampCodec};
    use tempfile::TempDir;

    fn codec() -> TimestampCodec {
        TimestampCodec::new(NaiveDate::from_ymd_opt(2023, 7, 25).unwrap())
    }

    fn at(ms: i64) -> Timestamp {
        codec().decode("10_00_00_000").unwrap().add_millis(ms)
    }

    fn offsets(timestamps: &[Timestamp]) -> Vec<i64> {
        timestamps.iter().map(|t| t.millis_since(at(0))).collect()
    }

    #[test]
    fn test_jitter_absorbed() {
        let frames: Vec<_> = [0, 200, 410, 600].iter().map(|ms| at(*ms)).collect();
        let plan = plan_renumbering(&frames, at(0));
        assert_eq!(offsets(&plan.targets), vec![0, 200, 400, 600]);
        assert!(plan.missing.is_empty());
        assert_eq!(plan.overwritten, 0);
    }

    #[test]
    fn test_gap_logs_missing_slot() {
        let frames: Vec<_> = [0, 200, 600].iter().map(|ms| at(*ms)).collect();
        let plan = plan_renumbering(&frames, at(0));
        assert_eq!(offsets(&plan.targets), vec![0, 200, 600]);
        assert_eq!(offsets(&plan.missing), vec![400]);
    }

    #[test]
    fn test_duplicate_and_late_zero_period() {
        // 80ms apart overwrites, 170ms apart counts as the next frame
        let frames: Vec<_> = [0, 80, 250].iter().map(|ms| at(*ms)).collect();
        let plan = plan_renumbering(&frames, at(1000));
        assert_eq!(offsets(&plan.targets), vec![1000, 1000, 1200]);
        assert_eq!(plan.overwritten, 1);
    }

    #[test]
    fn test_first_frame_takes_start() {
        let plan = plan_renumbering(&[at(37)], at(-3));
        assert_eq!(offsets(&plan.targets), vec![-3]);
        assert_eq!(plan.last(), Some(at(-3)));
        assert!(plan_renumbering(&[], at(0)).last().is_none());
    }

    #[test]
    fn test_renumber_on_disk() {
        let dir = TempDir::new().unwrap();
        for ms in [15, 215, 290, 690, 890] {
            std::fs::write(dir.path().join(codec().file_name(at(ms), "jpg").unwrap()), ms.to_string())
                .unwrap();
        }
        let stream =
            SensorStream::open(dir.path(), SensorDescriptor::camera("HeadCamLeft"), codec())
                .unwrap();

        let report = renumber_images(&stream, at(0)).unwrap();
        assert_eq!(report.renamed, 4);
        assert_eq!(report.overwritten, 1);
        assert_eq!(offsets(&report.missing), vec![400]);
        assert_eq!(report.last_timestamp, Some(at(800)));

        let renamed =
            SensorStream::open(dir.path(), SensorDescriptor::camera("HeadCamLeft"), codec())
                .unwrap();
        assert_eq!(offsets(&renamed.timestamps().collect::<Vec<_>>()), vec![0, 200, 600, 800]);
        // the later duplicate wins the slot
        let content = std::fs::read_to_string(renamed.path_for(at(200)).unwrap()).unwrap();
        assert_eq!(content, "290");
        assert!(!dir.path().join(STAGING_DIR).exists());
    }
}
