//! 传感器描述
//!
//! 每个传感器对应测量目录下的一个子目录。

use serde::{Deserialize, Serialize};

/// 同步结果中 IMU 组的键
pub const IMU_GROUP_KEY: &str = "IMU";

/// 立体相机文件名前缀 (两个半边共用一个目录时出现)
pub const STEREO_PREFIXES: [&str; 2] = ["Left_", "Right_"];

/// 传感器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// 图像流 (.jpg)
    Camera,
    /// 时间序列流 (.csv, `;` 分隔)
    Timeseries,
}

impl SensorKind {
    /// 根据目录名判断类型：包含 `camera_marker` 即为相机
    pub fn classify(name: &str, camera_marker: &str) -> Self {
        if name.contains(camera_marker) {
            Self::Camera
        } else {
            Self::Timeseries
        }
    }

    /// 样本文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Camera => "jpg",
            Self::Timeseries => "csv",
        }
    }
}

/// 传感器描述符
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorDescriptor {
    /// 目录名
    pub name: String,

    /// 传感器类型
    pub kind: SensorKind,
}

impl SensorDescriptor {
    pub fn new(name: impl Into<String>, kind: SensorKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn camera(name: impl Into<String>) -> Self {
        Self::new(name, SensorKind::Camera)
    }

    pub fn timeseries(name: impl Into<String>) -> Self {
        Self::new(name, SensorKind::Timeseries)
    }

    pub fn is_camera(&self) -> bool {
        self.kind == SensorKind::Camera
    }

    /// 某个样本 id 在该传感器下的文件名
    pub fn file_name(&self, id: &str) -> String {
        format!("{id}.{}", self.kind.extension())
    }
}

/// 相机组 (共用同一个远端时钟)
///
/// 编号与 `info.json` 中 `time_diff_<n>_in_ms` 对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraGroup {
    /// 13: Chin / Head
    ChinHead,
    /// 14: Left / Right
    LeftRight,
    /// 15: Belly
    Belly,
}

impl CameraGroup {
    pub const ALL: [CameraGroup; 3] = [Self::ChinHead, Self::LeftRight, Self::Belly];

    /// 组编号
    pub fn id(&self) -> u8 {
        match self {
            Self::ChinHead => 13,
            Self::LeftRight => 14,
            Self::Belly => 15,
        }
    }

    /// `info.json` 中的键名
    pub fn info_key(&self) -> String {
        format!("time_diff_{}_in_ms", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(SensorKind::classify("HeadCamLeft", "Cam"), SensorKind::Camera);
        assert_eq!(SensorKind::classify("BellyCam", "Cam"), SensorKind::Camera);
        assert_eq!(
            SensorKind::classify("accelerometer", "Cam"),
            SensorKind::Timeseries
        );
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            SensorDescriptor::camera("ChinCamLeft").file_name("10_00_00_000"),
            "10_00_00_000.jpg"
        );
        assert_eq!(
            SensorDescriptor::timeseries("gyroscope").file_name("10_00_00_000"),
            "10_00_00_000.csv"
        );
    }

    #[test]
    fn test_group_keys() {
        assert_eq!(CameraGroup::ChinHead.info_key(), "time_diff_13_in_ms");
        assert_eq!(CameraGroup::LeftRight.info_key(), "time_diff_14_in_ms");
        assert_eq!(CameraGroup::Belly.info_key(), "time_diff_15_in_ms");
    }
}
