//! PreparationConfig - Config Loader output
//!
//! Everything the preparation stages read from configuration. All sections
//! default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::CameraGroup;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete preparation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreparationConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Sensor discovery and camera grouping
    #[serde(default)]
    pub sensors: SensorLayoutConfig,

    /// Timestamp synchronization
    #[serde(default)]
    pub sync: SyncConfig,

    /// IMU sliding windows
    #[serde(default)]
    pub windows: WindowConfig,

    /// Label index
    #[serde(default)]
    pub labels: LabelConfig,
}

/// How sensor directories are recognised
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorLayoutConfig {
    /// Directory names containing this marker are cameras
    #[serde(default = "default_camera_marker")]
    pub camera_marker: String,

    /// Timeseries sensors whose duplicate pattern may drive downsampling,
    /// in order of preference
    #[serde(default = "default_reference_sensors")]
    pub reference_sensors: Vec<String>,

    /// Cameras capturing at twice the nominal rate (matched by substring)
    #[serde(default = "default_double_rate_cameras")]
    pub double_rate_cameras: Vec<String>,

    /// Directory-name prefix to clock group mapping
    #[serde(default = "default_camera_groups")]
    pub camera_groups: Vec<CameraGroupRule>,
}

impl Default for SensorLayoutConfig {
    fn default() -> Self {
        Self {
            camera_marker: default_camera_marker(),
            reference_sensors: default_reference_sensors(),
            double_rate_cameras: default_double_rate_cameras(),
            camera_groups: default_camera_groups(),
        }
    }
}

impl SensorLayoutConfig {
    /// Clock group for a camera directory, first matching prefix wins
    pub fn camera_group(&self, camera: &str) -> Option<CameraGroup> {
        self.camera_groups
            .iter()
            .find(|rule| camera.starts_with(&rule.prefix))
            .map(|rule| rule.group)
    }

    /// Whether a camera needs thinning from 100 ms to 200 ms cadence
    pub fn is_double_rate(&self, camera: &str) -> bool {
        self.double_rate_cameras
            .iter()
            .any(|marker| camera.contains(marker.as_str()))
    }
}

/// Maps a directory-name prefix to a camera clock group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraGroupRule {
    pub prefix: String,
    pub group: CameraGroup,
}

impl CameraGroupRule {
    pub fn new(prefix: impl Into<String>, group: CameraGroup) -> Self {
        Self {
            prefix: prefix.into(),
            group,
        }
    }
}

fn default_camera_marker() -> String {
    "Cam".to_string()
}

fn default_reference_sensors() -> Vec<String> {
    ["accelerometer", "bodyHeight", "gyroscope", "velocity", "yawSpeed"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_double_rate_cameras() -> Vec<String> {
    vec!["BellyCam".to_string()]
}

fn default_camera_groups() -> Vec<CameraGroupRule> {
    vec![
        CameraGroupRule::new("Chin", CameraGroup::ChinHead),
        CameraGroupRule::new("Head", CameraGroup::ChinHead),
        CameraGroupRule::new("Belly", CameraGroup::Belly),
        CameraGroupRule::new("Left", CameraGroup::LeftRight),
        CameraGroupRule::new("Right", CameraGroup::LeftRight),
    ]
}

/// Synchronization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Passes allowed before giving up (1 initial + corrections)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> u32 {
    2
}

/// IMU window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Samples per window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Z-score normalize with statistics of the whole measurement
    #[serde(default, alias = "normalize_IMU_data_measurement_based")]
    pub normalize_measurement_based: bool,

    /// Longest allowed run of identical values before a window is corrupt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrupt_threshold: Option<usize>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            normalize_measurement_based: false,
            corrupt_threshold: None,
        }
    }
}

fn default_window_size() -> usize {
    50
}

/// Label index settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Label used when neither the CLI nor `info.json` provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_label: Option<String>,
}
