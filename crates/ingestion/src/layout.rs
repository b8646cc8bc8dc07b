//! 测量目录布局
//!
//! 每个一级子目录对应一个传感器；目录名包含相机标记的为图像流，其余为时间序列。

use std::path::{Path, PathBuf};

use contracts::{
    ContractError, IoResultExt, Result, SensorDescriptor, SensorKind, TimestampCodec,
};
use tracing::debug;

use crate::stream::SensorStream;

/// 一次测量的传感器布局
#[derive(Debug, Clone)]
pub struct MeasurementLayout {
    root: PathBuf,
    codec: TimestampCodec,
    sensors: Vec<SensorDescriptor>,
}

impl MeasurementLayout {
    /// 扫描测量目录，按目录名排序
    pub fn discover(root: &Path, codec: TimestampCodec, camera_marker: &str) -> Result<Self> {
        let sensors: Vec<SensorDescriptor> = list_subdirectories(root)?
            .into_iter()
            .map(|name| {
                let kind = SensorKind::classify(&name, camera_marker);
                SensorDescriptor::new(name, kind)
            })
            .collect();

        debug!(
            measurement = %root.display(),
            sensors = sensors.len(),
            cameras = sensors.iter().filter(|s| s.is_camera()).count(),
            "Measurement layout discovered"
        );

        Ok(Self {
            root: root.to_path_buf(),
            codec,
            sensors,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn codec(&self) -> TimestampCodec {
        self.codec
    }

    pub fn sensors(&self) -> &[SensorDescriptor] {
        &self.sensors
    }

    pub fn sensor(&self, name: &str) -> Option<&SensorDescriptor> {
        self.sensors.iter().find(|s| s.name == name)
    }

    pub fn cameras(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.sensors.iter().filter(|s| s.is_camera())
    }

    pub fn timeseries(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.sensors.iter().filter(|s| !s.is_camera())
    }

    /// 相机目录，没有则返回 `NoCameraData`
    pub fn require_cameras(&self) -> Result<Vec<&SensorDescriptor>> {
        let cameras: Vec<_> = self.cameras().collect();
        if cameras.is_empty() {
            return Err(ContractError::NoCameraData {
                measurement: self.measurement_name(),
            });
        }
        Ok(cameras)
    }

    /// 时间序列目录，没有则返回 `NoImuData`
    pub fn require_timeseries(&self) -> Result<Vec<&SensorDescriptor>> {
        let timeseries: Vec<_> = self.timeseries().collect();
        if timeseries.is_empty() {
            return Err(ContractError::NoImuData {
                measurement: self.measurement_name(),
                message: "no timeseries sensor directory present".into(),
            });
        }
        Ok(timeseries)
    }

    /// 按偏好顺序选出第一个存在的参考传感器
    ///
    /// 所有时间序列传感器同步采样，任意一个都可以作为降采样和同步的参考。
    pub fn reference_sensor(&self, preference: &[String]) -> Result<&SensorDescriptor> {
        preference
            .iter()
            .find_map(|name| self.timeseries().find(|s| &s.name == name))
            .ok_or_else(|| ContractError::NoImuData {
                measurement: self.measurement_name(),
                message: format!(
                    "none of the reference sensors {preference:?} present among {:?}",
                    self.timeseries().map(|s| s.name.as_str()).collect::<Vec<_>>()
                ),
            })
    }

    pub fn sensor_dir(&self, descriptor: &SensorDescriptor) -> PathBuf {
        self.root.join(&descriptor.name)
    }

    /// 打开传感器的有序文件流
    pub fn open_stream(&self, descriptor: &SensorDescriptor) -> Result<SensorStream> {
        SensorStream::open(&self.sensor_dir(descriptor), descriptor.clone(), self.codec)
    }

    /// 测量目录名，用于错误信息
    pub fn measurement_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }
}

/// 列出一级子目录名 (排序, 跳过隐藏目录)
pub fn list_subdirectories(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for item in std::fs::read_dir(root).at_path(root)? {
        let item = item.at_path(root)?;
        if !item.file_type().at_path(item.path())?.is_dir() {
            continue;
        }
        let name = item.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
