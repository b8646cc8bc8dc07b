//! 配置校验模块
//!
//! 校验规则：
//! - camera_marker 非空
//! - reference_sensors 非空
//! - camera_groups 前缀唯一且非空
//! - sync.max_iterations >= 1
//! - window_size >= 窗口步长，且为步长整数倍 (窗口名落在相机帧节拍上)
//! - corrupt_threshold >= 1

use std::collections::HashSet;

use contracts::{ContractError, PreparationConfig, WINDOW_STRIDE};

/// 校验 PreparationConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &PreparationConfig) -> Result<(), ContractError> {
    validate_sensor_layout(config)?;
    validate_camera_groups(config)?;
    validate_sync_config(config)?;
    validate_window_config(config)?;
    Ok(())
}

/// 校验传感器识别配置
fn validate_sensor_layout(config: &PreparationConfig) -> Result<(), ContractError> {
    let sensors = &config.sensors;

    if sensors.camera_marker.trim().is_empty() {
        return Err(ContractError::config_validation(
            "sensors.camera_marker",
            "camera_marker cannot be empty",
        ));
    }

    if sensors.reference_sensors.is_empty() {
        return Err(ContractError::config_validation(
            "sensors.reference_sensors",
            "at least one reference sensor is required for downsampling",
        ));
    }

    // 参考传感器不能被识别为相机
    for name in &sensors.reference_sensors {
        if name.contains(sensors.camera_marker.as_str()) {
            return Err(ContractError::config_validation(
                format!("sensors.reference_sensors[{name}]"),
                format!(
                    "reference sensor would be classified as camera (contains '{}')",
                    sensors.camera_marker
                ),
            ));
        }
    }

    Ok(())
}

/// 校验相机组前缀唯一性
fn validate_camera_groups(config: &PreparationConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, rule) in config.sensors.camera_groups.iter().enumerate() {
        if rule.prefix.is_empty() {
            return Err(ContractError::config_validation(
                format!("sensors.camera_groups[{idx}].prefix"),
                "prefix cannot be empty",
            ));
        }
        if !seen.insert(rule.prefix.as_str()) {
            return Err(ContractError::config_validation(
                format!("sensors.camera_groups[prefix={}]", rule.prefix),
                "duplicate camera group prefix",
            ));
        }
    }
    Ok(())
}

/// 校验同步配置
fn validate_sync_config(config: &PreparationConfig) -> Result<(), ContractError> {
    if config.sync.max_iterations == 0 {
        return Err(ContractError::config_validation(
            "sync.max_iterations",
            "max_iterations must be >= 1",
        ));
    }
    Ok(())
}

/// 校验窗口配置
fn validate_window_config(config: &PreparationConfig) -> Result<(), ContractError> {
    let windows = &config.windows;

    if windows.window_size < WINDOW_STRIDE {
        return Err(ContractError::config_validation(
            "windows.window_size",
            format!(
                "window_size ({}) must be >= stride ({WINDOW_STRIDE})",
                windows.window_size
            ),
        ));
    }

    if windows.window_size % WINDOW_STRIDE != 0 {
        return Err(ContractError::config_validation(
            "windows.window_size",
            format!(
                "window_size ({}) must be a multiple of stride ({WINDOW_STRIDE})",
                windows.window_size
            ),
        ));
    }

    if windows.corrupt_threshold == Some(0) {
        return Err(ContractError::config_validation(
            "windows.corrupt_threshold",
            "corrupt_threshold must be >= 1",
        ));
    }

    Ok(())
}
