//! MeasurementInfo - per-measurement metadata (`info.json`)
//!
//! Holds the measurement date and the constant clock offsets between the
//! local controller clock and each camera group's remote clock.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{CameraGroup, ContractError, Result};

/// Name of the metadata file inside a measurement directory
pub const MEASUREMENT_INFO_FILE: &str = "info.json";

/// Contents of `info.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementInfo {
    /// Capture date, `DD.MM.YYYY` on disk
    #[serde(with = "measurement_date_format")]
    pub measurement_date: NaiveDate,

    /// Group 13: chin/head cameras
    #[serde(rename = "time_diff_13_in_ms", default)]
    pub time_diff_13: Option<ClockOffsetRecord>,

    /// Group 14: left/right cameras
    #[serde(rename = "time_diff_14_in_ms", default)]
    pub time_diff_14: Option<ClockOffsetRecord>,

    /// Group 15: belly camera
    #[serde(rename = "time_diff_15_in_ms", default)]
    pub time_diff_15: Option<ClockOffsetRecord>,

    /// Label written for every sample of this measurement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Known constant offset between two clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockOffsetRecord {
    /// Offset magnitude in milliseconds
    pub corrected: u64,

    /// Which clock shows the later timestamp for the same instant
    #[serde(rename = "later timestamp on")]
    pub later_timestamp_on: LaterClock,
}

/// Clock that runs ahead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaterClock {
    #[serde(rename = "local PC")]
    Local,
    #[serde(rename = "remote PC")]
    Remote,
}

impl MeasurementInfo {
    /// Parse `info.json` content
    ///
    /// # Errors
    /// - `Configuration` if a required field such as `measurement_date` is absent
    /// - `ConfigParse` for invalid JSON or malformed values
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            if e.is_data() && e.to_string().starts_with("missing field") {
                ContractError::configuration(format!("{MEASUREMENT_INFO_FILE}: {e}"))
            } else {
                ContractError::ConfigParse {
                    message: format!("{MEASUREMENT_INFO_FILE} parse error: {e}"),
                    source: Some(Box::new(e)),
                }
            }
        })
    }

    /// Offset record for a camera group, if present
    pub fn offset(&self, group: CameraGroup) -> Option<&ClockOffsetRecord> {
        match group {
            CameraGroup::ChinHead => self.time_diff_13.as_ref(),
            CameraGroup::LeftRight => self.time_diff_14.as_ref(),
            CameraGroup::Belly => self.time_diff_15.as_ref(),
        }
    }
}

mod measurement_date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%d.%m.%Y";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{
        "measurement_date": "25.07.2023",
        "time_diff_13_in_ms": {"corrected": 120, "later timestamp on": "local PC"},
        "time_diff_14_in_ms": {"corrected": 45, "later timestamp on": "remote PC"},
        "time_diff_15_in_ms": {"corrected": 0, "later timestamp on": "local PC"}
    }"#;

    #[test]
    fn test_parse_info() {
        let info = MeasurementInfo::from_json_str(INFO).unwrap();
        assert_eq!(
            info.measurement_date,
            NaiveDate::from_ymd_opt(2023, 7, 25).unwrap()
        );
        let chin = info.offset(CameraGroup::ChinHead).unwrap();
        assert_eq!(chin.corrected, 120);
        assert_eq!(chin.later_timestamp_on, LaterClock::Local);
        assert_eq!(
            info.offset(CameraGroup::LeftRight).unwrap().later_timestamp_on,
            LaterClock::Remote
        );
        assert!(info.label.is_none());
    }

    #[test]
    fn test_missing_group_is_none() {
        let info =
            MeasurementInfo::from_json_str(r#"{"measurement_date": "01.08.2023", "label": "grass"}"#)
                .unwrap();
        assert!(info.offset(CameraGroup::Belly).is_none());
        assert_eq!(info.label.as_deref(), Some("grass"));
    }

    #[test]
    fn test_bad_date_rejected() {
        let err = MeasurementInfo::from_json_str(r#"{"measurement_date": "2023-07-25"}"#)
            .unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_missing_field_is_configuration_error() {
        let err = MeasurementInfo::from_json_str(r#"{"label": "grass"}"#).unwrap_err();
        assert!(
            matches!(err, ContractError::Configuration { ref message } if message.contains("measurement_date")),
            "got: {err:?}"
        );

        let err = MeasurementInfo::from_json_str(
            r#"{"measurement_date": "25.07.2023", "time_diff_13_in_ms": {"corrected": 5}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::Configuration { .. }), "got: {err:?}");

        assert!(matches!(
            MeasurementInfo::from_json_str("{ not json").unwrap_err(),
            ContractError::ConfigParse { .. }
        ));
    }

    #[test]
    fn test_date_serializes_back() {
        let info = MeasurementInfo::from_json_str(INFO).unwrap();
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"25.07.2023\""));
        assert!(json.contains("later timestamp on"));
    }
}
