//! Clock offset model
//!
//! Each camera group runs on its own remote PC clock. `info.json` records the
//! constant offset between that clock and the local controller clock, plus
//! which side shows the later timestamp.

use std::collections::BTreeMap;

use contracts::{
    CameraGroup, CameraGroupRule, ClockOffsetRecord, ContractError, LaterClock, MeasurementInfo,
    Result, Timestamp,
};

/// Offsets per camera group plus the rules mapping camera names to groups
#[derive(Debug, Clone)]
pub struct ClockOffsetModel {
    rules: Vec<CameraGroupRule>,
    offsets: BTreeMap<CameraGroup, ClockOffsetRecord>,
}

impl ClockOffsetModel {
    /// Collect the offset records present in `info`
    pub fn load(info: &MeasurementInfo, rules: &[CameraGroupRule]) -> Self {
        let offsets = CameraGroup::ALL
            .iter()
            .filter_map(|group| info.offset(*group).map(|record| (*group, *record)))
            .collect();
        Self {
            rules: rules.to_vec(),
            offsets,
        }
    }

    /// Camera group a camera directory belongs to (first matching prefix)
    pub fn group_of(&self, camera: &str) -> Result<CameraGroup> {
        self.rules
            .iter()
            .find(|rule| camera.starts_with(rule.prefix.as_str()))
            .map(|rule| rule.group)
            .ok_or_else(|| {
                ContractError::configuration(format!(
                    "camera '{camera}' matches no camera group prefix"
                ))
            })
    }

    pub fn record(&self, group: CameraGroup) -> Result<ClockOffsetRecord> {
        self.offsets.get(&group).copied().ok_or_else(|| {
            ContractError::configuration(format!(
                "info.json has no '{}' record",
                group.info_key()
            ))
        })
    }

    /// Signed shift of a group, if `info.json` recorded one
    pub fn group_shift_ms(&self, group: CameraGroup) -> Option<i64> {
        self.offsets.get(&group).map(signed_shift_ms)
    }

    /// Signed shift from local to remote clock in milliseconds
    pub fn shift_ms(&self, camera: &str) -> Result<i64> {
        let record = self.record(self.group_of(camera)?)?;
        Ok(signed_shift_ms(&record))
    }

    /// Translate a local reference timestamp into `camera`'s clock
    ///
    /// A later local clock means the same instant reads earlier on the
    /// remote side, so the magnitude is subtracted; otherwise added.
    pub fn correct(&self, reference: Timestamp, camera: &str) -> Result<Timestamp> {
        Ok(reference.add_millis(self.shift_ms(camera)?))
    }
}

fn signed_shift_ms(record: &ClockOffsetRecord) -> i64 {
    let magnitude = i64::try_from(record.corrected).unwrap_or(i64::MAX);
    match record.later_timestamp_on {
        LaterClock::Local => -magnitude,
        LaterClock::Remote => magnitude,
    }
}
