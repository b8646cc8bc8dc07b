//! SynchronizedTimestampSet - Sync Engine output
//!
//! One representative start timestamp per sensor group, computed once per
//! measurement and used as the anchor for trimming and renumbering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Timestamp, IMU_GROUP_KEY};

/// Synchronized start timestamps
///
/// Keys are `"IMU"` or a camera directory name. Camera entries are in the
/// camera's own clock; the IMU entry is in the local controller clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynchronizedTimestampSet {
    entries: BTreeMap<String, Timestamp>,
}

impl SynchronizedTimestampSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, timestamp: Timestamp) {
        self.entries.insert(key.into(), timestamp);
    }

    pub fn get(&self, key: &str) -> Option<Timestamp> {
        self.entries.get(key).copied()
    }

    /// Synchronized IMU start
    pub fn imu(&self) -> Option<Timestamp> {
        self.get(IMU_GROUP_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Timestamp)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of one synchronization run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynchronizationOutcome {
    /// Chosen start timestamp per sensor group
    pub timestamps: SynchronizedTimestampSet,

    /// Absolute residual per camera after clock correction (ms)
    pub residuals_ms: BTreeMap<String, i64>,

    /// Number of passes needed (1 = no correction)
    pub iterations: u32,
}

impl SynchronizationOutcome {
    /// Largest residual across cameras
    pub fn max_residual_ms(&self) -> i64 {
        self.residuals_ms.values().copied().max().unwrap_or(0)
    }
}
