//! Timestamp - the currency of every sample filename
//!
//! Filenames carry the capture time of day as `HH_MM_SS_mmm`. Combined with
//! the measurement date from `info.json` this yields an absolute instant.

use std::fmt;
use std::ops::{Add, Sub};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};

use crate::{ContractError, Result};

/// IMU sample period after downsampling (50 Hz)
pub const IMU_SAMPLE_PERIOD_MS: i64 = 20;

/// Nominal camera frame period (5 Hz), also the synchronization tolerance
pub const CAMERA_FRAME_PERIOD_MS: i64 = 200;

/// Window stride in IMU samples, one new window per camera frame
pub const WINDOW_STRIDE: usize = (CAMERA_FRAME_PERIOD_MS / IMU_SAMPLE_PERIOD_MS) as usize;

const FIELD_WIDTHS: [(&str, usize); 4] = [("hours", 2), ("minutes", 2), ("seconds", 2), ("millis", 3)];

/// Absolute capture instant at millisecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Wrap a datetime, truncating to millisecond precision
    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self(datetime.trunc_subsecs(3))
    }

    /// Decode an `HH_MM_SS_mmm` string anchored to `date`
    ///
    /// # Errors
    /// `MalformedTimestamp` if the string does not have exactly four
    /// zero-padded numeric fields or a field is out of range.
    pub fn decode(value: &str, date: NaiveDate) -> Result<Self> {
        let fields: Vec<&str> = value.split('_').collect();
        if fields.len() != FIELD_WIDTHS.len() {
            return Err(ContractError::malformed_timestamp(
                value,
                format!(
                    "expected 4 underscore-delimited fields, found {}",
                    fields.len()
                ),
            ));
        }

        let mut parsed = [0u32; 4];
        for (slot, (field, (name, width))) in parsed.iter_mut().zip(fields.iter().zip(FIELD_WIDTHS)) {
            if field.len() != width || !field.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ContractError::malformed_timestamp(
                    value,
                    format!("{name} must be {width} digits, got '{field}'"),
                ));
            }
            *slot = field.parse().map_err(|e| {
                ContractError::malformed_timestamp(value, format!("invalid {name}: {e}"))
            })?;
        }

        let [hours, minutes, seconds, millis] = parsed;
        let time = NaiveTime::from_hms_milli_opt(hours, minutes, seconds, millis).ok_or_else(|| {
            ContractError::malformed_timestamp(value, "time of day out of range")
        })?;

        Ok(Self(date.and_time(time)))
    }

    /// Encode as `HH_MM_SS_mmm`, the inverse of [`Timestamp::decode`]
    ///
    /// The date is dropped. Use [`TimestampCodec::encode`] where the result
    /// has to decode back to the same instant.
    pub fn encode(&self) -> String {
        let time = self.0.time();
        format!(
            "{:02}_{:02}_{:02}_{:03}",
            time.hour(),
            time.minute(),
            time.second(),
            time.nanosecond() / 1_000_000
        )
    }

    /// Underlying datetime
    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Calendar date of the instant
    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    /// Shift by a signed number of milliseconds
    pub fn add_millis(self, millis: i64) -> Self {
        self + TimeDelta::milliseconds(millis)
    }

    /// Signed milliseconds elapsed since `earlier`
    pub fn millis_since(self, earlier: Timestamp) -> i64 {
        (self - earlier).num_milliseconds()
    }
}

impl Add<TimeDelta> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: TimeDelta) -> Self::Output {
        Timestamp::from_datetime(self.0 + rhs)
    }
}

impl Sub<TimeDelta> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: TimeDelta) -> Self::Output {
        Timestamp::from_datetime(self.0 - rhs)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = TimeDelta;

    fn sub(self, rhs: Timestamp) -> Self::Output {
        self.0 - rhs.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Codec bound to one measurement date
///
/// Streams decode every filename stem through this, so all timestamps of a
/// measurement share the same anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampCodec {
    date: NaiveDate,
}

impl TimestampCodec {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn decode(&self, value: &str) -> Result<Timestamp> {
        Timestamp::decode(value, self.date)
    }

    /// Encode a timestamp that must stay on the codec's date
    ///
    /// An offset pushing a sample past midnight would otherwise produce a
    /// name that decodes to the wrong day.
    pub fn encode(&self, timestamp: Timestamp) -> Result<String> {
        let encoded = timestamp.encode();
        if timestamp.date() != self.date {
            return Err(ContractError::MalformedTimestamp {
                value: encoded,
                message: format!(
                    "instant {} lies outside measurement date {}",
                    timestamp.as_datetime(),
                    self.date
                ),
            });
        }
        Ok(encoded)
    }

    /// File name for a sample captured at `timestamp`
    pub fn file_name(&self, timestamp: Timestamp, extension: &str) -> Result<String> {
        Ok(format!("{}.{}", self.encode(timestamp)?, extension))
    }
}
