//! Stream trimming
//!
//! Head trimming aligns every stream to its synchronized start, tail trimming
//! cuts everything after the last instant all sensors cover.

use contracts::{
    ContractError, RenumberReport, Result, Timestamp, WindowReport, IMU_SAMPLE_PERIOD_MS,
};
use ingestion::{drop_head_rows, read_samples, remove_file, write_samples, SensorStream};
use tracing::{debug, info, instrument};

/// Double-rate frames closer than this to the last kept frame are dropped
pub const DOUBLE_RATE_WINDOW_MS: i64 = 190;

/// What an image head trim removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageTrim {
    /// Frames before the synchronized start
    pub before_start: usize,
    /// Frames dropped to halve a double-rate cadence
    pub thinned: usize,
}

/// Drop the samples of the first timeseries file that precede `reference`
///
/// The remainder is written under a file named after `reference` and the
/// original file is removed. Returns the number of dropped rows.
///
/// # Errors
/// `HeadTrim` if the stream starts after `reference` or `reference` lies
/// beyond the first file.
#[instrument(name = "trim_head_timeseries", skip_all, fields(sensor = %stream.name(), reference = %reference))]
pub fn trim_timeseries_head(stream: &SensorStream, reference: Timestamp) -> Result<usize> {
    let first = &stream.require_entries()?[0];

    if first.timestamp > reference {
        return Err(ContractError::head_trim(
            stream.name(),
            format!(
                "earliest sample {} is after reference {reference}",
                first.timestamp
            ),
        ));
    }

    let shift = usize::try_from(reference.millis_since(first.timestamp) / IMU_SAMPLE_PERIOD_MS)
        .unwrap_or(0);
    let samples = read_samples(&first.path)?;

    if shift > samples.nrows() {
        return Err(ContractError::head_trim(
            stream.name(),
            format!(
                "shift of {shift} rows exceeds the {} rows of the first file {}",
                samples.nrows(),
                first.file_name()
            ),
        ));
    }
    if shift == 0 {
        debug!("No head trim needed");
        return Ok(0);
    }

    let target = stream.path_for(reference)?;
    write_samples(&target, &drop_head_rows(samples, shift))?;
    if target != first.path {
        remove_file(&first.path)?;
    }

    debug!(rows = shift, "Obsolete head rows removed");
    Ok(shift)
}

/// Delete camera frames before `reference`
///
/// With `double_rate`, frames following a kept frame by less than
/// [`DOUBLE_RATE_WINDOW_MS`] are dropped as well. The frame following a drop
/// is always kept, so the cadence halves instead of collapsing.
#[instrument(name = "trim_head_images", skip_all, fields(sensor = %stream.name(), reference = %reference))]
pub fn trim_image_head(
    stream: &SensorStream,
    reference: Timestamp,
    double_rate: bool,
) -> Result<ImageTrim> {
    let entries = stream.require_entries()?;
    let mut trim = ImageTrim::default();
    let mut rolling_reference = reference;
    let mut previous_dropped = false;

    for entry in entries {
        if entry.timestamp < reference {
            remove_file(&entry.path)?;
            trim.before_start += 1;
            continue;
        }
        if !double_rate {
            continue;
        }

        let since = entry.timestamp.millis_since(rolling_reference);
        if !previous_dropped && since > 0 && since < DOUBLE_RATE_WINDOW_MS {
            remove_file(&entry.path)?;
            trim.thinned += 1;
            previous_dropped = true;
        } else {
            rolling_reference = entry.timestamp;
            previous_dropped = false;
        }
    }

    debug!(
        before_start = trim.before_start,
        thinned = trim.thinned,
        "Image head trimmed"
    );
    Ok(trim)
}

/// Delete every sample after `last_allowed`; returns the number removed
pub fn trim_tail(stream: &SensorStream, last_allowed: Timestamp) -> Result<usize> {
    let mut removed = 0;
    for entry in stream.entries().iter().filter(|e| e.timestamp > last_allowed) {
        remove_file(&entry.path)?;
        removed += 1;
    }
    if removed > 0 {
        debug!(sensor = %stream.name(), removed, last_allowed = %last_allowed, "Tail trimmed");
    }
    Ok(removed)
}

/// Last instant covered by all sensors
///
/// The minimum over the last window end of every timeseries sensor and the
/// last renumbered frame of every camera.
///
/// # Errors
/// `InsufficientData` if a sensor ended up without any window or frame.
pub fn tail_boundary(windows: &[WindowReport], cameras: &[RenumberReport]) -> Result<Timestamp> {
    let window_ends = windows.iter().map(|w| {
        w.last_window_end.ok_or_else(|| ContractError::InsufficientData {
            sensor: w.sensor.clone(),
            message: "no complete window could be cut".into(),
        })
    });
    let frame_ends = cameras.iter().map(|c| {
        c.last_timestamp.ok_or_else(|| ContractError::InsufficientData {
            sensor: c.camera.clone(),
            message: "no frame left after renumbering".into(),
        })
    });

    let mut boundary: Option<Timestamp> = None;
    for end in window_ends.chain(frame_ends) {
        let end = end?;
        boundary = Some(boundary.map_or(end, |b| b.min(end)));
    }

    let boundary = boundary.ok_or_else(|| ContractError::InsufficientData {
        sensor: "*".into(),
        message: "no sensor produced any sample".into(),
    })?;
    info!(boundary = %boundary, "Tail boundary determined");
    Ok(boundary)
}
