//! Timestamp synchronizer
//!
//! Picks, per camera, the frame closest to the IMU start after clock-offset
//! correction. If some camera cannot get within one frame period, the IMU
//! start is assumed to be too early and is advanced by the largest residual,
//! rounded down to whole IMU samples. The number of passes is capped.

use std::collections::BTreeMap;

use contracts::{
    ContractError, Result, SensorDescriptor, SynchronizationOutcome, SynchronizedTimestampSet,
    Timestamp, CAMERA_FRAME_PERIOD_MS, IMU_GROUP_KEY, IMU_SAMPLE_PERIOD_MS,
};
use ingestion::MeasurementLayout;
use tracing::{debug, info, instrument, warn};

use crate::clock_offset::ClockOffsetModel;

/// Captured frame timestamps of one camera, in filename order
#[derive(Debug, Clone)]
pub struct CameraFrames {
    pub camera: String,
    pub timestamps: Vec<Timestamp>,
}

/// Frame closest to `target`; the earliest one wins ties
pub fn closest_frame(frames: &[Timestamp], target: Timestamp) -> Option<(Timestamp, i64)> {
    let mut best: Option<(Timestamp, i64)> = None;
    for frame in frames {
        let residual = frame.millis_since(target).abs();
        match best {
            Some((_, current)) if residual >= current => {}
            _ => best = Some((*frame, residual)),
        }
    }
    best
}

/// Fixed-point search for a common start across IMU and cameras
#[derive(Debug, Clone)]
pub struct TimestampSynchronizer<'a> {
    offsets: &'a ClockOffsetModel,
    max_iterations: u32,
}

impl<'a> TimestampSynchronizer<'a> {
    pub fn new(offsets: &'a ClockOffsetModel, max_iterations: u32) -> Self {
        Self {
            offsets,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Synchronize a measurement on disk
    ///
    /// The IMU start is the first file of `reference`.
    ///
    /// # Errors
    /// - `NoCameraData` if the measurement has no camera directory
    /// - `EmptyStream` if the reference or a camera has no samples
    /// - `Configuration` for cameras without group or offset record
    /// - `SynchronizationDivergence` if the iteration cap is exhausted
    #[instrument(name = "timestamp_sync", skip_all, fields(measurement = %layout.measurement_name()))]
    pub fn synchronize(
        &self,
        layout: &MeasurementLayout,
        reference: &SensorDescriptor,
    ) -> Result<SynchronizationOutcome> {
        let cameras = layout.require_cameras()?;
        let imu_stream = layout.open_stream(reference)?;
        let imu_start = imu_stream.require_entries()?[0].timestamp;

        let mut frames = Vec::with_capacity(cameras.len());
        for camera in cameras {
            let stream = layout.open_stream(camera)?;
            stream.require_entries()?;
            frames.push(CameraFrames {
                camera: camera.name.clone(),
                timestamps: stream.timestamps().collect(),
            });
        }

        self.synchronize_frames(imu_start, &frames)
    }

    /// Synchronize already listed frames against `imu_start`
    pub fn synchronize_frames(
        &self,
        imu_start: Timestamp,
        cameras: &[CameraFrames],
    ) -> Result<SynchronizationOutcome> {
        if cameras.is_empty() {
            return Err(ContractError::NoCameraData {
                measurement: "<frames>".into(),
            });
        }

        let mut t_imu = imu_start;
        let mut iteration = 1;

        loop {
            let mut timestamps = SynchronizedTimestampSet::new();
            let mut residuals = BTreeMap::new();
            timestamps.insert(IMU_GROUP_KEY, t_imu);

            for camera in cameras {
                let target = self.offsets.correct(t_imu, &camera.camera)?;
                let (frame, residual) = closest_frame(&camera.timestamps, target).ok_or_else(|| {
                    ContractError::EmptyStream {
                        sensor: camera.camera.clone(),
                    }
                })?;
                debug!(
                    camera = %camera.camera,
                    target = %target,
                    frame = %frame,
                    residual_ms = residual,
                    iteration,
                    "Closest frame selected"
                );
                timestamps.insert(camera.camera.clone(), frame);
                residuals.insert(camera.camera.clone(), residual);
            }

            let (worst_camera, worst) = residuals
                .iter()
                .max_by_key(|(_, residual)| **residual)
                .map(|(camera, residual)| (camera.clone(), *residual))
                .unwrap_or_default();

            if worst <= CAMERA_FRAME_PERIOD_MS {
                info!(
                    imu_start = %t_imu,
                    iterations = iteration,
                    max_residual_ms = worst,
                    "Synchronization converged"
                );
                observability::record_synchronization(iteration, &residuals);
                return Ok(SynchronizationOutcome {
                    timestamps,
                    residuals_ms: residuals,
                    iterations: iteration,
                });
            }

            if iteration >= self.max_iterations {
                return Err(ContractError::SynchronizationDivergence {
                    iterations: iteration,
                    camera: worst_camera,
                    residual_ms: worst,
                    tolerance_ms: CAMERA_FRAME_PERIOD_MS,
                });
            }

            let advance = worst / IMU_SAMPLE_PERIOD_MS * IMU_SAMPLE_PERIOD_MS;
            warn!(
                camera = %worst_camera,
                residual_ms = worst,
                advance_ms = advance,
                "Residual exceeds one frame period, advancing IMU start"
            );
            t_imu = t_imu.add_millis(advance);
            iteration += 1;
        }
    }
}
