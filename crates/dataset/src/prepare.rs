//! Per-measurement driver
//!
//! Runs every stage on a working copy of one measurement, in order:
//! downsampling, synchronization, head trimming, renumbering, windowing,
//! tail trimming, label index creation and completeness filtering.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use config_loader::ConfigLoader;
use contracts::{
    ContractError, MeasurementInfo, PreparationConfig, PreparationReport, Result, TimestampCodec,
    IMU_GROUP_KEY,
};
use ingestion::{copy_measurement, MeasurementLayout};
use sync_engine::{
    renumber_images, tail_boundary, trim_image_head, trim_tail, trim_timeseries_head,
    ChannelStats, ClockOffsetModel, ImuDownsampler, SlidingWindowBuilder, TimestampSynchronizer,
};
use tracing::{debug, info, instrument};

use crate::completeness::CompletenessFilter;
use crate::label_index::LabelIndex;

/// Label of a measurement: explicit override, then `info.json`, then the
/// configured default
///
/// # Errors
/// `Configuration` if none of them is set.
pub fn resolve_label(
    label_override: Option<&str>,
    info: &MeasurementInfo,
    config: &PreparationConfig,
) -> Result<String> {
    label_override
        .map(str::to_string)
        .or_else(|| info.label.clone())
        .or_else(|| config.labels.default_label.clone())
        .filter(|label| !label.trim().is_empty())
        .ok_or_else(|| {
            ContractError::configuration(
                "no label: pass --label, set \"label\" in info.json or labels.default_label",
            )
        })
}

/// Prepare `measurement` into `workdir`
///
/// The raw measurement is copied first and never modified. `workdir` must not
/// exist. On error the working copy is left as is for inspection and must not
/// be combined.
#[instrument(name = "prepare_measurement", skip_all, fields(measurement = %measurement.display()))]
pub fn prepare_measurement(
    measurement: &Path,
    workdir: &Path,
    config: &PreparationConfig,
    label_override: Option<&str>,
) -> Result<PreparationReport> {
    let name = measurement
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| measurement.display().to_string());

    // Resolve inputs before copying anything
    let info = ConfigLoader::load_measurement_info(measurement)?;
    let label = resolve_label(label_override, &info, config)?;
    copy_measurement(measurement, workdir)?;

    let codec = TimestampCodec::new(info.measurement_date);
    let layout = MeasurementLayout::discover(workdir, codec, &config.sensors.camera_marker)?;
    let cameras = layout.require_cameras()?;
    let timeseries = layout.require_timeseries()?;

    let downsample = ImuDownsampler::new(config.sensors.reference_sensors.clone()).run(&layout)?;

    let mut stats = BTreeMap::new();
    if config.windows.normalize_measurement_based {
        for sensor in &timeseries {
            let stream = layout.open_stream(sensor)?;
            stats.insert(sensor.name.clone(), ChannelStats::of_stream(&stream)?);
        }
    }

    let reference = layout.reference_sensor(&config.sensors.reference_sensors)?;
    let offsets = ClockOffsetModel::load(&info, &config.sensors.camera_groups);
    let sync = TimestampSynchronizer::new(&offsets, config.sync.max_iterations)
        .synchronize(&layout, reference)?;
    let imu_start = sync.timestamps.imu().ok_or_else(|| {
        ContractError::configuration(format!("no {IMU_GROUP_KEY} start after synchronization"))
    })?;

    for sensor in &timeseries {
        trim_timeseries_head(&layout.open_stream(sensor)?, imu_start)?;
    }
    for camera in &cameras {
        let start = sync.timestamps.get(&camera.name).ok_or_else(|| {
            ContractError::configuration(format!("camera '{}' was not synchronized", camera.name))
        })?;
        let double_rate = config.sensors.is_double_rate(&camera.name);
        let trim = trim_image_head(&layout.open_stream(camera)?, start, double_rate)?;
        debug!(
            camera = %camera.name,
            before_start = trim.before_start,
            thinned = trim.thinned,
            "Camera head trimmed"
        );
    }

    let mut renumber = Vec::with_capacity(cameras.len());
    for camera in &cameras {
        renumber.push(renumber_images(&layout.open_stream(camera)?, imu_start)?);
    }

    let mut windows = Vec::with_capacity(timeseries.len());
    for sensor in &timeseries {
        let mut builder = SlidingWindowBuilder::new(config.windows.window_size)
            .with_corrupt_threshold(config.windows.corrupt_threshold);
        if let Some(stats) = stats.remove(&sensor.name) {
            builder = builder.with_normalization(stats);
        }
        windows.push(builder.build(&layout.open_stream(sensor)?, imu_start)?);
    }

    let boundary = tail_boundary(&windows, &renumber)?;
    let mut ids = BTreeSet::new();
    for sensor in layout.sensors() {
        let stream = layout.open_stream(sensor)?;
        trim_tail(&stream, boundary)?;
        ids.extend(
            stream
                .timestamps()
                .filter(|t| *t <= boundary)
                .map(|t| t.encode()),
        );
    }

    LabelIndex::create(workdir, ids, &label)?;
    let scan = CompletenessFilter::new(config.sensors.camera_marker.as_str()).run(workdir)?;
    let samples = LabelIndex::load(workdir)?.len();

    let report = PreparationReport {
        measurement: name,
        output: workdir.to_path_buf(),
        label,
        downsample,
        sync,
        renumber,
        windows,
        tail_boundary: boundary,
        incomplete_ids: scan.incomplete.into_iter().collect(),
        samples,
    };

    info!(
        samples = report.samples,
        missing_frames = report.missing_frames(),
        corrupt_windows = report.corrupt_windows(),
        incomplete = report.incomplete_ids.len(),
        "Measurement prepared"
    );
    Ok(report)
}
