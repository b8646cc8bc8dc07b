//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{CameraGroup, MeasurementInfo, PreparationConfig, TimestampCodec};
use ingestion::MeasurementLayout;
use serde::Serialize;
use std::path::Path;
use sync_engine::ClockOffsetModel;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;
use crate::pipeline::measurement_name;

/// Measurement info for JSON output
#[derive(Serialize)]
struct MeasurementSummary {
    name: String,
    date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_sensor: Option<String>,
    sensors: Vec<SensorSummary>,
    clock_offsets: Vec<OffsetSummary>,
}

#[derive(Serialize)]
struct SensorSummary {
    name: String,
    kind: String,
    files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    first: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    double_rate: bool,
}

#[derive(Serialize)]
struct OffsetSummary {
    group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    shift_ms: Option<i64>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(measurement = %args.measurement.display(), "Loading measurement info");

    if !args.measurement.is_dir() {
        anyhow::bail!(
            "Measurement directory not found: {}",
            args.measurement.display()
        );
    }

    let config = load_config(args.config.as_deref())?;
    let measurement_info = config_loader::ConfigLoader::load_measurement_info(&args.measurement)
        .with_context(|| format!("Failed to load info of {}", args.measurement.display()))?;

    let summary = build_summary(&args.measurement, &measurement_info, &config)?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .context("Failed to serialize measurement info")?;
        println!("{}", json);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn build_summary(
    measurement: &Path,
    measurement_info: &MeasurementInfo,
    config: &PreparationConfig,
) -> Result<MeasurementSummary> {
    let codec = TimestampCodec::new(measurement_info.measurement_date);
    let layout = MeasurementLayout::discover(measurement, codec, &config.sensors.camera_marker)
        .with_context(|| format!("Failed to scan {}", measurement.display()))?;

    let offsets = ClockOffsetModel::load(measurement_info, &config.sensors.camera_groups);

    let mut sensors = Vec::with_capacity(layout.sensors().len());
    for sensor in layout.sensors() {
        let stream = layout
            .open_stream(sensor)
            .with_context(|| format!("Failed to list sensor '{}'", sensor.name))?;
        sensors.push(SensorSummary {
            name: sensor.name.clone(),
            kind: format!("{:?}", sensor.kind),
            files: stream.len(),
            first: stream.first().map(|e| e.timestamp.to_string()),
            last: stream.last().map(|e| e.timestamp.to_string()),
            group: sensor
                .is_camera()
                .then(|| offsets.group_of(&sensor.name).ok())
                .flatten()
                .map(|g| format!("{:?}", g)),
            double_rate: sensor.is_camera() && config.sensors.is_double_rate(&sensor.name),
        });
    }

    let clock_offsets = CameraGroup::ALL
        .iter()
        .map(|group| OffsetSummary {
            group: format!("{:?} (time_diff_{}_in_ms)", group, group.id()),
            shift_ms: offsets.group_shift_ms(*group),
        })
        .collect();

    Ok(MeasurementSummary {
        name: measurement_name(measurement),
        date: measurement_info.measurement_date.to_string(),
        label: measurement_info
            .label
            .clone()
            .or_else(|| config.labels.default_label.clone()),
        reference_sensor: layout
            .reference_sensor(&config.sensors.reference_sensors)
            .ok()
            .map(|s| s.name.clone()),
        sensors,
        clock_offsets,
    })
}

fn print_summary(summary: &MeasurementSummary) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    FTDD Measurement Info                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 Measurement");
    println!("   ├─ Name: {}", summary.name);
    println!("   ├─ Date: {}", summary.date);
    println!(
        "   ├─ Label: {}",
        summary.label.as_deref().unwrap_or("(none)")
    );
    println!(
        "   └─ Reference sensor: {}",
        summary.reference_sensor.as_deref().unwrap_or("(none)")
    );

    println!("\n📷 Sensors ({})", summary.sensors.len());
    for (i, sensor) in summary.sensors.iter().enumerate() {
        let prefix = if i + 1 == summary.sensors.len() { "└─" } else { "├─" };
        let span = match (&sensor.first, &sensor.last) {
            (Some(first), Some(last)) => format!("{} .. {}", first, last),
            _ => "empty".to_string(),
        };
        let mut extra = String::new();
        if let Some(ref group) = sensor.group {
            extra.push_str(&format!(", group {}", group));
        }
        if sensor.double_rate {
            extra.push_str(", double rate");
        }
        println!(
            "   {} {} ({}, {} files{}): {}",
            prefix, sensor.name, sensor.kind, sensor.files, extra, span
        );
    }

    println!("\n⏱  Clock Offsets");
    for (i, offset) in summary.clock_offsets.iter().enumerate() {
        let prefix = if i + 1 == summary.clock_offsets.len() { "└─" } else { "├─" };
        match offset.shift_ms {
            Some(shift) => println!("   {} {}: {:+} ms", prefix, offset.group, shift),
            None => println!("   {} {}: (not recorded)", prefix, offset.group),
        }
    }

    println!();
}
