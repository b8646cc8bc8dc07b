//! Timeseries sample codec
//!
//! Sample files hold one numeric row per polled sample, channels separated by
//! `;`, no header. Rows are loaded into a dense `rows x channels` matrix.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use contracts::{ContractError, IoResultExt, Result};
use nalgebra::DMatrix;

/// Samples of one file, one row per sample
pub type SampleArray = DMatrix<f64>;

const DELIMITER: u8 = b';';

/// Read a `;`-delimited sample file
///
/// # Errors
/// - `SampleFormat` for non-numeric cells or rows with diverging channel count
/// - `Io` / `Csv` when the file cannot be read
pub fn read_samples(path: &Path) -> Result<SampleArray> {
    let file = File::open(path).at_path(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut channels: Option<usize> = None;
    let mut values = Vec::new();
    let mut rows = 0usize;

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        match channels {
            None => channels = Some(record.len()),
            Some(expected) if expected != record.len() => {
                return Err(ContractError::sample_format(
                    path,
                    format!(
                        "row {} has {} channels, expected {expected}",
                        line + 1,
                        record.len()
                    ),
                ));
            }
            Some(_) => {}
        }

        for cell in record.iter() {
            let value = cell.parse::<f64>().map_err(|e| {
                ContractError::sample_format(path, format!("row {}: '{cell}': {e}", line + 1))
            })?;
            values.push(value);
        }
        rows += 1;
    }

    Ok(DMatrix::from_row_slice(rows, channels.unwrap_or(0), &values))
}

/// Write samples to `path` via a temporary sibling and a rename
///
/// A crash mid-write leaves either the old file or the new one, never a
/// truncated sample file.
pub fn write_samples(path: &Path, samples: &SampleArray) -> Result<()> {
    let tmp = tmp_path(path);
    {
        let file = File::create(&tmp).at_path(&tmp)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .from_writer(file);

        for row in samples.row_iter() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush().at_path(&tmp)?;
    }
    fs::rename(&tmp, path).at_path(path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Stack arrays vertically in order
///
/// # Errors
/// `SampleFormat` if the arrays disagree on channel count.
pub fn concat_rows(origin: &Path, arrays: &[SampleArray]) -> Result<SampleArray> {
    let Some(first) = arrays.iter().find(|a| a.nrows() > 0) else {
        return Ok(SampleArray::zeros(0, 0));
    };
    let channels = first.ncols();
    let rows: usize = arrays.iter().map(|a| a.nrows()).sum();

    let mut values = Vec::with_capacity(rows * channels);
    for array in arrays.iter().filter(|a| a.nrows() > 0) {
        if array.ncols() != channels {
            return Err(ContractError::sample_format(
                origin,
                format!(
                    "cannot concatenate {} channels onto {channels}",
                    array.ncols()
                ),
            ));
        }
        for row in array.row_iter() {
            values.extend(row.iter().copied());
        }
    }
    Ok(DMatrix::from_row_slice(rows, channels, &values))
}

/// Drop the first `count` rows
pub fn drop_head_rows(samples: SampleArray, count: usize) -> SampleArray {
    let count = count.min(samples.nrows());
    samples.remove_rows(0, count)
}

/// Build a new array out of the given row indices, repeats allowed
pub fn select_rows(samples: &SampleArray, indices: &[usize]) -> SampleArray {
    samples.select_rows(indices.iter())
}
