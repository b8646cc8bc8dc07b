//! Working copies and file moves
//!
//! Raw measurements are never mutated; preparation happens on a copy.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use contracts::{ContractError, IoResultExt, Result};
use tracing::debug;

/// Recursively copy `measurement` into `target`
///
/// `target` must not exist yet so that a stale half-prepared copy is never
/// silently reused.
pub fn copy_measurement(measurement: &Path, target: &Path) -> Result<u64> {
    if target.exists() {
        return Err(ContractError::configuration(format!(
            "working directory '{}' already exists",
            target.display()
        )));
    }
    let copied = copy_dir(measurement, target)?;
    debug!(
        measurement = %measurement.display(),
        target = %target.display(),
        files = copied,
        "Working copy created"
    );
    Ok(copied)
}

fn copy_dir(from: &Path, to: &Path) -> Result<u64> {
    fs::create_dir_all(to).at_path(to)?;
    let mut copied = 0;
    for item in fs::read_dir(from).at_path(from)? {
        let item = item.at_path(from)?;
        let source = item.path();
        let dest = to.join(item.file_name());
        if item.file_type().at_path(&source)?.is_dir() {
            copied += copy_dir(&source, &dest)?;
        } else {
            fs::copy(&source, &dest).at_path(&source)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Move a file, falling back to copy + delete across file systems
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ContractError::io(from, e)),
        Err(_) => {
            fs::copy(from, to).at_path(from)?;
            fs::remove_file(from).at_path(from)
        }
    }
}

/// Delete a listed sample file; a file that vanished is an error
pub fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).at_path(path)
}

/// Delete a file; returns `false` if it did not exist
///
/// Only for best-effort cleanup where absence is expected.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ContractError::io(path, e)),
    }
}
