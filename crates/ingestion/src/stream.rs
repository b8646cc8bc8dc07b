//! Sorted view over one sensor directory.
//!
//! Every stage downstream assumes that iterating a stream yields samples in
//! chronological order. The listing is therefore always sorted by file name
//! here instead of relying on directory order.

use std::path::{Path, PathBuf};

use contracts::{
    ContractError, IoResultExt, Result, SensorDescriptor, Timestamp, TimestampCodec,
    STEREO_PREFIXES,
};
use tracing::trace;

/// One sample file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Full path of the file
    pub path: PathBuf,
    /// Timestamp decoded from the file stem
    pub timestamp: Timestamp,
}

impl StreamEntry {
    /// File name without directory
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Chronologically ordered sample files of one sensor
#[derive(Debug, Clone)]
pub struct SensorStream {
    descriptor: SensorDescriptor,
    dir: PathBuf,
    codec: TimestampCodec,
    entries: Vec<StreamEntry>,
}

impl SensorStream {
    /// List the sample files of `descriptor` in `dir`
    ///
    /// Files with a different extension, hidden files and subdirectories are
    /// ignored.
    ///
    /// # Errors
    /// - `UnsupportedLayout` if a file carries a stereo `Left_`/`Right_` prefix
    /// - `MalformedTimestamp` if a file stem is not `HH_MM_SS_mmm`
    pub fn open(dir: &Path, descriptor: SensorDescriptor, codec: TimestampCodec) -> Result<Self> {
        let entries = scan(dir, &descriptor, codec)?;
        trace!(sensor = %descriptor.name, files = entries.len(), "Sensor stream listed");
        Ok(Self {
            descriptor,
            dir: dir.to_path_buf(),
            codec,
            entries,
        })
    }

    /// Re-list the directory after files were added or removed
    pub fn refresh(&mut self) -> Result<()> {
        self.entries = scan(&self.dir, &self.descriptor, self.codec)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &SensorDescriptor {
        &self.descriptor
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn codec(&self) -> TimestampCodec {
        self.codec
    }

    pub fn entries(&self) -> &[StreamEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&StreamEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&StreamEntry> {
        self.entries.last()
    }

    /// Entries, or `EmptyStream` if there are none
    pub fn require_entries(&self) -> Result<&[StreamEntry]> {
        if self.entries.is_empty() {
            return Err(ContractError::EmptyStream {
                sensor: self.descriptor.name.clone(),
            });
        }
        Ok(&self.entries)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.entries.iter().map(|e| e.timestamp)
    }

    /// Path a sample captured at `timestamp` is stored under
    pub fn path_for(&self, timestamp: Timestamp) -> Result<PathBuf> {
        let file_name = self
            .codec
            .file_name(timestamp, self.descriptor.kind.extension())?;
        Ok(self.dir.join(file_name))
    }
}

fn scan(dir: &Path, descriptor: &SensorDescriptor, codec: TimestampCodec) -> Result<Vec<StreamEntry>> {
    let extension = descriptor.kind.extension();
    let mut entries = Vec::new();

    for item in std::fs::read_dir(dir).at_path(dir)? {
        let item = item.at_path(dir)?;
        let path = item.path();
        if !item.file_type().at_path(&path)?.is_file() {
            continue;
        }

        let file_name = item.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }
        let Some(stem) = file_name.strip_suffix(&format!(".{extension}")) else {
            trace!(sensor = %descriptor.name, file = %file_name, "Skipping foreign file");
            continue;
        };

        if let Some(prefix) = STEREO_PREFIXES.iter().find(|p| stem.starts_with(**p)) {
            return Err(ContractError::unsupported_layout(
                &descriptor.name,
                format!(
                    "file '{file_name}' carries stereo prefix '{prefix}'; split both halves into separate directories"
                ),
            ));
        }

        let timestamp = codec.decode(stem)?;
        entries.push(StreamEntry { path, timestamp });
    }

    entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(entries)
}
