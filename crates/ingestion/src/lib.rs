//! # Ingestion
//!
//! Filesystem access to one measurement.
//!
//! Responsibilities:
//! - Discover sensor directories and classify them (camera / timeseries)
//! - List sample files in explicit lexicographic (= chronological) order
//! - Read and atomically write `;`-delimited sample files
//! - Create working copies so raw measurements stay untouched
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{MeasurementLayout, read_samples};
//!
//! let layout = MeasurementLayout::discover(path, codec, "Cam")?;
//! for sensor in layout.timeseries() {
//!     let stream = layout.open_stream(sensor)?;
//!     for entry in stream.entries() {
//!         let samples = read_samples(&entry.path)?;
//!     }
//! }
//! ```

mod layout;
mod samples;
mod stream;
mod workspace;

pub use layout::{list_subdirectories, MeasurementLayout};
pub use samples::{
    concat_rows, drop_head_rows, read_samples, select_rows, write_samples, SampleArray,
};
pub use stream::{SensorStream, StreamEntry};
pub use workspace::{copy_measurement, move_file, remove_file, remove_file_if_exists};
