//! # Contracts
//!
//! Frozen interface contracts shared by all preparation crates.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Sample filenames encode the capture time of day as `HH_MM_SS_mmm`
//! - `info.json` supplies the calendar date anchoring those times
//! - IMU samples are 20 ms apart after downsampling, camera frames 200 ms

mod error;
mod measurement;
mod preparation_config;
mod report;
mod sensor;
mod sync;
mod timestamp;

pub use error::*;
pub use measurement::*;
pub use preparation_config::*;
pub use report::*;
pub use sensor::*;
pub use sync::*;
pub use timestamp::*;
