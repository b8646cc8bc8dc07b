//! # Dataset
//!
//! 数据集组装模块。
//!
//! 负责：
//! - 标签索引 `labels.csv` 的创建、读取与更新
//! - 完整性过滤：删除不是每个传感器都有的样本
//! - 单个测量的完整处理流程 (`prepare_measurement`)
//! - 合并多个已处理的测量 (`combine_measurements`)

pub mod combine;
pub mod completeness;
pub mod label_index;
pub mod prepare;

pub use combine::{combine_measurements, CombineReport};
pub use completeness::{CompletenessFilter, CompletenessScan};
pub use contracts::PreparationReport;
pub use label_index::{LabelIndex, LabelRow, LABEL_INDEX_FILE};
pub use prepare::{prepare_measurement, resolve_label};
