//! # Sync Engine
//!
//! 多传感器时间同步与重采样核心。
//!
//! 负责：
//! - 相机时钟偏移校正
//! - IMU 降采样 (游程减半)
//! - IMU 与相机起始时间同步 (有界迭代)
//! - 头部/尾部裁剪
//! - 相机按 200 ms 节拍重编号
//! - IMU 滑动窗口生成 (含损坏窗口检测)
//!
//! 各阶段直接读写测量目录，必须按顺序依次执行，不能并发作用于同一测量。
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::{ClockOffsetModel, ImuDownsampler, TimestampSynchronizer};
//!
//! let downsample = ImuDownsampler::new(config.sensors.reference_sensors.clone()).run(&layout)?;
//! let offsets = ClockOffsetModel::load(&info, &config.sensors.camera_groups);
//! let outcome = TimestampSynchronizer::new(&offsets, config.sync.max_iterations)
//!     .synchronize(&layout, reference)?;
//! ```

mod clock_offset;
mod downsampler;
mod renumber;
mod synchronizer;
mod trimmer;
mod window;

pub use clock_offset::ClockOffsetModel;
pub use downsampler::{detect_runs, downsampled_count, DownsamplePlan, ImuDownsampler, Run};
pub use renumber::{
    plan_renumbering, renumber_images, RenumberPlan, DUPLICATE_THRESHOLD_MS, PERIOD_DIVISOR_MS,
};
pub use synchronizer::{closest_frame, CameraFrames, TimestampSynchronizer};
pub use trimmer::{
    tail_boundary, trim_image_head, trim_tail, trim_timeseries_head, ImageTrim,
    DOUBLE_RATE_WINDOW_MS,
};
pub use window::{
    load_stream, longest_identical_run, window_count, window_end, ChannelStats,
    SlidingWindowBuilder, MIN_STD,
};
