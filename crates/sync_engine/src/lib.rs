//! # Sync Engine
//!
//! Watermark 门控的多通道关联引擎。
//!
//! 负责：
//! - 每通道 FIFO 缓冲与 watermark 记录
//! - 按时间戳跟踪各通道的 watermark 认证
//! - 全部通道认证后触发关联计算，输出 data + watermark
//! - 单一所有者的异步运行器 (`OperatorRunner`)
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::{CorrelationEngine, OperatorRunner};
//!
//! let engine = CorrelationEngine::new(&config.engine, &channels, stage)?;
//! let handle = OperatorRunner::new(engine).spawn(input_rx, output_tx);
//!
//! // ...
//! let report = handle.join().await?;
//! ```

mod buffer;
mod correlate;
mod engine;
mod error;
mod frontier;
mod runner;

pub use buffer::{ChannelBuffer, ChannelCounters};
pub use correlate::{Correlate, FnStage};
pub use engine::{
    CorrelationEngine, EngineStats, OperatorHealth, Resolution, ResolutionStatus, TeardownReport,
};
pub use error::SyncError;
pub use frontier::{Readiness, WatermarkFrontier};
pub use runner::{OperatorRunner, RunnerHandle, RunnerReport};

// Re-export contracts types
pub use contracts::{ChannelEvent, ChannelId, EngineConfig, LogicalTimestamp, Message};
