//! # Dispatcher
//!
//! 输出分发模块。
//!
//! 负责：
//! - 按发出顺序消费算子输出 (`OperatorOutput`)
//! - Fan-out 到多个 sinks
//! - 隔离慢 sink，不阻塞算子

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, OperatorOutput};
pub use dispatcher::{create_dispatcher, DispatchReport, Dispatcher};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, LogSink, OutputRecord};
