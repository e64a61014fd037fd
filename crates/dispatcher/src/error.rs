//! 分发器错误

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// sink 初始化失败（例如输出目录不可写）
    #[error("failed to create sink '{name}': {source}")]
    SinkCreation {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("duplicate sink name '{name}'")]
    DuplicateSink { name: String },
}
