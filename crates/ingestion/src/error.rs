//! Ingestion 错误类型

use contracts::ChannelId;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 下游队列已关闭
    #[error("channel closed for {channel}")]
    ChannelClosed {
        /// 通道 ID
        channel: ChannelId,
    },

    /// 通道未在 pipeline 中注册
    #[error("channel {channel} is not registered")]
    UnknownChannel {
        /// 通道 ID
        channel: String,
    },

    /// 通道的发送端已被取走
    #[error("sender for channel {channel} was already taken")]
    SenderTaken {
        /// 通道 ID
        channel: ChannelId,
    },

    /// 场景文件解析失败
    #[error("scenario line {line}: {message}")]
    ScenarioParse {
        /// 行号 (1-based)
        line: usize,
        /// 错误消息
        message: String,
    },

    /// 数据源任务异常退出
    #[error("source task failed: {0}")]
    TaskFailed(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
