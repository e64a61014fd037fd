//! 契约层错误：配置读取 / 解析 / 校验，以及 sink 写入失败

use std::io;
use std::path::PathBuf;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 扩展名既不是 .toml 也不是 .json
    #[error("unsupported config format: {} (expected .toml or .json)", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid {format} config: {source}")]
    Parse {
        format: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("cannot serialize config as {format}: {source}")]
    Serialize {
        format: &'static str,
        #[source]
        source: BoxError,
    },

    /// 语法正确但取值非法
    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("sink '{sink}' failed: {source}")]
    Sink {
        sink: String,
        #[source]
        source: io::Error,
    },
}

impl ContractError {
    pub fn parse(format: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Parse {
            format,
            source: source.into(),
        }
    }

    pub fn serialize(format: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Serialize {
            format,
            source: source.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn sink(sink: impl Into<String>, source: io::Error) -> Self {
        Self::Sink {
            sink: sink.into(),
            source,
        }
    }
}
