//! 算子错误类型

use contracts::ChannelId;
use thiserror::Error;

/// Failures of an operator's correlation step
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Channel carried a payload variant the operator cannot use
    #[error("unexpected payload on '{channel}': expected {expected}, found {found}")]
    UnexpectedPayload {
        channel: ChannelId,
        expected: &'static str,
        found: &'static str,
    },

    /// Number of aligned inputs does not match the registered channels
    #[error("expected {expected} inputs, got {found}")]
    InputCount { expected: usize, found: usize },
}

impl OperatorError {
    pub fn unexpected(channel: &str, expected: &'static str, found: &'static str) -> Self {
        Self::UnexpectedPayload {
            channel: channel.into(),
            expected,
            found,
        }
    }
}
