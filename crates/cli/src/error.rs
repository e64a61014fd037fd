//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Malformed `--skip` value
    #[error("Invalid skip '{value}': {message}")]
    InvalidSkip { value: String, message: String },

    /// An operator escalated to unhealthy during the run
    #[error("Operator '{operator}' stopped unhealthy: {reason}")]
    OperatorUnhealthy { operator: String, reason: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_skip(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSkip {
            value: value.into(),
            message: message.into(),
        }
    }

    pub fn operator_unhealthy(operator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OperatorUnhealthy {
            operator: operator.into(),
            reason: reason.into(),
        }
    }
}
