//! Correlation engine errors
//!
//! Grouped by severity: message-level rejections, operator-fatal escalation,
//! per-timestamp correlation failures and lifecycle errors.

use contracts::{ChannelId, LogicalTimestamp};
use thiserror::Error;

/// Error type shared by the channel buffer, the frontier and the engine
#[derive(Debug, Error)]
pub enum SyncError {
    // ===== Message-level (message dropped, operator stays healthy) =====
    /// Payload timestamp strictly below the channel's last watermark
    #[error("out-of-order payload on '{channel}': {timestamp} < watermark {watermark}")]
    OutOfOrder {
        channel: ChannelId,
        timestamp: LogicalTimestamp,
        watermark: LogicalTimestamp,
    },

    /// Payload for a timestamp the operator has already resolved
    #[error("late payload on '{channel}': {timestamp} <= resolved {resolved}")]
    LatePayload {
        channel: ChannelId,
        timestamp: LogicalTimestamp,
        resolved: LogicalTimestamp,
    },

    /// Channel queue reached its depth cap
    #[error("buffer overflow on '{channel}': depth={depth}, max={max}")]
    BufferOverflow {
        channel: ChannelId,
        depth: usize,
        max: usize,
    },

    /// Channel is not registered with this operator
    #[error("unknown channel '{channel}'")]
    UnknownChannel { channel: ChannelId },

    // ===== Operator-fatal =====
    /// Watermark not strictly greater than the previous one on the channel
    #[error("watermark regression on '{channel}': {received} <= previous {previous}")]
    Regression {
        channel: ChannelId,
        previous: LogicalTimestamp,
        received: LogicalTimestamp,
    },

    // ===== Per-timestamp =====
    /// A channel had no payload for a fully certified timestamp
    #[error("empty buffer on '{channel}' when firing {timestamp}")]
    EmptyBuffer {
        channel: ChannelId,
        timestamp: LogicalTimestamp,
    },

    /// A channel head does not carry the fired timestamp
    #[error("alignment error on '{channel}': expected {expected}, found {found}")]
    Alignment {
        channel: ChannelId,
        expected: LogicalTimestamp,
        found: LogicalTimestamp,
    },

    /// The correlation computation itself failed
    #[error("computation failed at {timestamp}: {source}")]
    Computation {
        timestamp: LogicalTimestamp,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ===== Lifecycle =====
    /// Operator escalated to unhealthy and rejects further input
    #[error("operator unhealthy: {reason}")]
    Unhealthy { reason: String },

    /// Operator was torn down
    #[error("operator closed")]
    Closed,

    /// Channel registration rejected at construction
    #[error("invalid channel set: {message}")]
    InvalidChannels { message: String },
}

impl SyncError {
    /// Stable snake_case label for metrics and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OutOfOrder { .. } => "out_of_order",
            Self::LatePayload { .. } => "late_payload",
            Self::BufferOverflow { .. } => "buffer_overflow",
            Self::UnknownChannel { .. } => "unknown_channel",
            Self::Regression { .. } => "regression",
            Self::EmptyBuffer { .. } => "empty_buffer",
            Self::Alignment { .. } => "alignment",
            Self::Computation { .. } => "computation",
            Self::Unhealthy { .. } => "unhealthy",
            Self::Closed => "closed",
            Self::InvalidChannels { .. } => "invalid_channels",
        }
    }

    /// Whether the error only drops the offending message
    pub fn is_message_level(&self) -> bool {
        matches!(
            self,
            Self::OutOfOrder { .. }
                | Self::LatePayload { .. }
                | Self::BufferOverflow { .. }
                | Self::UnknownChannel { .. }
        )
    }

    /// Whether the operator can no longer accept input after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Regression { .. } | Self::Unhealthy { .. } | Self::Closed
        )
    }

    pub fn computation(
        timestamp: LogicalTimestamp,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Computation {
            timestamp,
            source: source.into(),
        }
    }
}
