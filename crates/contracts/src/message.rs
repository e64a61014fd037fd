//! Stream messages exchanged between producers, operators and sinks.

use serde::{Deserialize, Serialize};

use crate::{ChannelId, LogicalTimestamp, Payload};

/// One element of a channel: a payload or a watermark.
///
/// A `Watermark(t)` certifies that no payload with timestamp `t` or earlier
/// will follow on the same channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message<T> {
    /// Payload message
    Data {
        timestamp: LogicalTimestamp,
        payload: T,
    },
    /// Watermark marker
    Watermark(LogicalTimestamp),
}

impl<T> Message<T> {
    pub fn data(timestamp: impl Into<LogicalTimestamp>, payload: T) -> Self {
        Self::Data {
            timestamp: timestamp.into(),
            payload,
        }
    }

    pub fn watermark(timestamp: impl Into<LogicalTimestamp>) -> Self {
        Self::Watermark(timestamp.into())
    }

    pub fn timestamp(&self) -> &LogicalTimestamp {
        match self {
            Self::Data { timestamp, .. } => timestamp,
            Self::Watermark(timestamp) => timestamp,
        }
    }

    pub fn is_watermark(&self) -> bool {
        matches!(self, Self::Watermark(_))
    }

    /// Payload reference, `None` for watermarks
    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Data { payload, .. } => Some(payload),
            Self::Watermark(_) => None,
        }
    }
}

/// A message tagged with the input channel it arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent<T> {
    pub channel: ChannelId,
    pub message: Message<T>,
}

impl<T> ChannelEvent<T> {
    pub fn new(channel: impl Into<ChannelId>, message: Message<T>) -> Self {
        Self {
            channel: channel.into(),
            message,
        }
    }
}

/// Output of one operator as seen by the dispatcher and sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorOutput {
    /// Operator that produced the message
    pub operator: String,

    /// Data or watermark on the operator's output channel
    pub message: Message<Payload>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_accessors() {
        let data: Message<u32> = Message::data(5, 42);
        assert_eq!(data.timestamp(), &LogicalTimestamp::from(5));
        assert_eq!(data.payload(), Some(&42));
        assert!(!data.is_watermark());

        let wm: Message<u32> = Message::watermark(5);
        assert!(wm.is_watermark());
        assert_eq!(wm.payload(), None);
    }

    #[test]
    fn test_channel_event_json_shape() {
        let event = ChannelEvent::new("pose", Message::<u32>::watermark(7));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"channel":"pose","message":{"watermark":[7]}}"#);
    }
}
