//! Ingestion Pipeline main entry

use std::collections::HashMap;
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender};
use contracts::{ChannelEvent, ChannelId, LogicalTimestamp, Message, Payload};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{IngestionConfig, IngestionMetrics};
use crate::error::{IngestionError, Result};

/// What one producer wrote to its channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: ChannelId,
    /// Watermarks sent
    pub ticks: u64,
    pub payloads: u64,
}

/// Writer of one channel.
///
/// Exactly one exists per registered channel and it cannot be cloned, so the
/// order of a channel's messages is the order its producer sent them in.
#[derive(Debug)]
pub struct ChannelSender {
    channel: ChannelId,
    tx: Sender<ChannelEvent<Payload>>,
    metrics: Arc<IngestionMetrics>,
}

impl ChannelSender {
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Send a payload, waiting while the queue is full
    pub async fn send_payload(
        &self,
        timestamp: impl Into<LogicalTimestamp>,
        payload: Payload,
    ) -> Result<()> {
        self.send(Message::data(timestamp, payload)).await
    }

    /// Send a watermark, waiting while the queue is full
    pub async fn send_watermark(&self, timestamp: impl Into<LogicalTimestamp>) -> Result<()> {
        self.send(Message::watermark(timestamp)).await
    }

    pub async fn send(&self, message: Message<Payload>) -> Result<()> {
        let watermark = message.is_watermark();
        let event = ChannelEvent {
            channel: self.channel.clone(),
            message,
        };

        if self.tx.send(event).await.is_err() {
            self.metrics.record_send_failure();
            warn!(channel = %self.channel, "ingestion queue closed");
            return Err(IngestionError::ChannelClosed {
                channel: self.channel.clone(),
            });
        }

        self.metrics.record_sent(watermark);
        self.metrics.update_queue_len(self.tx.len());
        metrics::counter!(
            "ingestion_events_total",
            "channel" => self.channel.to_string(),
            "kind" => if watermark { "watermark" } else { "data" }
        )
        .increment(1);
        trace!(channel = %self.channel, watermark, "event sent");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Wait for producer tasks and collect their reports
pub async fn join_writers(handles: Vec<JoinHandle<Result<ChannelReport>>>) -> Result<Vec<ChannelReport>> {
    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        let report = handle
            .await
            .map_err(|e| IngestionError::TaskFailed(e.to_string()))??;
        reports.push(report);
    }
    Ok(reports)
}

/// Ingestion Pipeline
///
/// Fans the registered channels into one bounded queue of `ChannelEvent`s.
pub struct IngestionPipeline {
    /// Unclaimed writers, one per channel
    senders: HashMap<ChannelId, ChannelSender>,

    /// Registered channels in registration order
    channels: Vec<ChannelId>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Data sender (shared by all channel writers)
    tx: Sender<ChannelEvent<Payload>>,

    /// Data receiver
    rx: Option<Receiver<ChannelEvent<Payload>>>,
}

impl IngestionPipeline {
    /// Create a pipeline with the given queue capacity
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_config(IngestionConfig { channel_capacity })
    }

    pub fn with_config(config: IngestionConfig) -> Self {
        let (tx, rx) = bounded(config.channel_capacity.max(1));

        Self {
            senders: HashMap::new(),
            channels: Vec::new(),
            metrics: Arc::new(IngestionMetrics::new()),
            tx,
            rx: Some(rx),
        }
    }

    /// Register a channel; registering the same channel twice is a no-op
    #[instrument(name = "ingestion_register_channel", skip(self, channel), fields(channel = %channel))]
    pub fn register_channel(&mut self, channel: ChannelId) {
        if self.channels.contains(&channel) {
            return;
        }
        let sender = ChannelSender {
            channel: channel.clone(),
            tx: self.tx.clone(),
            metrics: self.metrics.clone(),
        };
        debug!("registered channel");
        self.senders.insert(channel.clone(), sender);
        self.channels.push(channel);
    }

    pub fn register_channels<I>(&mut self, channels: I)
    where
        I: IntoIterator<Item = ChannelId>,
    {
        for channel in channels {
            self.register_channel(channel);
        }
    }

    /// Take the writer of a channel.
    ///
    /// Note: each writer can only be taken once
    pub fn channel_sender(&mut self, channel: &str) -> Result<ChannelSender> {
        if let Some(sender) = self.senders.remove(channel) {
            return Ok(sender);
        }
        match self.channels.iter().find(|c| c.as_str() == channel) {
            Some(registered) => Err(IngestionError::SenderTaken {
                channel: registered.clone(),
            }),
            None => Err(IngestionError::UnknownChannel {
                channel: channel.to_string(),
            }),
        }
    }

    /// Take every writer still held by the pipeline, in registration order
    pub fn take_senders(&mut self) -> Vec<ChannelSender> {
        let channels = self.channels.clone();
        channels
            .iter()
            .filter_map(|channel| self.senders.remove(channel))
            .collect()
    }

    /// Get data stream receiver
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<ChannelEvent<Payload>>> {
        self.rx.take()
    }

    /// Close the queue; pending events stay readable, further sends fail
    #[instrument(name = "ingestion_close", skip(self))]
    pub fn close(&self) {
        if self.tx.close() {
            info!(channels = self.channels.len(), "ingestion queue closed");
        }
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
