//! Correlation engine: channel buffers + watermark frontier + stage.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use contracts::{ChannelEvent, ChannelId, EngineConfig, LogicalTimestamp, Message};
use tracing::{debug, error, instrument, trace, warn};

use crate::buffer::ChannelBuffer;
use crate::frontier::{Readiness, WatermarkFrontier};
use crate::{Correlate, SyncError};

/// Operator health
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorHealth {
    Healthy,
    /// Escalated after a fatal input error; all further input is rejected
    Unhealthy { reason: String },
    /// Torn down
    Closed,
}

impl OperatorHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// What happened to one resolved timestamp
#[derive(Debug)]
pub enum ResolutionStatus {
    /// Stage ran; one data message and one watermark were queued for output
    Fired { elapsed: Duration },
    /// Nothing was emitted; stale heads up to the timestamp were discarded
    Failed { error: SyncError, discarded: usize },
    /// Superseded before full certification; buffered payloads were discarded
    Skipped { discarded: usize },
}

/// Resolution of one timestamp, reported in ascending order
#[derive(Debug)]
pub struct Resolution {
    pub timestamp: LogicalTimestamp,
    pub status: ResolutionStatus,
}

impl Resolution {
    pub fn is_fired(&self) -> bool {
        matches!(self.status, ResolutionStatus::Fired { .. })
    }

    pub fn error(&self) -> Option<&SyncError> {
        match &self.status {
            ResolutionStatus::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub payloads_accepted: u64,
    pub watermarks_accepted: u64,
    pub rejected: u64,
    pub fired: u64,
    pub failed: u64,
    pub skipped: u64,
    pub discarded: u64,
}

/// Payloads and pending entries dropped by [`CorrelationEngine::teardown`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub payloads_discarded: usize,
    pub pending_discarded: usize,
}

/// Watermark-gated correlation engine
///
/// Buffers payloads per registered channel and runs the stage once per
/// timestamp, only after every channel has certified it with a watermark.
/// Outputs accumulate in an internal queue, drained with
/// [`drain_output`](Self::drain_output).
///
/// # Examples
/// ```
/// use std::convert::Infallible;
/// use contracts::{ChannelId, EngineConfig, Message};
/// use sync_engine::{CorrelationEngine, FnStage};
///
/// let stage = FnStage::new("pair", |_, inputs: Vec<u32>| Ok::<_, Infallible>(inputs));
/// let channels: Vec<ChannelId> = vec!["a".into(), "b".into()];
/// let mut engine = CorrelationEngine::new(&EngineConfig::default(), &channels, stage).unwrap();
///
/// engine.push_payload("a", 5.into(), 1).unwrap();
/// engine.push_payload("b", 5.into(), 2).unwrap();
/// engine.push_watermark("a", 5.into()).unwrap();
/// assert!(engine.drain_output().is_empty());
///
/// engine.push_watermark("b", 5.into()).unwrap();
/// let out = engine.drain_output();
/// assert_eq!(out, vec![Message::data(5, vec![1, 2]), Message::watermark(5)]);
/// ```
pub struct CorrelationEngine<C: Correlate> {
    name: String,
    channels: Vec<ChannelBuffer<C::Input>>,
    index: HashMap<ChannelId, usize>,
    frontier: WatermarkFrontier,
    stage: C,
    output: VecDeque<Message<C::Output>>,
    health: OperatorHealth,
    stats: EngineStats,
}

impl<C: Correlate> std::fmt::Debug for CorrelationEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationEngine")
            .field("name", &self.name)
            .field("channels", &self.channels)
            .field("frontier", &self.frontier)
            .field("health", &self.health)
            .finish()
    }
}

impl<C: Correlate> CorrelationEngine<C> {
    /// Register `channels` (order = order of inputs handed to the stage).
    ///
    /// # Errors
    /// `InvalidChannels` if the list is empty or contains duplicates.
    pub fn new(
        config: &EngineConfig,
        channels: &[ChannelId],
        stage: C,
    ) -> Result<Self, SyncError> {
        if channels.is_empty() {
            return Err(SyncError::InvalidChannels {
                message: "at least one input channel is required".to_string(),
            });
        }

        let mut index = HashMap::with_capacity(channels.len());
        for (idx, channel) in channels.iter().enumerate() {
            if index.insert(channel.clone(), idx).is_some() {
                return Err(SyncError::InvalidChannels {
                    message: format!("channel '{channel}' registered twice"),
                });
            }
        }

        let name = stage.name().to_string();
        debug!(
            operator = %name,
            channels = ?channels,
            max_buffer_depth = config.max_buffer_depth,
            max_pending = config.max_pending_timestamps,
            "Correlation engine created"
        );
        observability::record_operator_health(&name, true);

        Ok(Self {
            name,
            channels: channels
                .iter()
                .map(|c| ChannelBuffer::new(c.clone(), config.max_buffer_depth))
                .collect(),
            index,
            frontier: WatermarkFrontier::new(channels.len(), config.max_pending_timestamps),
            stage,
            output: VecDeque::new(),
            health: OperatorHealth::Healthy,
            stats: EngineStats::default(),
        })
    }

    /// Dispatch a channel event to `push_payload` / `push_watermark`.
    pub fn push(&mut self, event: ChannelEvent<C::Input>) -> Result<Vec<Resolution>, SyncError> {
        match event.message {
            Message::Data { timestamp, payload } => {
                self.push_payload(&event.channel, timestamp, payload)?;
                Ok(Vec::new())
            }
            Message::Watermark(timestamp) => self.push_watermark(&event.channel, timestamp),
        }
    }

    /// Buffer a payload on `channel`.
    ///
    /// # Errors
    /// Message-level errors (`OutOfOrder`, `LatePayload`, `BufferOverflow`,
    /// `UnknownChannel`) drop the payload; `Unhealthy`/`Closed` after escalation.
    #[instrument(
        level = "trace",
        name = "correlation_push_payload",
        skip(self, timestamp, payload),
        fields(operator = %self.name, timestamp = %timestamp)
    )]
    pub fn push_payload(
        &mut self,
        channel: &str,
        timestamp: LogicalTimestamp,
        payload: C::Input,
    ) -> Result<(), SyncError> {
        self.ensure_open()?;
        let idx = self.channel_index(channel)?;
        observability::record_message_received(&self.name, channel, false);

        let result = match self.frontier.resolved() {
            // payloads below the channel watermark are reported as out of order by the buffer
            Some(resolved)
                if &timestamp <= resolved
                    && !self.channels[idx]
                        .watermark()
                        .is_some_and(|wm| &timestamp < wm) =>
            {
                Err(SyncError::LatePayload {
                    channel: self.channels[idx].channel().clone(),
                    timestamp,
                    resolved: resolved.clone(),
                })
            }
            _ => self.channels[idx].push_payload(timestamp, payload),
        };

        match result {
            Ok(()) => {
                self.stats.payloads_accepted += 1;
                observability::record_buffer_depth(&self.name, channel, self.channels[idx].len());
                Ok(())
            }
            Err(err) => Err(self.reject(channel, err)),
        }
    }

    /// Record a watermark on `channel` and resolve every timestamp it completes.
    ///
    /// # Errors
    /// `Regression` escalates the operator to unhealthy. `UnknownChannel`
    /// drops the watermark.
    #[instrument(
        level = "debug",
        name = "correlation_push_watermark",
        skip(self, timestamp),
        fields(operator = %self.name, timestamp = %timestamp)
    )]
    pub fn push_watermark(
        &mut self,
        channel: &str,
        timestamp: LogicalTimestamp,
    ) -> Result<Vec<Resolution>, SyncError> {
        self.ensure_open()?;
        let idx = self.channel_index(channel)?;
        observability::record_message_received(&self.name, channel, true);

        if let Err(err) = self.channels[idx].push_watermark(timestamp.clone()) {
            let reason = err.to_string();
            error!(operator = %self.name, error = %err, "Watermark regression, operator unhealthy");
            observability::record_message_rejected(&self.name, channel, err.kind());
            observability::record_operator_health(&self.name, false);
            self.stats.rejected += 1;
            self.health = OperatorHealth::Unhealthy { reason };
            return Err(err);
        }
        self.stats.watermarks_accepted += 1;

        let watermarks: Vec<Option<LogicalTimestamp>> =
            self.channels.iter().map(|b| b.watermark().cloned()).collect();
        let readiness = self.frontier.observe(idx, &timestamp, &watermarks);
        observability::record_pending_timestamps(&self.name, self.frontier.pending_len());

        let resolutions: Vec<Resolution> = readiness
            .into_iter()
            .map(|r| match r {
                Readiness::Ready(t) => self.fire(t),
                Readiness::Skipped(t) => self.skip(t),
            })
            .collect();

        for buffer in &self.channels {
            observability::record_buffer_depth(&self.name, buffer.channel(), buffer.len());
        }

        Ok(resolutions)
    }

    /// Take every queued output message in emission order.
    pub fn drain_output(&mut self) -> Vec<Message<C::Output>> {
        self.output.drain(..).collect()
    }

    /// Drop all buffered payloads and pending timestamps without firing.
    ///
    /// The engine is closed afterwards; queued output stays drainable.
    pub fn teardown(&mut self) -> TeardownReport {
        let payloads_discarded: usize = self.channels.iter_mut().map(|b| b.clear()).sum();
        let pending_discarded = self.frontier.clear();
        self.stats.discarded += payloads_discarded as u64;

        if self.health != OperatorHealth::Closed {
            debug!(
                operator = %self.name,
                payloads_discarded,
                pending_discarded,
                "Correlation engine torn down"
            );
        }
        self.health = OperatorHealth::Closed;
        observability::record_operator_health(&self.name, false);

        TeardownReport {
            payloads_discarded,
            pending_discarded,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn health(&self) -> &OperatorHealth {
        &self.health
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Registered channels in registration order
    pub fn channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.channels.iter().map(|b| b.channel())
    }

    /// Buffered payload count of `channel`
    pub fn buffer_depth(&self, channel: &str) -> Option<usize> {
        self.index.get(channel).map(|&idx| self.channels[idx].len())
    }

    /// Latest watermark of `channel`
    pub fn watermark(&self, channel: &str) -> Option<&LogicalTimestamp> {
        self.index
            .get(channel)
            .and_then(|&idx| self.channels[idx].watermark())
    }

    /// Highest resolved timestamp
    pub fn resolved(&self) -> Option<&LogicalTimestamp> {
        self.frontier.resolved()
    }

    pub fn pending_timestamps(&self) -> usize {
        self.frontier.pending_len()
    }

    pub fn stage(&self) -> &C {
        &self.stage
    }

    fn ensure_open(&self) -> Result<(), SyncError> {
        match &self.health {
            OperatorHealth::Healthy => Ok(()),
            OperatorHealth::Unhealthy { reason } => Err(SyncError::Unhealthy {
                reason: reason.clone(),
            }),
            OperatorHealth::Closed => Err(SyncError::Closed),
        }
    }

    fn channel_index(&mut self, channel: &str) -> Result<usize, SyncError> {
        match self.index.get(channel) {
            Some(&idx) => Ok(idx),
            None => Err(self.reject(
                channel,
                SyncError::UnknownChannel {
                    channel: channel.into(),
                },
            )),
        }
    }

    fn reject(&mut self, channel: &str, err: SyncError) -> SyncError {
        warn!(operator = %self.name, channel, error = %err, "Message rejected");
        observability::record_message_rejected(&self.name, channel, err.kind());
        self.stats.rejected += 1;
        err
    }

    fn fire(&mut self, timestamp: LogicalTimestamp) -> Resolution {
        let started = Instant::now();

        if let Err(error) = self.check_heads(&timestamp) {
            let discarded = self.discard_through(&timestamp);
            return self.fail(timestamp, error, discarded);
        }

        let inputs: Result<Vec<C::Input>, SyncError> = self
            .channels
            .iter_mut()
            .map(|b| b.pop_front().map(|(_, payload)| payload))
            .collect();
        let inputs = match inputs {
            Ok(inputs) => inputs,
            Err(error) => {
                let discarded = self.discard_through(&timestamp);
                return self.fail(timestamp, error, discarded);
            }
        };

        match self.stage.correlate(&timestamp, inputs) {
            Ok(output) => {
                self.output.push_back(Message::Data {
                    timestamp: timestamp.clone(),
                    payload: output,
                });
                self.output.push_back(Message::Watermark(timestamp.clone()));

                let elapsed = started.elapsed();
                self.stats.fired += 1;
                observability::record_timestamp_fired(
                    &self.name,
                    elapsed.as_secs_f64() * 1000.0,
                );
                trace!(operator = %self.name, timestamp = %timestamp, "Timestamp fired");

                Resolution {
                    timestamp,
                    status: ResolutionStatus::Fired { elapsed },
                }
            }
            Err(source) => {
                let error = SyncError::computation(timestamp.clone(), source);
                self.fail(timestamp, error, 0)
            }
        }
    }

    /// Every head must exist and carry `timestamp`; checked before anything is popped.
    fn check_heads(&self, timestamp: &LogicalTimestamp) -> Result<(), SyncError> {
        for buffer in &self.channels {
            match buffer.peek_timestamp() {
                None => {
                    return Err(SyncError::EmptyBuffer {
                        channel: buffer.channel().clone(),
                        timestamp: timestamp.clone(),
                    })
                }
                Some(head) if head != timestamp => {
                    return Err(SyncError::Alignment {
                        channel: buffer.channel().clone(),
                        expected: timestamp.clone(),
                        found: head.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn fail(
        &mut self,
        timestamp: LogicalTimestamp,
        error: SyncError,
        discarded: usize,
    ) -> Resolution {
        warn!(
            operator = %self.name,
            timestamp = %timestamp,
            error = %error,
            discarded,
            "Correlation failed"
        );
        observability::record_timestamp_failed(&self.name, error.kind());
        self.stats.failed += 1;

        Resolution {
            timestamp,
            status: ResolutionStatus::Failed { error, discarded },
        }
    }

    fn skip(&mut self, timestamp: LogicalTimestamp) -> Resolution {
        let discarded = self.discard_through(&timestamp);
        warn!(
            operator = %self.name,
            timestamp = %timestamp,
            discarded,
            "Timestamp skipped before full certification"
        );
        observability::record_timestamp_skipped(&self.name, discarded);
        self.stats.skipped += 1;

        Resolution {
            timestamp,
            status: ResolutionStatus::Skipped { discarded },
        }
    }

    fn discard_through(&mut self, timestamp: &LogicalTimestamp) -> usize {
        let discarded: usize = self
            .channels
            .iter_mut()
            .map(|b| b.discard_through(timestamp))
            .sum();
        self.stats.discarded += discarded as u64;
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use crate::FnStage;

    /// Hands the aligned inputs straight through.
    struct Collect;

    impl Correlate for Collect {
        type Input = &'static str;
        type Output = Vec<&'static str>;
        type Error = Infallible;

        fn name(&self) -> &str {
            "collect"
        }

        fn correlate(
            &mut self,
            _timestamp: &LogicalTimestamp,
            inputs: Vec<&'static str>,
        ) -> Result<Self::Output, Self::Error> {
            Ok(inputs)
        }
    }

    fn ts(t: u64) -> LogicalTimestamp {
        LogicalTimestamp::from(t)
    }

    fn engine(channels: &[&str]) -> CorrelationEngine<Collect> {
        let ids: Vec<ChannelId> = channels.iter().map(|c| ChannelId::new(c)).collect();
        CorrelationEngine::new(&EngineConfig::default(), &ids, Collect).unwrap()
    }

    #[test]
    fn test_rejects_invalid_channel_sets() {
        assert!(matches!(
            CorrelationEngine::new(&EngineConfig::default(), &[], Collect),
            Err(SyncError::InvalidChannels { .. })
        ));

        let dup: Vec<ChannelId> = vec!["a".into(), "a".into()];
        assert!(matches!(
            CorrelationEngine::new(&EngineConfig::default(), &dup, Collect),
            Err(SyncError::InvalidChannels { .. })
        ));
    }

    #[test]
    fn test_three_channels_fire_once_after_last_watermark() {
        let mut engine = engine(&["obstacles", "depth", "pose"]);
        engine.push_payload("obstacles", ts(5), "o").unwrap();
        engine.push_payload("depth", ts(5), "d").unwrap();
        engine.push_payload("pose", ts(5), "p").unwrap();

        assert!(engine.push_watermark("obstacles", ts(5)).unwrap().is_empty());
        assert!(engine.push_watermark("depth", ts(5)).unwrap().is_empty());
        assert!(engine.drain_output().is_empty());

        let resolutions = engine.push_watermark("pose", ts(5)).unwrap();
        assert_eq!(resolutions.len(), 1);
        assert!(resolutions[0].is_fired());

        let output = engine.drain_output();
        assert_eq!(
            output,
            vec![
                Message::data(5, vec!["o", "d", "p"]),
                Message::watermark(5),
            ]
        );
        assert_eq!(engine.stats().fired, 1);
        assert!(engine.drain_output().is_empty());
    }

    #[test]
    fn test_out_of_order_payload_rejected_and_operator_stays_healthy() {
        let mut engine = engine(&["a", "b"]);
        engine.push_watermark("a", ts(7)).unwrap();

        let err = engine.push_payload("a", ts(6), "late").unwrap_err();
        assert!(matches!(err, SyncError::OutOfOrder { .. }));
        assert!(engine.health().is_healthy());
        assert_eq!(engine.buffer_depth("a"), Some(0));
        assert_eq!(engine.stats().rejected, 1);
    }

    #[test]
    fn test_empty_buffer_when_watermark_without_payload() {
        let mut engine = engine(&["a", "b"]);
        engine.push_payload("b", ts(7), "b7").unwrap();
        engine.push_watermark("a", ts(7)).unwrap();

        let resolutions = engine.push_watermark("b", ts(7)).unwrap();
        assert_eq!(resolutions.len(), 1);
        assert!(matches!(
            resolutions[0].error(),
            Some(SyncError::EmptyBuffer { channel, .. }) if channel == "a"
        ));

        // nothing emitted, stale head on b discarded
        assert!(engine.drain_output().is_empty());
        assert_eq!(engine.buffer_depth("b"), Some(0));
        assert!(engine.health().is_healthy());

        // the next timestamp still correlates normally
        engine.push_payload("a", ts(8), "a8").unwrap();
        engine.push_payload("b", ts(8), "b8").unwrap();
        engine.push_watermark("a", ts(8)).unwrap();
        let resolutions = engine.push_watermark("b", ts(8)).unwrap();
        assert!(resolutions[0].is_fired());
    }

    #[test]
    fn test_alignment_error_leaves_later_payloads() {
        let mut engine = engine(&["a", "b"]);
        engine.push_payload("a", ts(4), "a4").unwrap();
        engine.push_payload("a", ts(5), "a5").unwrap();
        engine.push_payload("b", ts(5), "b5").unwrap();

        engine.push_watermark("a", ts(5)).unwrap();
        let resolutions = engine.push_watermark("b", ts(5)).unwrap();
        assert!(matches!(
            resolutions[0].error(),
            Some(SyncError::Alignment { .. })
        ));
        assert_eq!(engine.buffer_depth("a"), Some(0));
        assert_eq!(engine.buffer_depth("b"), Some(0));
        assert!(engine.drain_output().is_empty());
    }

    #[test]
    fn test_fires_in_increasing_order() {
        let mut engine = engine(&["a", "b"]);
        for t in [1, 2, 3] {
            engine.push_payload("a", ts(t), "a").unwrap();
            engine.push_payload("b", ts(t), "b").unwrap();
            engine.push_watermark("a", ts(t)).unwrap();
        }

        // one watermark on b certifies 1, 2 and 3 at once
        let resolutions = engine.push_watermark("b", ts(3)).unwrap();
        let fired: Vec<_> = resolutions.iter().map(|r| r.timestamp.clone()).collect();
        assert_eq!(fired, vec![ts(1), ts(2), ts(3)]);
        assert!(resolutions.iter().all(Resolution::is_fired));

        let watermarks: Vec<_> = engine
            .drain_output()
            .into_iter()
            .filter(Message::is_watermark)
            .map(|m| m.timestamp().clone())
            .collect();
        assert_eq!(watermarks, vec![ts(1), ts(2), ts(3)]);
    }

    #[test]
    fn test_late_payload_at_resolved_frontier() {
        let mut engine = engine(&["a", "b"]);
        engine.push_payload("a", ts(5), "a").unwrap();
        engine.push_payload("b", ts(5), "b").unwrap();
        engine.push_watermark("a", ts(5)).unwrap();
        engine.push_watermark("b", ts(5)).unwrap();

        let err = engine.push_payload("a", ts(5), "again").unwrap_err();
        assert!(matches!(err, SyncError::LatePayload { .. }));
    }

    #[test]
    fn test_pending_cap_skips_oldest_timestamp() {
        let config = EngineConfig {
            max_pending_timestamps: 1,
            ..Default::default()
        };
        let ids: Vec<ChannelId> = vec!["a".into(), "b".into()];
        let mut engine = CorrelationEngine::new(&config, &ids, Collect).unwrap();
        for (t, a, b) in [(1, "a1", "b1"), (2, "a2", "b2")] {
            engine.push_payload("a", ts(t), a).unwrap();
            engine.push_payload("b", ts(t), b).unwrap();
        }

        assert!(engine.push_watermark("a", ts(1)).unwrap().is_empty());
        let resolutions = engine.push_watermark("a", ts(2)).unwrap();
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].timestamp, ts(1));
        assert!(matches!(
            resolutions[0].status,
            ResolutionStatus::Skipped { discarded: 2 }
        ));
        assert_eq!(engine.stats().skipped, 1);
        assert_eq!(engine.buffer_depth("a"), Some(1));
        assert_eq!(engine.buffer_depth("b"), Some(1));
        assert!(engine.drain_output().is_empty());

        let err = engine.push_payload("b", ts(1), "late").unwrap_err();
        assert!(matches!(err, SyncError::LatePayload { .. }));

        let resolutions = engine.push_watermark("b", ts(2)).unwrap();
        assert_eq!(resolutions.len(), 1);
        assert!(resolutions[0].is_fired());
        assert_eq!(
            engine.drain_output(),
            vec![Message::data(2, vec!["a2", "b2"]), Message::watermark(2)]
        );
        assert!(engine.health().is_healthy());
    }

    #[test]
    fn test_regression_escalates() {
        let mut engine = engine(&["a", "b"]);
        engine.push_watermark("a", ts(5)).unwrap();

        let err = engine.push_watermark("a", ts(5)).unwrap_err();
        assert!(matches!(err, SyncError::Regression { .. }));
        assert!(matches!(engine.health(), OperatorHealth::Unhealthy { .. }));

        assert!(matches!(
            engine.push_payload("b", ts(6), "b"),
            Err(SyncError::Unhealthy { .. })
        ));
        assert!(matches!(
            engine.push_watermark("b", ts(6)),
            Err(SyncError::Unhealthy { .. })
        ));
    }

    #[test]
    fn test_unknown_channel() {
        let mut engine = engine(&["a"]);
        assert!(matches!(
            engine.push_payload("nope", ts(1), "x"),
            Err(SyncError::UnknownChannel { .. })
        ));
        assert!(engine.health().is_healthy());
    }

    #[test]
    fn test_overflow_drops_message() {
        let ids: Vec<ChannelId> = vec!["a".into(), "b".into()];
        let config = EngineConfig {
            max_buffer_depth: 2,
            ..EngineConfig::default()
        };
        let mut engine = CorrelationEngine::new(&config, &ids, Collect).unwrap();

        engine.push_payload("a", ts(1), "1").unwrap();
        engine.push_payload("a", ts(2), "2").unwrap();
        assert!(matches!(
            engine.push_payload("a", ts(3), "3"),
            Err(SyncError::BufferOverflow { .. })
        ));
        assert_eq!(engine.buffer_depth("a"), Some(2));
    }

    #[test]
    fn test_computation_failure_emits_nothing() {
        #[derive(Debug, thiserror::Error)]
        #[error("boom")]
        struct Boom;

        let stage = FnStage::new("boom", |_: &LogicalTimestamp, _: Vec<u8>| Err::<u8, _>(Boom));
        let ids: Vec<ChannelId> = vec!["a".into()];
        let mut engine = CorrelationEngine::new(&EngineConfig::default(), &ids, stage).unwrap();

        engine.push_payload("a", ts(1), 1).unwrap();
        let resolutions = engine.push_watermark("a", ts(1)).unwrap();
        assert!(matches!(
            resolutions[0].error(),
            Some(SyncError::Computation { .. })
        ));
        assert!(engine.drain_output().is_empty());
        assert_eq!(engine.buffer_depth("a"), Some(0));
    }

    #[test]
    fn test_teardown_discards_without_firing() {
        let mut engine = engine(&["a", "b"]);
        engine.push_payload("a", ts(1), "a").unwrap();
        engine.push_payload("b", ts(1), "b").unwrap();
        engine.push_watermark("a", ts(1)).unwrap();

        let report = engine.teardown();
        assert_eq!(report.payloads_discarded, 2);
        assert_eq!(report.pending_discarded, 1);
        assert_eq!(engine.health(), &OperatorHealth::Closed);

        assert!(matches!(
            engine.push_watermark("b", ts(1)),
            Err(SyncError::Closed)
        ));
        assert!(engine.drain_output().is_empty());
        assert_eq!(engine.stats().fired, 0);
    }

    #[test]
    fn test_push_dispatches_channel_events() {
        let mut engine = engine(&["a"]);
        engine
            .push(ChannelEvent::new("a", Message::data(2, "x")))
            .unwrap();
        let resolutions = engine
            .push(ChannelEvent::new("a", Message::watermark(2)))
            .unwrap();
        assert!(resolutions[0].is_fired());
        assert_eq!(engine.resolved(), Some(&ts(2)));
    }
}
