//! Scenario replay
//!
//! A scenario is a JSON-lines file, one `ChannelEvent` per line:
//!
//! ```text
//! {"channel":"pose","message":{"data":{"timestamp":[100],"payload":{"pose":{...}}}}}
//! {"channel":"pose","message":{"watermark":[100]}}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. On replay every channel
//! gets its own writer task, so channels interleave freely while each keeps
//! its file order.

use std::fs;
use std::path::Path;

use contracts::{ChannelEvent, ChannelId, Message, Payload};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::{IngestionError, Result};
use crate::pipeline::{ChannelReport, ChannelSender, IngestionPipeline};

/// Recorded channel events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scenario {
    events: Vec<ChannelEvent<Payload>>,
}

impl Scenario {
    pub fn new(events: Vec<ChannelEvent<Payload>>) -> Self {
        Self { events }
    }

    /// Parse JSON-lines text
    pub fn parse(text: &str) -> Result<Self> {
        let mut events = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let event: ChannelEvent<Payload> =
                serde_json::from_str(line).map_err(|e| IngestionError::ScenarioParse {
                    line: index + 1,
                    message: e.to_string(),
                })?;
            events.push(event);
        }
        Ok(Self { events })
    }

    /// Load from a file
    #[instrument(name = "scenario_load", skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let scenario = Self::parse(&text)?;
        info!(events = scenario.len(), channels = scenario.channels().len(), "scenario loaded");
        Ok(scenario)
    }

    /// Serialize to JSON-lines text
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = String::new();
        for (index, event) in self.events.iter().enumerate() {
            let line = serde_json::to_string(event).map_err(|e| IngestionError::ScenarioParse {
                line: index + 1,
                message: e.to_string(),
            })?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_lines()?)?;
        Ok(())
    }

    pub fn push(&mut self, event: ChannelEvent<Payload>) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ChannelEvent<Payload>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Channels in order of first appearance
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = Vec::new();
        for event in &self.events {
            if !channels.contains(&event.channel) {
                channels.push(event.channel.clone());
            }
        }
        channels
    }

    /// Split into per-channel message lists, keeping file order within each
    pub fn into_channels(self) -> Vec<(ChannelId, Vec<Message<Payload>>)> {
        let mut split: Vec<(ChannelId, Vec<Message<Payload>>)> = Vec::new();
        for ChannelEvent { channel, message } in self.events {
            match split.iter_mut().find(|(c, _)| *c == channel) {
                Some((_, messages)) => messages.push(message),
                None => split.push((channel, vec![message])),
            }
        }
        split
    }

    /// Replay through `pipeline`, one writer task per channel.
    ///
    /// Every channel of the scenario must be registered and its writer not yet
    /// taken.
    pub fn replay(
        self,
        pipeline: &mut IngestionPipeline,
    ) -> Result<Vec<JoinHandle<Result<ChannelReport>>>> {
        let split = self.into_channels();
        let mut writers = Vec::with_capacity(split.len());
        for (channel, messages) in split {
            let sender = pipeline.channel_sender(&channel)?;
            writers.push((sender, messages));
        }

        Ok(writers
            .into_iter()
            .map(|(sender, messages)| tokio::spawn(replay_channel(sender, messages)))
            .collect())
    }
}

async fn replay_channel(
    sender: ChannelSender,
    messages: Vec<Message<Payload>>,
) -> Result<ChannelReport> {
    let mut report = ChannelReport {
        channel: sender.channel().clone(),
        ticks: 0,
        payloads: 0,
    };

    for message in messages {
        let watermark = message.is_watermark();
        sender.send(message).await?;
        if watermark {
            report.ticks += 1;
        } else {
            report.payloads += 1;
        }
    }

    debug!(channel = %report.channel, payloads = report.payloads, watermarks = report.ticks, "channel replayed");
    Ok(report)
}
