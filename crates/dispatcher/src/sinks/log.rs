//! LogSink - logs operator output summaries via tracing

use contracts::{ContractError, DataSink, Message, OperatorOutput, Payload};
use tracing::{debug, info, instrument};

/// Sink that logs a one-line summary per output message
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn log_output_summary(&self, output: &OperatorOutput) {
        match &output.message {
            Message::Watermark(timestamp) => {
                debug!(
                    sink = %self.name,
                    operator = %output.operator,
                    timestamp = %timestamp,
                    "Watermark"
                );
            }
            Message::Data { timestamp, payload } => match payload {
                Payload::Obstacles(obstacles) => {
                    let located = obstacles.iter().filter(|o| o.transform.is_some()).count();
                    info!(
                        sink = %self.name,
                        operator = %output.operator,
                        timestamp = %timestamp,
                        obstacles = obstacles.len(),
                        located,
                        "Obstacles"
                    );
                }
                Payload::TimeToDecision(ttd) => {
                    info!(
                        sink = %self.name,
                        operator = %output.operator,
                        timestamp = %timestamp,
                        deadline_ms = ttd.deadline_ms,
                        flagged = ttd.flagged,
                        "Time to decision"
                    );
                }
                other => {
                    info!(
                        sink = %self.name,
                        operator = %output.operator,
                        timestamp = %timestamp,
                        kind = other.kind(),
                        "Output"
                    );
                }
            },
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, output),
        fields(sink = %self.name, operator = %output.operator)
    )]
    async fn write(&mut self, output: &OperatorOutput) -> Result<(), ContractError> {
        self.log_output_summary(output);
        self.written += 1;
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, written = self.written, "LogSink closed");
        Ok(())
    }
}
