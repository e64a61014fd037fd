//! Pipeline statistics and metrics.

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::{Message, OperatorOutput, Payload};
use dispatcher::DispatchReport;
use ingestion::{ChannelReport, RouterStats};
use observability::CorrelationStatsAggregator;
use sync_engine::RunnerReport;

/// Data / watermark counts of one operator's output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputCounts {
    pub data: u64,
    pub watermarks: u64,
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Events written by the source (payloads + watermarks)
    pub events_ingested: u64,

    /// Per-channel writer reports
    pub channels: Vec<ChannelReport>,

    /// Fan-out to operator queues
    pub router: RouterStats,

    /// One report per operator runner
    pub operators: Vec<RunnerReport>,

    /// Output observed between the operators and the dispatcher
    pub outputs: BTreeMap<String, OutputCounts>,

    /// Correlation stats merged over all operators, plus output-derived stats
    pub correlation: CorrelationStatsAggregator,

    /// Dispatcher report (absent when it did not finish in time)
    pub dispatch: Option<DispatchReport>,

    /// Stopped by max outputs, timeout or signal rather than by input end
    pub stopped_early: bool,
}

impl PipelineStats {
    /// Account one operator output on its way to the dispatcher
    pub fn observe_output(&mut self, output: &OperatorOutput) {
        let counts = self.outputs.entry(output.operator.clone()).or_default();
        match &output.message {
            Message::Watermark(_) => counts.watermarks += 1,
            Message::Data { payload, .. } => {
                counts.data += 1;
                match payload {
                    Payload::TimeToDecision(ttd) => {
                        self.correlation.record_deadline(ttd.deadline_ms, ttd.flagged)
                    }
                    Payload::Obstacles(obstacles) => {
                        let resolved = obstacles.iter().filter(|o| o.transform.is_some()).count();
                        self.correlation
                            .record_geolocation(resolved, obstacles.len() - resolved);
                    }
                    _ => {}
                }
            }
        }
    }

    /// Data outputs across all operators
    pub fn data_outputs(&self) -> u64 {
        self.outputs.values().map(|c| c.data).sum()
    }

    /// Fold a finished runner into the totals
    pub fn add_operator(&mut self, report: RunnerReport) {
        self.correlation.merge(&report.stats);
        self.operators.push(report);
    }

    /// Timestamps fired per second of wall-clock time
    pub fn fire_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.correlation.total_fired as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Events ingested: {}", self.events_ingested);
        println!(
            "   ├─ Routed: {} received, {} delivered, {} unrouted",
            self.router.received, self.router.delivered, self.router.unrouted
        );
        println!("   ├─ Fired/s: {:.2}", self.fire_rate());
        println!("   └─ Stopped early: {}", self.stopped_early);

        if !self.channels.is_empty() {
            println!("\n📡 Channels ({})", self.channels.len());
            for (i, channel) in self.channels.iter().enumerate() {
                let prefix = if i == self.channels.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: {} payloads, {} watermarks",
                    prefix, channel.channel, channel.payloads, channel.ticks
                );
            }
        }

        println!("\n⚙️  Operators ({})", self.operators.len());
        for (i, report) in self.operators.iter().enumerate() {
            let prefix = if i == self.operators.len() - 1 { "└─" } else { "├─" };
            let counts = self
                .outputs
                .get(&report.operator)
                .copied()
                .unwrap_or_default();
            println!(
                "   {} {}: fired={} failed={} skipped={} rejected={} out={}+{}wm health={:?}",
                prefix,
                report.operator,
                report.engine.fired,
                report.engine.failed,
                report.engine.skipped,
                report.engine.rejected,
                counts.data,
                counts.watermarks,
                report.health
            );
        }

        println!("\n📈 {}", self.correlation.summary());

        if let Some(dispatch) = &self.dispatch {
            println!("📤 Sinks ({})", dispatch.sinks.len());
            for (i, (name, m)) in dispatch.sinks.iter().enumerate() {
                let prefix = if i == dispatch.sinks.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: written={} failures={} dropped={}",
                    prefix,
                    name,
                    m.written(),
                    m.failures,
                    m.dropped
                );
            }
        }

        println!();
    }
}
