//! Async operator runner
//!
//! One tokio task owns the engine and is its only mutator: it consumes
//! channel events, feeds the engine, and forwards every output message to the
//! dispatcher in emission order.

use contracts::{ChannelEvent, OperatorOutput, Payload};
use observability::CorrelationStatsAggregator;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::engine::{EngineStats, OperatorHealth, ResolutionStatus, TeardownReport};
use crate::{Correlate, CorrelationEngine};

/// Summary of one runner's lifetime
#[derive(Debug, Clone)]
pub struct RunnerReport {
    pub operator: String,
    pub events_received: u64,
    pub outputs_sent: u64,
    pub engine: EngineStats,
    pub stats: CorrelationStatsAggregator,
    /// Health at the moment the loop stopped (before teardown)
    pub health: OperatorHealth,
    pub teardown: TeardownReport,
}

/// Handle to a spawned runner
pub struct RunnerHandle {
    operator: String,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<RunnerReport>,
}

impl RunnerHandle {
    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// Ask the runner to stop after the event it is processing
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the runner to finish
    pub async fn join(self) -> Result<RunnerReport, tokio::task::JoinError> {
        self.join.await
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Drives a [`CorrelationEngine`] from an input queue.
pub struct OperatorRunner<C: Correlate> {
    engine: CorrelationEngine<C>,
}

impl<C> OperatorRunner<C>
where
    C: Correlate<Input = Payload, Output = Payload> + Send + 'static,
{
    pub fn new(engine: CorrelationEngine<C>) -> Self {
        Self { engine }
    }

    /// Spawn the event loop on the current tokio runtime
    pub fn spawn(
        self,
        input: async_channel::Receiver<ChannelEvent<Payload>>,
        output: mpsc::Sender<OperatorOutput>,
    ) -> RunnerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let operator = self.engine.name().to_string();
        let join = tokio::spawn(self.run(input, output, shutdown_rx));

        RunnerHandle {
            operator,
            shutdown: Some(shutdown_tx),
            join,
        }
    }

    /// Run until the input closes, shutdown is requested, the output is
    /// dropped, or the operator escalates to unhealthy.
    #[instrument(name = "operator_runner", skip_all, fields(operator = %self.engine.name()))]
    pub async fn run(
        mut self,
        input: async_channel::Receiver<ChannelEvent<Payload>>,
        output: mpsc::Sender<OperatorOutput>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> RunnerReport {
        let operator = self.engine.name().to_string();
        let mut events_received = 0u64;
        let mut outputs_sent = 0u64;
        let mut stats = CorrelationStatsAggregator::new();
        let mut shutdown_dropped = false;

        info!(channels = ?self.engine.channels().collect::<Vec<_>>(), "Operator runner started");

        loop {
            tokio::select! {
                biased;

                signal = &mut shutdown, if !shutdown_dropped => {
                    if signal.is_ok() {
                        info!("Shutdown requested");
                        break;
                    }
                    // handle dropped without asking for shutdown
                    shutdown_dropped = true;
                }

                event = input.recv() => {
                    let Ok(event) = event else {
                        debug!("Input closed");
                        break;
                    };
                    events_received += 1;

                    if let Flow::Stop = self.handle(event, &mut stats) {
                        break;
                    }

                    let mut output_closed = false;
                    for message in self.engine.drain_output() {
                        let out = OperatorOutput {
                            operator: operator.clone(),
                            message,
                        };
                        if output.send(out).await.is_err() {
                            output_closed = true;
                            break;
                        }
                        outputs_sent += 1;
                    }
                    if output_closed {
                        debug!("Output channel closed");
                        break;
                    }
                }
            }
        }

        let health = self.engine.health().clone();
        let teardown = self.engine.teardown();
        let engine = self.engine.stats();

        info!(
            events = events_received,
            outputs = outputs_sent,
            fired = engine.fired,
            failed = engine.failed,
            skipped = engine.skipped,
            rejected = engine.rejected,
            "Operator runner stopped"
        );

        RunnerReport {
            operator,
            events_received,
            outputs_sent,
            engine,
            stats,
            health,
            teardown,
        }
    }

    fn handle(
        &mut self,
        event: ChannelEvent<Payload>,
        stats: &mut CorrelationStatsAggregator,
    ) -> Flow {
        match self.engine.push(event) {
            Ok(resolutions) => {
                for resolution in resolutions {
                    match resolution.status {
                        ResolutionStatus::Fired { elapsed } => {
                            stats.record_fired(elapsed.as_secs_f64() * 1000.0)
                        }
                        ResolutionStatus::Failed { error, discarded } => {
                            stats.record_failed(error.kind(), discarded)
                        }
                        ResolutionStatus::Skipped { discarded } => stats.record_skipped(discarded),
                    }
                }
                Flow::Continue
            }
            Err(err) if err.is_fatal() => {
                stats.record_rejected(err.kind());
                error!(error = %err, "Operator stopped accepting input");
                Flow::Stop
            }
            Err(err) => {
                stats.record_rejected(err.kind());
                Flow::Continue
            }
        }
    }

    pub fn engine(&self) -> &CorrelationEngine<C> {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use contracts::{
        ChannelId, EngineConfig, LogicalTimestamp, Message, TimeToDecision, VehiclePose,
    };

    use crate::FnStage;

    fn deadline_stage() -> impl Correlate<Input = Payload, Output = Payload> + Send + 'static {
        FnStage::new("echo", |_: &LogicalTimestamp, inputs: Vec<Payload>| {
            let speed = match inputs.first() {
                Some(Payload::Pose(pose)) => pose.forward_speed,
                _ => 0.0,
            };
            Ok::<_, Infallible>(Payload::TimeToDecision(TimeToDecision {
                deadline_ms: speed,
                flagged: false,
            }))
        })
    }

    fn pose(speed: f64) -> Payload {
        Payload::Pose(VehiclePose {
            forward_speed: speed,
            ..Default::default()
        })
    }

    fn runner() -> OperatorRunner<impl Correlate<Input = Payload, Output = Payload> + Send + 'static>
    {
        let channels: Vec<ChannelId> = vec![ChannelId::POSE.into()];
        let engine =
            CorrelationEngine::new(&EngineConfig::default(), &channels, deadline_stage()).unwrap();
        OperatorRunner::new(engine)
    }

    #[tokio::test]
    async fn test_runner_forwards_data_then_watermark() {
        let (in_tx, in_rx) = async_channel::bounded(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let handle = runner().spawn(in_rx, out_tx);

        in_tx
            .send(ChannelEvent::new("pose", Message::data(1, pose(12.0))))
            .await
            .unwrap();
        in_tx
            .send(ChannelEvent::new("pose", Message::watermark(1)))
            .await
            .unwrap();

        let first = out_rx.recv().await.unwrap();
        assert_eq!(first.operator, "echo");
        assert!(matches!(
            first.message.payload(),
            Some(Payload::TimeToDecision(t)) if t.deadline_ms == 12.0
        ));
        let second = out_rx.recv().await.unwrap();
        assert_eq!(second.message, Message::watermark(1));

        drop(in_tx);
        let report = handle.join().await.unwrap();
        assert_eq!(report.events_received, 2);
        assert_eq!(report.outputs_sent, 2);
        assert_eq!(report.engine.fired, 1);
        assert_eq!(report.health, OperatorHealth::Healthy);
    }

    #[tokio::test]
    async fn test_runner_stops_on_regression() {
        let (in_tx, in_rx) = async_channel::bounded(16);
        let (out_tx, _out_rx) = mpsc::channel(16);
        let handle = runner().spawn(in_rx, out_tx);

        in_tx
            .send(ChannelEvent::new("pose", Message::watermark(3)))
            .await
            .unwrap();
        in_tx
            .send(ChannelEvent::new("pose", Message::watermark(2)))
            .await
            .unwrap();

        let report = handle.join().await.unwrap();
        assert!(matches!(report.health, OperatorHealth::Unhealthy { .. }));
        assert_eq!(report.stats.rejected.get("regression"), Some(&1));
    }

    #[tokio::test]
    async fn test_runner_shutdown_discards_pending() {
        let (in_tx, in_rx) = async_channel::bounded(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let mut handle = runner().spawn(in_rx, out_tx);

        in_tx
            .send(ChannelEvent::new("pose", Message::data(1, pose(5.0))))
            .await
            .unwrap();
        // let the runner buffer the payload before shutting down
        while !in_tx.is_empty() {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        handle.shutdown();
        let report = handle.join().await.unwrap();
        assert_eq!(report.engine.fired, 0);
        assert_eq!(report.teardown.payloads_discarded, 1);
        assert!(out_rx.recv().await.is_none());
    }
}
