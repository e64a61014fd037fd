//! Pipeline orchestrator - coordinates all components.
//!
//! 数据流：
//! 数据源 (synthetic / scenario) → IngestionPipeline → ChannelRouter
//! → 每个算子一个 OperatorRunner → 输出统计 → Dispatcher → sinks

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{OperatorOutput, PipelineBlueprint};
use ingestion::{
    ChannelReport, ChannelRouter, IngestionPipeline, Scenario, SkippedPayload, SyntheticConfig,
    SyntheticSource,
};
use operators::{
    DeadlineModel, ObstacleLocationFinder, TimeToDecisionOperator, OBSTACLE_LOCATION,
    TIME_TO_DECISION,
};
use sync_engine::{OperatorRunner, RunnerHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::PipelineStats;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the input streams come from
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Synthetic driver, payload + watermark per tick
    Synthetic {
        /// `None` runs until stopped
        ticks: Option<u64>,
        step_ms: u64,
        interval: Duration,
        skip: Vec<SkippedPayload>,
    },
    /// JSON-lines scenario replay
    Scenario(PathBuf),
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The pipeline blueprint
    pub blueprint: PipelineBlueprint,

    /// Input streams
    pub source: InputSource,

    /// Stop after this many data outputs (None = unlimited)
    pub max_outputs: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Capacity of the internal queues
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Running source: writer tasks plus a stop switch for the synthetic driver
struct RunningSource {
    synthetic: Option<SyntheticSource>,
    writers: Vec<JoinHandle<ingestion::Result<ChannelReport>>>,
}

impl RunningSource {
    fn stop(&self) {
        if let Some(source) = &self.synthetic {
            source.stop();
        }
    }
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until the input ends, the output limit is reached or
    /// the timeout expires
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let buffer_size = self.config.buffer_size.max(1);

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        // Operators and routing
        let mut ingestion = IngestionPipeline::new(buffer_size);
        let mut router = ChannelRouter::new();
        let (output_tx, mut output_rx) = mpsc::channel::<OperatorOutput>(buffer_size);
        let mut runners: Vec<RunnerHandle> = Vec::new();

        if blueprint.operators.obstacle_location {
            let finder = ObstacleLocationFinder::from_blueprint(blueprint);
            let channels = finder.channels();
            ingestion.register_channels(channels.iter().cloned());
            let input = router.subscribe(OBSTACLE_LOCATION, &channels, buffer_size);
            let engine = finder
                .into_engine(&blueprint.engine)
                .context("Failed to build obstacle location engine")?;
            runners.push(OperatorRunner::new(engine).spawn(input, output_tx.clone()));
        }

        if blueprint.operators.time_to_decision {
            let channels = TimeToDecisionOperator::channels();
            ingestion.register_channels(channels.iter().cloned());
            let input = router.subscribe(TIME_TO_DECISION, &channels, buffer_size);
            let engine = TimeToDecisionOperator::new(DeadlineModel::new(blueprint.deadline.clone()))
                .into_engine(&blueprint.engine)
                .context("Failed to build time-to-decision engine")?;
            runners.push(OperatorRunner::new(engine).spawn(input, output_tx.clone()));
        }

        // runners hold the only senders from here on
        drop(output_tx);

        info!(
            operators = runners.len(),
            channels = ?router.channels(),
            "Operators started"
        );

        // Dispatcher
        let (dispatch_tx, dispatch_rx) = mpsc::channel::<OperatorOutput>(buffer_size);
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - operator output will be dropped");
        }
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), dispatch_rx)
            .context("Failed to create dispatcher")?;
        let dispatcher_handle = dispatcher.spawn();

        // Input
        let input_rx = ingestion
            .take_receiver()
            .context("Failed to get ingestion receiver")?;
        let router_handle = router.spawn(input_rx);
        let source = self.start_source(&mut ingestion)?;
        let ingestion_metrics = ingestion.metrics();
        // the queue closes once every writer is done
        drop(ingestion);

        let mut stats = PipelineStats::default();
        let max_outputs = self.config.max_outputs;

        let forward = async {
            while let Some(output) = output_rx.recv().await {
                stats.observe_output(&output);
                if dispatch_tx.send(output).await.is_err() {
                    warn!("Dispatcher channel closed");
                    return true;
                }
                if let Some(max) = max_outputs {
                    if stats.data_outputs() >= max {
                        info!(outputs = stats.data_outputs(), "Reached max outputs limit");
                        return true;
                    }
                }
            }
            false
        };

        let stopped_early = match self.config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, forward).await {
                Ok(stopped) => stopped,
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Pipeline timed out");
                    true
                }
            },
            None => forward.await,
        };
        stats.stopped_early = stopped_early;

        // Shutdown
        info!("Shutting down pipeline...");
        source.stop();
        for runner in &mut runners {
            runner.shutdown();
        }
        // unblocks runners waiting on a full output queue
        drop(output_rx);
        drop(dispatch_tx);

        for runner in runners {
            let operator = runner.operator().to_string();
            match tokio::time::timeout(DRAIN_TIMEOUT, runner.join()).await {
                Ok(Ok(report)) => stats.add_operator(report),
                Ok(Err(e)) => warn!(operator = %operator, error = %e, "Operator task failed"),
                Err(_) => warn!(operator = %operator, "Operator did not stop in time"),
            }
        }

        for writer in source.writers {
            match tokio::time::timeout(DRAIN_TIMEOUT, writer).await {
                Ok(Ok(Ok(report))) => stats.channels.push(report),
                Ok(Ok(Err(e))) if stopped_early => {
                    debug!(error = %e, "Writer stopped after early shutdown")
                }
                Ok(Ok(Err(e))) => warn!(error = %e, "Writer failed"),
                Ok(Err(e)) => warn!(error = %e, "Writer task failed"),
                Err(_) => warn!("Writer did not stop in time"),
            }
        }

        match tokio::time::timeout(DRAIN_TIMEOUT, router_handle).await {
            Ok(Ok(router)) => stats.router = router,
            Ok(Err(e)) => warn!(error = %e, "Router task failed"),
            Err(_) => warn!("Router did not stop in time"),
        }

        // Wait for dispatcher to flush
        match tokio::time::timeout(DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(report)) => stats.dispatch = Some(report),
            Ok(Err(e)) => warn!(error = %e, "Dispatcher task failed"),
            Err(_) => warn!("Dispatcher did not flush in time"),
        }

        stats.events_ingested = ingestion_metrics.snapshot().events_sent();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fired = stats.correlation.total_fired,
            outputs = stats.data_outputs(),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    fn start_source(&self, ingestion: &mut IngestionPipeline) -> Result<RunningSource> {
        match &self.config.source {
            InputSource::Synthetic {
                ticks,
                step_ms,
                interval,
                skip,
            } => {
                let blueprint = &self.config.blueprint;
                let source = SyntheticSource::new(SyntheticConfig {
                    ticks: *ticks,
                    step_ms: *step_ms,
                    interval: *interval,
                    camera: blueprint.camera.clone(),
                    depth_source: blueprint.geolocation.depth_source,
                    skip_payloads: skip.clone(),
                    ..Default::default()
                });
                info!(ticks = ?ticks, step_ms, channels = ingestion.channel_count(), "Running synthetic source");
                let writers = source.start(ingestion.take_senders());
                Ok(RunningSource {
                    synthetic: Some(source),
                    writers,
                })
            }
            InputSource::Scenario(path) => {
                let scenario = Scenario::load(path)
                    .with_context(|| format!("Failed to load scenario {}", path.display()))?;
                info!(path = %path.display(), events = scenario.len(), "Replaying scenario");
                // channels no operator reads are counted as unrouted
                ingestion.register_channels(scenario.channels());
                let writers = scenario.replay(ingestion).context("Failed to start replay")?;
                Ok(RunningSource {
                    synthetic: None,
                    writers,
                })
            }
        }
    }
}
