//! Dispatcher - fans operator output out to sinks

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{OperatorOutput, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink};

/// What the dispatcher saw before its input closed
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub data: u64,
    pub watermarks: u64,
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl DispatchReport {
    pub fn outputs(&self) -> u64 {
        self.data + self.watermarks
    }
}

#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|source| DispatcherError::SinkCreation {
                    name: config.name.clone(),
                    source,
                })?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Reads operator output in emission order and offers each message to every
/// sink. A full sink queue drops the message for that sink only.
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<OperatorOutput>,
}

impl Dispatcher {
    /// 按配置创建全部 sink；名字重复时整体失败，不启动任何 worker
    #[instrument(name = "dispatcher_create", skip_all, fields(sink_count = configs.len()))]
    pub fn from_configs(
        configs: &[SinkConfig],
        input_rx: mpsc::Receiver<OperatorOutput>,
    ) -> Result<Self, DispatcherError> {
        let mut names = HashSet::new();
        if let Some(dup) = configs.iter().find(|c| !names.insert(c.name.as_str())) {
            return Err(DispatcherError::DuplicateSink {
                name: dup.name.clone(),
            });
        }

        let handles = configs
            .iter()
            .map(create_sink_handle)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { handles, input_rx })
    }

    /// Use pre-built sink handles
    pub fn with_handles(
        handles: Vec<SinkHandle>,
        input_rx: mpsc::Receiver<OperatorOutput>,
    ) -> Self {
        Self { handles, input_rx }
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Run until the input closes, then shut the sinks down
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> DispatchReport {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut report = DispatchReport::default();

        while let Some(output) = self.input_rx.recv().await {
            if output.message.is_watermark() {
                report.watermarks += 1;
            } else {
                report.data += 1;
            }
            self.dispatch(&output);

            if report.outputs() % 100 == 0 {
                debug!(outputs = report.outputs(), "Dispatcher progress");
            }
        }

        info!(
            data = report.data,
            watermarks = report.watermarks,
            "Dispatcher input closed, shutting down"
        );

        let metrics: Vec<_> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().clone()))
            .collect();
        for handle in self.handles {
            handle.shutdown().await;
        }
        report.sinks = metrics
            .into_iter()
            .map(|(name, m)| (name, m.snapshot()))
            .collect();

        info!("Dispatcher shutdown complete");
        report
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<DispatchReport> {
        tokio::spawn(self.run())
    }

    fn dispatch(&self, output: &OperatorOutput) {
        for handle in &self.handles {
            handle.offer(output.clone());
        }
    }
}

pub fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<OperatorOutput>,
) -> Result<Dispatcher, DispatcherError> {
    Dispatcher::from_configs(&sink_configs, input_rx)
}
