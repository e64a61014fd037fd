//! 每个 sink 独占一个有界队列和一个写入任务
//!
//! dispatcher 只做非阻塞投递：队列满时该条输出只对这个 sink 丢弃，
//! 其它 sink 和上游算子都不受影响。

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DataSink, OperatorOutput};

use crate::metrics::SinkMetrics;

pub struct SinkHandle {
    name: String,
    queue: mpsc::Sender<OperatorOutput>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let worker = SinkWorker {
            name: sink.name().to_string(),
            metrics: Arc::new(SinkMetrics::new()),
            sink,
        };
        let name = worker.name.clone();
        let metrics = Arc::clone(&worker.metrics);

        Self {
            name,
            queue,
            metrics,
            worker: tokio::spawn(worker.run(rx)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// 非阻塞投递，返回是否入队
    pub fn offer(&self, output: OperatorOutput) -> bool {
        let rejected = match self.queue.try_send(output) {
            Ok(()) => {
                let queued = self.queue.max_capacity() - self.queue.capacity();
                self.metrics.set_queue_len(queued);
                return true;
            }
            Err(rejected) => rejected,
        };

        match rejected {
            mpsc::error::TrySendError::Full(output) => {
                self.metrics.record_dropped();
                observability::record_output_dispatched(&self.name, false);
                warn!(
                    sink = %self.name,
                    operator = %output.operator,
                    timestamp = %output.message.timestamp(),
                    "sink queue full, output dropped"
                );
            }
            mpsc::error::TrySendError::Closed(_) => {
                error!(sink = %self.name, "sink worker is gone");
            }
        }
        false
    }

    /// 关闭队列，等待 worker 写完已入队的输出
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "sink worker panicked");
        }
    }
}

struct SinkWorker<S> {
    name: String,
    metrics: Arc<SinkMetrics>,
    sink: S,
}

impl<S: DataSink> SinkWorker<S> {
    #[instrument(name = "sink_worker", skip_all, fields(sink = %self.name))]
    async fn run(mut self, mut rx: mpsc::Receiver<OperatorOutput>) {
        debug!("sink worker started");

        while let Some(output) = rx.recv().await {
            self.metrics.set_queue_len(rx.len());
            self.write(&output).await;
        }

        if let Err(e) = self.sink.flush().await {
            error!(error = %e, "flush on shutdown failed");
        }
        if let Err(e) = self.sink.close().await {
            error!(error = %e, "close on shutdown failed");
        }
        debug!("sink worker stopped");
    }

    async fn write(&mut self, output: &OperatorOutput) {
        let result = self.sink.write(output).await;
        observability::record_output_dispatched(&self.name, result.is_ok());

        match result {
            Ok(()) => self.metrics.record_written(output.message.is_watermark()),
            Err(e) => {
                // 单条失败不终止 worker
                self.metrics.record_failure();
                error!(
                    operator = %output.operator,
                    timestamp = %output.message.timestamp(),
                    error = %e,
                    "sink write failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, Message, Payload, TimeToDecision};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    struct MockSink {
        name: String,
        write_count: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl MockSink {
        fn new(name: &str, write_count: Arc<AtomicU64>) -> Self {
            Self {
                name: name.to_string(),
                write_count,
                should_fail: false,
                delay_ms: 0,
            }
        }
    }

    impl DataSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _output: &OperatorOutput) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink(
                    &self.name,
                    std::io::Error::other("mock failure"),
                ));
            }
            self.write_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn output(ts: u64, watermark: bool) -> OperatorOutput {
        let message = if watermark {
            Message::watermark(ts)
        } else {
            Message::data(
                ts,
                Payload::TimeToDecision(TimeToDecision {
                    deadline_ms: 400.0,
                    flagged: false,
                }),
            )
        };
        OperatorOutput {
            operator: "time_to_decision".to_string(),
            message,
        }
    }

    #[tokio::test]
    async fn test_sink_handle_writes_everything_queued() {
        let write_count = Arc::new(AtomicU64::new(0));
        let handle = SinkHandle::spawn(MockSink::new("test", Arc::clone(&write_count)), 10);

        for ts in 0..5 {
            assert!(handle.offer(output(ts, false)));
            assert!(handle.offer(output(ts, true)));
        }
        let metrics = Arc::clone(handle.metrics());

        handle.shutdown().await;
        assert_eq!(write_count.load(Ordering::Relaxed), 10);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.data_written, 5);
        assert_eq!(snapshot.watermarks_written, 5);
    }

    #[tokio::test]
    async fn test_slow_sink_drops_when_full() {
        let sink = MockSink {
            delay_ms: 100,
            ..MockSink::new("slow", Arc::new(AtomicU64::new(0)))
        };
        let handle = SinkHandle::spawn(sink, 2);

        for ts in 0..10 {
            handle.offer(output(ts, false));
        }

        assert!(handle.metrics().dropped() > 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_write_failures_do_not_stop_worker() {
        let sink = MockSink {
            should_fail: true,
            ..MockSink::new("failing", Arc::new(AtomicU64::new(0)))
        };
        let handle = SinkHandle::spawn(sink, 10);

        for ts in 0..3 {
            handle.offer(output(ts, false));
        }
        sleep(Duration::from_millis(50)).await;

        assert_eq!(handle.metrics().failures(), 3);
        handle.shutdown().await;
    }
}
