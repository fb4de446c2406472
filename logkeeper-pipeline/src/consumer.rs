use crate::broker::Broker;
use crate::queue::{Job, JobSender, QueueClosed};
use crate::shutdown::ShutdownSignal;
use logkeeper_observability::PipelineMetrics;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, info_span, warn};

/// Pulls messages off the broker one at a time and feeds the job queue.
///
/// Runs on a dedicated OS thread with its own current-thread runtime for
/// the async broker client. The loop stops when shutdown is requested,
/// closes the queue, and hands the broker back to whoever joins it.
pub struct ConsumptionLoop {
    broker: Box<dyn Broker>,
    queue: JobSender,
    signal: ShutdownSignal,
    metrics: Arc<PipelineMetrics>,
    retry_delay: Duration,
}

impl ConsumptionLoop {
    pub fn new(
        broker: Box<dyn Broker>,
        queue: JobSender,
        signal: ShutdownSignal,
        metrics: Arc<PipelineMetrics>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            broker,
            queue,
            signal,
            metrics,
            retry_delay,
        }
    }

    /// Start the loop on the `logkeeper-consumer` thread.
    pub fn spawn(self) -> io::Result<JoinHandle<Box<dyn Broker>>> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let span = info_span!("consumer", broker = self.broker.name());

        std::thread::Builder::new()
            .name("logkeeper-consumer".to_string())
            .spawn(move || span.in_scope(|| self.run(&rt)))
    }

    /// Drive the loop on the calling thread until cancelled.
    pub fn run(self, rt: &Runtime) -> Box<dyn Broker> {
        let ConsumptionLoop {
            mut broker,
            mut queue,
            mut signal,
            metrics,
            retry_delay,
        } = self;

        info!(queue_capacity = queue.capacity(), "Consumption loop started");
        let mut consumed: u64 = 0;

        loop {
            if signal.is_cancelled() {
                break;
            }

            let read = rt.block_on(async {
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => None,
                    res = broker.read() => Some(res),
                }
            });

            match read {
                None => break,
                Some(Ok(msg)) => {
                    metrics.record_consumed();
                    let job = Job::from(msg);
                    debug!(origin = %job.origin, bytes = job.payload.len(), "Message read");

                    // Blocks while the queue is full.
                    if let Err(QueueClosed(job)) = queue.push(job) {
                        warn!(origin = %job.origin, "Job queue closed, message left for redelivery");
                        break;
                    }
                    consumed += 1;
                    metrics.set_queue_depth(queue.len());
                }
                Some(Err(e)) => {
                    error!(error = %e, "Broker read failed");
                    metrics.record_read_error();

                    if !retry_delay.is_zero() {
                        let cancelled = rt.block_on(async {
                            tokio::select! {
                                _ = signal.cancelled() => true,
                                _ = tokio::time::sleep(retry_delay) => false,
                            }
                        });
                        if cancelled {
                            break;
                        }
                    }
                }
            }
        }

        queue.close();
        info!(consumed, "Consumption loop stopped, job queue closed");
        broker
    }
}
