use crate::broker::Broker;
use crate::consumer::ConsumptionLoop;
use crate::queue;
use crate::shutdown::{PipelineState, ShutdownCoordinator, ShutdownSignal};
use crate::worker::{WorkerPool, WorkerStats};
use logkeeper_core::LogkeeperConfig;
use logkeeper_observability::PipelineMetrics;
use logkeeper_store::Sink;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{Span, error, info, info_span};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid pipeline settings: {0}")]
    InvalidSettings(String),

    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Runtime knobs resolved from the configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    pub sink_timeout: Duration,
    pub read_retry_delay: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &LogkeeperConfig) -> Self {
        Self {
            workers: config.effective_workers(),
            queue_capacity: config.queue_capacity(),
            sink_timeout: Duration::from_millis(config.sink.request_timeout_ms),
            read_retry_delay: Duration::from_millis(config.broker.read_retry_delay_ms),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&LogkeeperConfig::default())
    }
}

/// A running consumer → queue → workers → sink pipeline.
pub struct Pipeline {
    coordinator: ShutdownCoordinator,
    consumer: JoinHandle<Box<dyn Broker>>,
    workers: WorkerPool,
    sink: Arc<dyn Sink>,
    span: Span,
}

impl Pipeline {
    /// Spawn the worker pool and the consumption loop. Returns once every
    /// thread is running; the pipeline is then in `Running`.
    pub fn start(
        settings: PipelineSettings,
        broker: Box<dyn Broker>,
        sink: Arc<dyn Sink>,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<Self, PipelineError> {
        if settings.workers == 0 {
            return Err(PipelineError::InvalidSettings(
                "worker count must be at least 1".into(),
            ));
        }
        if settings.sink_timeout.is_zero() {
            return Err(PipelineError::InvalidSettings(
                "sink timeout must be greater than zero".into(),
            ));
        }

        let span = info_span!("pipeline", broker = broker.name(), sink = sink.name());
        let coordinator = ShutdownCoordinator::new();

        let (workers, consumer) = span.in_scope(|| -> Result<_, PipelineError> {
            let (jobs_tx, jobs_rx) = queue::bounded(settings.queue_capacity);

            let workers = WorkerPool::spawn(
                settings.workers,
                jobs_rx,
                Arc::clone(&sink),
                settings.sink_timeout,
                Arc::clone(&metrics),
            )
            .map_err(|source| PipelineError::Spawn {
                role: "worker",
                source,
            })?;

            let consumer = ConsumptionLoop::new(
                broker,
                jobs_tx,
                coordinator.signal(),
                metrics,
                settings.read_retry_delay,
            )
            .spawn()
            .map_err(|source| PipelineError::Spawn {
                role: "consumer",
                source,
            })?;

            info!(
                workers = settings.workers,
                queue_capacity = settings.queue_capacity,
                sink_timeout_ms = settings.sink_timeout.as_millis() as u64,
                "Pipeline running"
            );
            Ok((workers, consumer))
        })?;

        Ok(Self {
            coordinator,
            consumer,
            workers,
            sink,
            span,
        })
    }

    /// Handle that can request shutdown from another thread.
    pub fn coordinator(&self) -> ShutdownCoordinator {
        self.coordinator.clone()
    }

    /// Request shutdown. See [`ShutdownCoordinator::shutdown`].
    pub fn shutdown(&self) -> bool {
        self.coordinator.shutdown()
    }

    pub fn state(&self) -> PipelineState {
        self.coordinator.state()
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.coordinator.signal()
    }

    /// Block until the pipeline is stopped.
    ///
    /// Returns only after shutdown was requested: the consumption loop has
    /// closed the queue, every worker drained it and exited, and the broker
    /// and sink are closed.
    pub fn wait(self) -> WorkerStats {
        let Pipeline {
            coordinator,
            consumer,
            workers,
            sink,
            span,
        } = self;
        let _enter = span.enter();

        let broker = match consumer.join() {
            Ok(broker) => Some(broker),
            Err(_) => {
                error!("Consumption loop panicked");
                None
            }
        };

        let stats = workers.join();

        if let Some(mut broker) = broker {
            broker.close();
        }
        sink.close();
        coordinator.mark_stopped();

        info!(
            processed = stats.processed,
            indexed = stats.indexed,
            decode_failures = stats.decode_failures,
            sink_failures = stats.sink_failures,
            "Pipeline drained"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::ChannelBroker;
    use logkeeper_store::MemorySink;

    #[test]
    fn settings_follow_config() {
        let mut config = LogkeeperConfig::default();
        config.pipeline.workers = 3;
        config.pipeline.burst_factor = 4;
        config.sink.request_timeout_ms = 250;
        config.broker.read_retry_delay_ms = 0;

        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.queue_capacity, 12);
        assert_eq!(settings.sink_timeout, Duration::from_millis(250));
        assert!(settings.read_retry_delay.is_zero());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let (broker, _publisher) = ChannelBroker::new("logs");
        let settings = PipelineSettings {
            workers: 0,
            ..PipelineSettings::default()
        };
        let err = Pipeline::start(
            settings,
            Box::new(broker),
            Arc::new(MemorySink::new()),
            Arc::new(PipelineMetrics::disabled()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, PipelineError::InvalidSettings(_)));
    }
}
