use crate::queue::{Job, JobReceiver};
use logkeeper_core::codec;
use logkeeper_core::entry::shorten;
use logkeeper_observability::PipelineMetrics;
use logkeeper_store::Sink;
use std::io;
use std::ops::AddAssign;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, error, info, info_span};

/// What happened to a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Indexed,
    DecodeFailed,
    SinkFailed,
}

/// Per-worker counters, summed over the pool on join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub indexed: u64,
    pub decode_failures: u64,
    pub sink_failures: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: JobOutcome) {
        self.processed += 1;
        match outcome {
            JobOutcome::Indexed => self.indexed += 1,
            JobOutcome::DecodeFailed => self.decode_failures += 1,
            JobOutcome::SinkFailed => self.sink_failures += 1,
        }
    }
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.indexed += other.indexed;
        self.decode_failures += other.decode_failures;
        self.sink_failures += other.sink_failures;
    }
}

/// Decode one job and upsert it into the sink.
///
/// Never fails: decode errors, sink errors and timeouts are logged,
/// counted, and the job is dropped.
pub async fn process_job(
    job: &Job,
    sink: &dyn Sink,
    sink_timeout: Duration,
    metrics: &PipelineMetrics,
) -> JobOutcome {
    let entry = match codec::decode(&job.payload) {
        Ok(entry) => entry,
        Err(e) => {
            metrics.record_decode_failure();
            error!(origin = %job.origin, error = %e, "Failed to decode log entry, dropping");
            return JobOutcome::DecodeFailed;
        }
    };

    let doc_id = entry.doc_id();
    let started = Instant::now();
    let result = tokio::time::timeout(sink_timeout, sink.upsert(&doc_id, job.payload.clone())).await;
    let elapsed = started.elapsed().as_secs_f64();

    match result {
        Ok(Ok(())) => {
            metrics.record_indexed(&entry.service, entry.status_code, elapsed);
            info!(
                service = %entry.service,
                request_id = %shorten(&entry.request_id),
                "Log entry indexed"
            );
            JobOutcome::Indexed
        }
        Ok(Err(e)) => {
            metrics.record_sink_failure(elapsed);
            error!(
                service = %entry.service,
                request_id = %shorten(&entry.request_id),
                error = %e,
                "Failed to index log entry"
            );
            JobOutcome::SinkFailed
        }
        Err(_) => {
            metrics.record_sink_failure(elapsed);
            error!(
                service = %entry.service,
                request_id = %shorten(&entry.request_id),
                timeout_ms = sink_timeout.as_millis() as u64,
                "Sink call timed out"
            );
            JobOutcome::SinkFailed
        }
    }
}

struct Worker {
    id: usize,
    jobs: JobReceiver,
    sink: Arc<dyn Sink>,
    sink_timeout: Duration,
    metrics: Arc<PipelineMetrics>,
}

impl Worker {
    fn run(self, io: &Handle) -> WorkerStats {
        debug!("Worker started");
        let mut stats = WorkerStats::default();

        while let Some(job) = self.jobs.pop() {
            self.metrics.set_queue_depth(self.jobs.len());
            let outcome = io.block_on(process_job(
                &job,
                self.sink.as_ref(),
                self.sink_timeout,
                &self.metrics,
            ));
            stats.record(outcome);
        }

        info!(worker = self.id, processed = stats.processed, "Job queue closed, worker exiting");
        stats
    }
}

/// Upper bound on I/O driver threads shared by the pool.
const MAX_IO_THREADS: usize = 4;

/// Fixed set of worker threads draining one job queue.
///
/// Workers block on a single shared multi-thread runtime. Sink clients pool
/// connections across workers, and a pooled connection's driver task must
/// keep running while the worker that opened it is idle in `pop()`.
pub struct WorkerPool {
    handles: Vec<(usize, JoinHandle<WorkerStats>)>,
    io: Runtime,
}

impl WorkerPool {
    /// Spawn `count` workers named `logkeeper-worker-{id}` on top of one
    /// `logkeeper-io` runtime.
    pub fn spawn(
        count: usize,
        jobs: JobReceiver,
        sink: Arc<dyn Sink>,
        sink_timeout: Duration,
        metrics: Arc<PipelineMetrics>,
    ) -> io::Result<Self> {
        let io = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(count.clamp(1, MAX_IO_THREADS))
            .thread_name("logkeeper-io")
            .enable_all()
            .build()?;
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let handle = io.handle().clone();
            let worker = Worker {
                id,
                jobs: jobs.clone(),
                sink: Arc::clone(&sink),
                sink_timeout,
                metrics: Arc::clone(&metrics),
            };
            let span = info_span!("worker", id);

            let thread = std::thread::Builder::new()
                .name(format!("logkeeper-worker-{}", id))
                .spawn(move || span.in_scope(|| worker.run(&handle)))?;
            handles.push((id, thread));
        }

        info!(workers = count, sink = sink.name(), "Workers spawned");
        Ok(Self { handles, io })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit. Workers exit once the queue is
    /// closed and drained.
    pub fn join(self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for (id, handle) in self.handles {
            match handle.join() {
                Ok(stats) => total += stats,
                Err(_) => error!(worker = id, "Worker thread panicked"),
            }
        }
        // Only idle pooled connections remain on the I/O runtime.
        self.io.shutdown_background();
        total
    }
}
