//! Bounded job queue between the consumption loop and the worker pool.
//!
//! A thin wrapper over a bounded crossbeam channel. The producer side is a
//! single, non-clonable [`JobSender`]; the consumer side is a clonable
//! [`JobReceiver`], one per worker. Closing the sender (explicitly or by
//! dropping it) lets receivers drain every buffered job before they see
//! the closed signal.

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Where a job's payload came from, kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOrigin {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Bytes>,
}

impl fmt::Display for JobOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// One raw, not yet decoded message.
#[derive(Debug, Clone)]
pub struct Job {
    pub payload: Bytes,
    pub origin: JobOrigin,
}

impl Job {
    pub fn new(payload: impl Into<Bytes>, origin: JobOrigin) -> Self {
        Self {
            payload: payload.into(),
            origin,
        }
    }
}

/// A push was attempted after the queue was closed. Carries the job back.
#[derive(Error, Debug)]
#[error("job queue is closed, job from {} not accepted", .0.origin)]
pub struct QueueClosed(pub Job);

/// Create a queue holding at most `capacity` jobs.
///
/// `capacity` is clamped to at least 1 so a push can always make progress
/// once a worker frees a slot.
pub fn bounded(capacity: usize) -> (JobSender, JobReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (
        JobSender {
            tx: Some(tx),
            capacity,
        },
        JobReceiver { rx },
    )
}

/// Producer handle. Owned by exactly one consumption loop.
pub struct JobSender {
    tx: Option<Sender<Job>>,
    capacity: usize,
}

impl JobSender {
    /// Enqueue a job, blocking while the queue is full.
    pub fn push(&self, job: Job) -> Result<(), QueueClosed> {
        match &self.tx {
            Some(tx) => tx.send(job).map_err(|e| QueueClosed(e.into_inner())),
            None => Err(QueueClosed(job)),
        }
    }

    /// Stop accepting jobs. Buffered jobs stay available to receivers.
    /// Calling this more than once is a no-op.
    pub fn close(&mut self) {
        if self.tx.take().is_some() {
            debug!("Job queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Jobs currently buffered.
    pub fn len(&self) -> usize {
        self.tx.as_ref().map_or(0, |tx| tx.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Consumer handle. Clone one per worker.
#[derive(Clone)]
pub struct JobReceiver {
    rx: Receiver<Job>,
}

impl JobReceiver {
    /// Block until a job is available. `None` once the queue is closed and
    /// every buffered job has been handed out.
    pub fn pop(&self) -> Option<Job> {
        self.rx.recv().ok()
    }

    /// Jobs currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
