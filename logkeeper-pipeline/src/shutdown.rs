//! Shutdown coordination.
//!
//! The pipeline moves through three states:
//!
//! ```text
//! Running ──shutdown()──▶ Draining ──workers joined, clients closed──▶ Stopped
//! ```
//!
//! The state lives in a `tokio::sync::watch` channel. The sender side is
//! the [`ShutdownCoordinator`]; every component that must observe
//! cancellation holds a [`ShutdownSignal`]. The signal can be polled
//! synchronously or awaited from any runtime.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Consumption loop reading, worker pool active.
    Running,
    /// No new reads; workers finish buffered jobs.
    Draining,
    /// Workers joined, broker and sink closed.
    Stopped,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Owner of the pipeline state. Cheap to clone; all clones drive the same
/// state.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    state: Arc<watch::Sender<PipelineState>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PipelineState::Running);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Request shutdown: Running → Draining.
    ///
    /// Returns `true` if this call made the transition, `false` if shutdown
    /// was already under way.
    pub fn shutdown(&self) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == PipelineState::Running {
                *state = PipelineState::Draining;
                true
            } else {
                false
            }
        });
        if changed {
            info!("Shutdown requested, draining pipeline");
        }
        changed
    }

    /// Terminal transition. Only the pipeline calls this, after joining
    /// every worker and closing its clients.
    pub(crate) fn mark_stopped(&self) {
        self.state.send_replace(PipelineState::Stopped);
        info!("Pipeline stopped");
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// A new observer of the cancellation signal.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.state.subscribe(),
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of the cancellation signal.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<PipelineState>,
}

impl ShutdownSignal {
    /// `true` once shutdown was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() != PipelineState::Running
    }

    pub fn state(&self) -> PipelineState {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested. Also resolves if every
    /// coordinator handle was dropped.
    pub async fn cancelled(&mut self) {
        let _ = self
            .rx
            .wait_for(|state| *state != PipelineState::Running)
            .await;
    }
}
