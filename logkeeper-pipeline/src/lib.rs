//! Logkeeper ingestion pipeline.
//!
//! ```text
//! Broker ──read──▶ ConsumptionLoop ──push──▶ job queue ──pop──▶ WorkerPool ──upsert──▶ Sink
//!                        ▲                                          │
//!                        └──────────── ShutdownCoordinator ─────────┘
//! ```
//!
//! One consumption thread, N worker threads. They share nothing but the
//! bounded job queue and the shutdown signal.

pub mod broker;
pub mod consumer;
pub mod pipeline;
pub mod queue;
pub mod shutdown;
pub mod worker;

pub use broker::{Broker, BrokerError, BrokerMessage, BrokerPublisher, ChannelBroker};
#[cfg(feature = "kafka")]
pub use broker::KafkaBroker;
pub use pipeline::{Pipeline, PipelineError, PipelineSettings};
pub use queue::{Job, JobOrigin};
pub use shutdown::{PipelineState, ShutdownCoordinator, ShutdownSignal};
pub use worker::{JobOutcome, WorkerPool, WorkerStats};
