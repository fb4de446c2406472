//! Broker clients feeding the consumption loop.
//!
//! - [`ChannelBroker`] - in-process broker fed through a [`BrokerPublisher`]
//! - [`KafkaBroker`] - consumer-group reader over rdkafka (`kafka` feature)

mod channel;
#[cfg(feature = "kafka")]
mod kafka;

pub use channel::{BrokerPublisher, ChannelBroker};
#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;

use crate::queue::{Job, JobOrigin};
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// One message as delivered by the broker.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub payload: Bytes,
    pub origin: JobOrigin,
}

impl From<BrokerMessage> for Job {
    fn from(msg: BrokerMessage) -> Self {
        Job::new(msg.payload, msg.origin)
    }
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("broker not configured: {0}")]
    Config(String),

    #[error("transient read error: {0}")]
    Transient(String),
}

/// Source of raw messages. Owned by a single consumption loop.
#[async_trait]
pub trait Broker: Send {
    /// Wait for the next message.
    ///
    /// Errors are treated as transient by the caller: it logs them and
    /// reads again. Cancellation is handled by the caller dropping this
    /// future, so implementations must be cancel-safe.
    async fn read(&mut self) -> Result<BrokerMessage, BrokerError>;

    /// Release the connection. Called once, after every worker exited.
    fn close(&mut self) {}

    /// Short name used in log lines.
    fn name(&self) -> &str;
}
