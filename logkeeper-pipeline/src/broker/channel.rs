use super::{Broker, BrokerError, BrokerMessage};
use crate::queue::JobOrigin;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// In-process broker backed by an unbounded tokio channel.
///
/// Reads block until a message is published, like a broker with an empty
/// topic. Once every [`BrokerPublisher`] is gone, reads stay pending
/// forever; only cancellation ends the consumption loop.
pub struct ChannelBroker {
    rx: mpsc::UnboundedReceiver<Result<BrokerMessage, BrokerError>>,
    topic: String,
    closed: bool,
}

/// Write side of a [`ChannelBroker`].
#[derive(Clone)]
pub struct BrokerPublisher {
    tx: mpsc::UnboundedSender<Result<BrokerMessage, BrokerError>>,
    topic: String,
    next_offset: Arc<AtomicI64>,
}

impl ChannelBroker {
    pub fn new(topic: impl Into<String>) -> (Self, BrokerPublisher) {
        let topic = topic.into();
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx,
                topic: topic.clone(),
                closed: false,
            },
            BrokerPublisher {
                tx,
                topic,
                next_offset: Arc::new(AtomicI64::new(0)),
            },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl BrokerPublisher {
    /// Publish a payload. Offsets count up from 0 in publish order across
    /// all clones. Returns `false` if the broker is closed or dropped.
    pub fn publish(&self, payload: impl Into<Bytes>) -> bool {
        let msg = BrokerMessage {
            payload: payload.into(),
            origin: JobOrigin {
                topic: self.topic.clone(),
                partition: 0,
                offset: self.next_offset.fetch_add(1, Ordering::SeqCst),
                key: None,
            },
        };
        self.tx.send(Ok(msg)).is_ok()
    }

    /// Make the next read fail with a transient error.
    pub fn inject_error(&self, reason: impl Into<String>) -> bool {
        self.tx
            .send(Err(BrokerError::Transient(reason.into())))
            .is_ok()
    }
}

#[async_trait]
impl Broker for ChannelBroker {
    async fn read(&mut self) -> Result<BrokerMessage, BrokerError> {
        match self.rx.recv().await {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }

    fn close(&mut self) {
        self.rx.close();
        self.closed = true;
        debug!(topic = %self.topic, "Channel broker closed");
    }

    fn name(&self) -> &str {
        "channel"
    }
}
