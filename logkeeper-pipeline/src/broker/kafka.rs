//! Kafka consumer-group reader.
//!
//! Wraps an rdkafka `StreamConsumer` subscribed to a single topic.
//! Offsets are auto-committed by librdkafka, so a message read but not yet
//! indexed when the process dies is redelivered only if its offset was not
//! committed yet; the idempotent document ID absorbs duplicates either way.

use super::{Broker, BrokerError, BrokerMessage};
use crate::queue::JobOrigin;
use async_trait::async_trait;
use bytes::Bytes;
use logkeeper_core::config::BrokerConfig;
use rdkafka::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tracing::info;

pub struct KafkaBroker {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaBroker {
    /// Create the consumer and subscribe to the configured topic.
    pub fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let brokers = config
            .brokers
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        if brokers.is_empty() {
            return Err(BrokerError::Config("no broker addresses".into()));
        }

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("fetch.min.bytes", config.min_bytes.to_string())
            .set("fetch.max.bytes", config.max_bytes.to_string())
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        info!(
            brokers = %brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl Broker for KafkaBroker {
    async fn read(&mut self) -> Result<BrokerMessage, BrokerError> {
        let msg = self.consumer.recv().await?;
        Ok(BrokerMessage {
            payload: Bytes::copy_from_slice(msg.payload().unwrap_or_default()),
            origin: JobOrigin {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
                key: msg.key().map(Bytes::copy_from_slice),
            },
        })
    }

    fn close(&mut self) {
        self.consumer.unsubscribe();
        info!(topic = %self.topic, "Kafka consumer closed");
    }

    fn name(&self) -> &str {
        "kafka"
    }
}
