use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use tracing::debug;

use super::ChangelogTransport;

/// Single long-lived producer shared by every request.
pub struct KafkaTransport {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaTransport {
    pub fn new(brokers: &str, topic: &str, timeout: Duration) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .create()
            .context("create kafka producer")?;
        debug!(%brokers, %topic, "kafka producer created");
        Ok(Self {
            producer,
            topic: topic.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl ChangelogTransport for KafkaTransport {
    async fn send(&self, key: &str, payload: &[u8]) -> anyhow::Result<()> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);
        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map_err(|(e, _)| {
                debug!(error = %e, "failed to write message");
                anyhow::Error::new(e).context("kafka send")
            })?;
        debug!(partition, offset, key, "changelog event written");
        Ok(())
    }
}
