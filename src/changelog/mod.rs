//! Best-effort change events, published after a mutation has committed.
//!
//! One attempt per mutation, bounded by a deadline. Nothing is retried or
//! queued: an event that fails here is gone.

#[cfg(feature = "kafka")]
pub mod kafka;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ChangelogConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Post,
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub record_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub event_timestamp: OffsetDateTime,
    pub change_type: ChangeType,
}

impl ChangelogEntry {
    pub fn new(record_id: Uuid, event_timestamp: OffsetDateTime, change_type: ChangeType) -> Self {
        Self {
            record_id,
            event_timestamp,
            change_type,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("encode changelog entry: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("changelog publish timed out after {0:?}")]
    Timeout(Duration),
    #[error("changelog transport: {0:#}")]
    Transport(#[from] anyhow::Error),
}

/// Message transport the emitter writes to. Implementations must be safe for
/// concurrent use; the emitter adds no locking of its own.
#[async_trait]
pub trait ChangelogTransport: Send + Sync {
    async fn send(&self, key: &str, payload: &[u8]) -> anyhow::Result<()>;
}

/// Writes events to the log only. Used when no broker is configured.
pub struct LogTransport {
    topic: String,
}

impl LogTransport {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl ChangelogTransport for LogTransport {
    async fn send(&self, key: &str, payload: &[u8]) -> anyhow::Result<()> {
        info!(
            topic = %self.topic,
            key,
            payload = %String::from_utf8_lossy(payload),
            "changelog event"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct ChangelogEmitter {
    transport: Arc<dyn ChangelogTransport>,
    timeout: Duration,
}

impl ChangelogEmitter {
    pub fn new(transport: Arc<dyn ChangelogTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Pick the transport from config: Kafka when brokers are set and the
    /// `kafka` feature is compiled in, the log otherwise.
    pub fn from_config(config: &ChangelogConfig) -> anyhow::Result<Self> {
        let transport: Arc<dyn ChangelogTransport> = match config.kafka_brokers.as_deref() {
            #[cfg(feature = "kafka")]
            Some(brokers) => Arc::new(kafka::KafkaTransport::new(
                brokers,
                &config.topic,
                config.timeout(),
            )?),
            #[cfg(not(feature = "kafka"))]
            Some(_) => {
                tracing::warn!(
                    "KAFKA_BROKERS set but built without the kafka feature; logging changelog events"
                );
                Arc::new(LogTransport::new(config.topic.clone()))
            }
            None => Arc::new(LogTransport::new(config.topic.clone())),
        };
        Ok(Self::new(transport, config.timeout()))
    }

    /// Serialize and send one entry, keyed by record id, within the deadline.
    pub async fn publish(&self, entry: &ChangelogEntry) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(entry)?;
        let key = entry.record_id.to_string();
        tokio::time::timeout(self.timeout, self.transport.send(&key, &payload))
            .await
            .map_err(|_| PublishError::Timeout(self.timeout))??;
        Ok(())
    }

    /// Publish on a separate task and wait for it. The task outlives a dropped
    /// caller, so client disconnects do not cut the attempt short. Failures
    /// are logged and swallowed.
    pub async fn publish_detached(&self, entry: ChangelogEntry) {
        let emitter = self.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = emitter.publish(&entry).await {
                error!(error = %e, ?entry, "publishing changelog event");
            }
        });
        if let Err(e) = task.await {
            error!(error = %e, "changelog task aborted");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Records everything it is asked to send.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl RecordingTransport {
        pub async fn entries(&self) -> Vec<ChangelogEntry> {
            self.sent
                .lock()
                .await
                .iter()
                .map(|(_, payload)| serde_json::from_slice(payload).expect("entry json"))
                .collect()
        }
    }

    #[async_trait]
    impl ChangelogTransport for RecordingTransport {
        async fn send(&self, key: &str, payload: &[u8]) -> anyhow::Result<()> {
            self.sent.lock().await.push((key.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    pub struct FailingTransport;

    #[async_trait]
    impl ChangelogTransport for FailingTransport {
        async fn send(&self, _key: &str, _payload: &[u8]) -> anyhow::Result<()> {
            anyhow::bail!("broker unreachable")
        }
    }

    pub struct StalledTransport;

    #[async_trait]
    impl ChangelogTransport for StalledTransport {
        async fn send(&self, _key: &str, _payload: &[u8]) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }
}
