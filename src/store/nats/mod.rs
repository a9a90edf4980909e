//! NATS JetStream audit store
//!
//! Publishes each audit record as JSON to a JetStream stream. The message
//! id, direction and input address form the `Nats-Msg-Id`, so JetStream
//! deduplicates repeated writes of the same observation within its
//! duplicate window.

mod config;

pub use config::{NatsAuditConfig, StorageType};

use super::MessageAuditStore;
use crate::error::{AuditError, Result};
use crate::types::AuditRecord;
use async_nats::jetstream;
use async_trait::async_trait;
use std::time::Duration;

pub struct NatsAuditStore {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    config: NatsAuditConfig,
}

impl NatsAuditStore {
    /// Connect to NATS and make sure the audit stream exists
    pub async fn connect(config: NatsAuditConfig) -> Result<Self> {
        let connect_opts = build_connect_options(&config);

        let client = connect_opts
            .connect(&config.url)
            .await
            .map_err(|e| AuditError::Connection(format!("{}: {}", config.url, e)))?;

        tracing::info!(url = %config.url, "Connected to NATS");

        let jetstream = jetstream::new(client.clone());
        ensure_stream(&jetstream, &config).await?;

        Ok(Self {
            client,
            jetstream,
            config,
        })
    }

    pub fn config(&self) -> &NatsAuditConfig {
        &self.config
    }

    /// Get the underlying NATS client
    pub fn nats_client(&self) -> &async_nats::Client {
        &self.client
    }
}

#[async_trait]
impl MessageAuditStore for NatsAuditStore {
    async fn record(&self, record: AuditRecord) -> Result<()> {
        let subject = self
            .config
            .record_subject(record.metadata.direction, &record.metadata.message_type);
        let payload = bytes::Bytes::from(serde_json::to_vec(&record)?);

        let msg_id = dedup_key(&record);
        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Nats-Msg-Id", msg_id.as_str());

        let ack_fut = self
            .jetstream
            .publish_with_headers(subject.clone(), headers, payload)
            .await
            .map_err(|e| AuditError::Publish {
                subject: subject.clone(),
                reason: e.to_string(),
            })?;

        let timeout_secs = self.config.ack_timeout_secs;
        let ack = tokio::time::timeout(Duration::from_secs(timeout_secs), ack_fut)
            .await
            .map_err(|_| {
                AuditError::Timeout(format!(
                    "Audit publish ack timed out after {}s for subject '{}'",
                    timeout_secs, subject
                ))
            })?
            .map_err(|e| AuditError::Publish {
                subject: subject.clone(),
                reason: format!("ack failed: {}", e),
            })?;

        tracing::debug!(
            message_id = %record.metadata.message_id,
            subject = %subject,
            sequence = ack.sequence,
            "Audit record published"
        );

        Ok(())
    }

    fn name(&self) -> &str {
        "nats"
    }
}

/// `Nats-Msg-Id` for a record
///
/// A message consumed on several endpoints yields one record per endpoint,
/// so the input address is part of the key alongside the direction.
fn dedup_key(record: &AuditRecord) -> String {
    let metadata = &record.metadata;
    format!(
        "{}:{}:{}",
        metadata.message_id,
        metadata.direction.as_str(),
        metadata.input_address.as_deref().unwrap_or("")
    )
}

fn build_connect_options(config: &NatsAuditConfig) -> async_nats::ConnectOptions {
    let mut opts = async_nats::ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

    if let Some(ref token) = config.token {
        opts = opts.token(token.clone());
    }

    opts
}

async fn ensure_stream(js: &jetstream::Context, config: &NatsAuditConfig) -> Result<()> {
    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };

    let stream_config = jetstream::stream::Config {
        name: config.stream_name.clone(),
        subjects: config.stream_subjects(),
        storage,
        max_messages: config.max_records,
        max_bytes: config.max_bytes,
        max_age: Duration::from_secs(config.max_age_secs),
        retention: jetstream::stream::RetentionPolicy::Limits,
        ..Default::default()
    };

    js.get_or_create_stream(stream_config).await.map_err(|e| {
        AuditError::Connection(format!(
            "Failed to create/get stream '{}': {}",
            config.stream_name, e
        ))
    })?;

    tracing::info!(
        stream = %config.stream_name,
        subjects = ?config.stream_subjects(),
        "Audit stream ready"
    );

    Ok(())
}
