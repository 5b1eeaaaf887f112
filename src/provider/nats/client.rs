//! NATS JetStream client: connect, ensure the stream, publish

use super::config::{NatsConfig, StorageType};
use crate::error::{GatewayError, Result};
use crate::types::{Event, Subject};
use async_nats::jetstream;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// NATS JetStream client
///
/// Owns the connection and the stream every gateway event lands in.
pub struct NatsClient {
    client: async_nats::Client,

    jetstream: jetstream::Context,

    /// Stream handle (Mutex for methods requiring &mut self)
    stream: Mutex<jetstream::stream::Stream>,

    config: Arc<NatsConfig>,
}

impl NatsClient {
    /// Connect to NATS and make sure the stream exists
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        config.validate()?;
        let connect_opts = build_connect_options(&config);

        let client = connect_opts
            .connect(&config.url)
            .await
            .map_err(|e| GatewayError::Connection(format!("{}: {}", config.url, e)))?;

        tracing::info!(url = %config.url, client = %config.client_name, "Connected to NATS");

        let jetstream = jetstream::new(client.clone());
        let stream = ensure_stream(&jetstream, &config).await?;

        Ok(Self {
            client,
            jetstream,
            stream: Mutex::new(stream),
            config: Arc::new(config),
        })
    }

    /// Publish an event and wait for the stream acknowledgement
    ///
    /// The event id doubles as `Nats-Msg-Id`, so JetStream drops
    /// retransmits inside its duplicate window. Returns the stream sequence.
    pub async fn publish(&self, event: &Event, subject: &Subject) -> Result<u64> {
        let subject = self.config.build_subject(subject);
        let payload = Bytes::from(serde_json::to_vec(event)?);

        let mut headers = async_nats::HeaderMap::new();
        if !event.id.is_empty() {
            headers.insert("Nats-Msg-Id", event.id.as_str());
        }

        let ack_fut = self
            .jetstream
            .publish_with_headers(subject.clone(), headers, payload)
            .await
            .map_err(|e| GatewayError::Publish {
                subject: subject.clone(),
                reason: e.to_string(),
            })?;

        let timeout_secs = self.config.publish_timeout_secs;
        let ack = tokio::time::timeout(Duration::from_secs(timeout_secs), ack_fut)
            .await
            .map_err(|_| {
                GatewayError::Timeout(format!(
                    "Publish ack timed out after {}s for subject '{}'",
                    timeout_secs, subject
                ))
            })?
            .map_err(|e| GatewayError::Publish {
                subject: subject.clone(),
                reason: format!("ack failed: {}", e),
            })?;

        tracing::debug!(
            event_id = %event.id,
            subject = %subject,
            sequence = ack.sequence,
            duplicate = ack.duplicate,
            "Event published"
        );

        Ok(ack.sequence)
    }

    /// Get stream info
    pub async fn stream_info(&self) -> Result<StreamInfo> {
        let mut stream = self.stream.lock().await;
        let info = stream
            .info()
            .await
            .map_err(|e| GatewayError::Stream(format!("Failed to get stream info: {}", e)))?;

        Ok(StreamInfo {
            messages: info.state.messages,
            bytes: info.state.bytes,
            first_sequence: info.state.first_sequence,
            last_sequence: info.state.last_sequence,
        })
    }

    /// Flush pending writes and close the connection
    pub async fn close(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .map_err(|e| GatewayError::Connection(format!("flush failed: {}", e)))?;
        tracing::info!(url = %self.config.url, "NATS connection flushed");
        Ok(())
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }
}

/// Summary of stream state
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub messages: u64,
    pub bytes: u64,
    pub first_sequence: u64,
    pub last_sequence: u64,
}

fn build_connect_options(config: &NatsConfig) -> async_nats::ConnectOptions {
    let mut opts = async_nats::ConnectOptions::new()
        .name(config.client_name.as_str())
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

    if let Some(ref token) = config.token {
        opts = opts.token(token.clone());
    }

    opts
}

/// Ensure the JetStream stream exists with the configured limits
async fn ensure_stream(
    js: &jetstream::Context,
    config: &NatsConfig,
) -> Result<jetstream::stream::Stream> {
    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };

    let stream_config = jetstream::stream::Config {
        name: config.stream_name.clone(),
        subjects: config.stream_subjects(),
        storage,
        max_messages: if config.max_events > 0 { config.max_events } else { -1 },
        max_age: Duration::from_secs(config.max_age_secs),
        max_bytes: if config.max_bytes > 0 { config.max_bytes } else { -1 },
        retention: jetstream::stream::RetentionPolicy::Limits,
        ..Default::default()
    };

    let stream = js
        .get_or_create_stream(stream_config)
        .await
        .map_err(|e| {
            GatewayError::Stream(format!(
                "Failed to create/get stream '{}': {}",
                config.stream_name, e
            ))
        })?;

    tracing::info!(
        stream = %config.stream_name,
        subjects = ?config.stream_subjects(),
        "JetStream stream ready"
    );

    Ok(stream)
}
