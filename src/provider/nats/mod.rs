//! NATS JetStream event publisher
//!
//! Implements `EventPublisher` on top of a JetStream stream so every
//! published event is persisted and acknowledged.

mod client;
mod config;

pub use client::{NatsClient, StreamInfo};
pub use config::{NatsConfig, StorageType};

use crate::error::Result;
use crate::provider::EventPublisher;
use crate::types::{Event, Subject};
use async_trait::async_trait;

/// NATS JetStream publisher
pub struct NatsPublisher {
    client: NatsClient,
}

impl NatsPublisher {
    /// Connect to NATS and initialize the stream
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        let client = NatsClient::connect(config).await?;
        Ok(Self { client })
    }

    /// Get the underlying client for stream inspection
    pub fn client(&self) -> &NatsClient {
        &self.client
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &Event, subject: &Subject) -> Result<()> {
        self.client.publish(event, subject).await.map(|_| ())
    }

    fn name(&self) -> &str {
        "nats"
    }
}
