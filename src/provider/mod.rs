//! Event publisher trait: the seam between the gateway and its event bus
//!
//! All transports (NATS JetStream, in-memory) implement `EventPublisher`
//! so the publish orchestrator never depends on a concrete backend.

use crate::error::Result;
use crate::types::{Event, Subject};
use async_trait::async_trait;

pub mod memory;
pub mod nats;

/// Core trait for event bus transports
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event to the given subject
    ///
    /// Transports report exceeded deadlines as `GatewayError::Timeout` so the
    /// orchestrator can stop the batch.
    async fn publish(&self, event: &Event, subject: &Subject) -> Result<()>;

    /// Transport name (e.g., "nats", "memory")
    fn name(&self) -> &str;
}
