//! # a3s-gateway
//!
//! Signal ingestion for the A3S ecosystem: Alertmanager webhooks and agent
//! control-channel reports become canonical, audited events on the bus.
//!
//! ## Overview
//!
//! `a3s-gateway` deduplicates repeated or out-of-order alert notifications,
//! adapts them into events, and publishes them through a pluggable
//! transport while writing one audit record per publish attempt. A control
//! server tracks connected agents and emits a `replay-complete` event when
//! an agent's ingest logs report a terminal status.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_gateway::{
//!     ingest_alerts, AlertAdapter, AlertNotification, Deduper, MemoryAuditSink,
//!     MemoryPublisher, PublishContext, PublishOrchestrator,
//! };
//!
//! # async fn example() -> a3s_gateway::Result<()> {
//! let orchestrator = PublishOrchestrator::new(
//!     Arc::new(MemoryPublisher::new()),
//!     Arc::new(MemoryAuditSink::default()),
//! );
//! let adapter = AlertAdapter::new(Arc::new(Deduper::new()));
//!
//! let notification: AlertNotification = serde_json::from_str(r#"{
//!     "receiver": "gateway",
//!     "status": "firing",
//!     "alerts": [{
//!         "status": "firing",
//!         "annotations": {"alert_name": "DiskUsageHigh", "hub_name": "prod"},
//!         "startsAt": "2024-05-01T10:00:00Z",
//!         "fingerprint": "abc123"
//!     }]
//! }"#)?;
//!
//! let summary = ingest_alerts(&adapter, &orchestrator, &notification, &PublishContext::new()).await?;
//! println!("{} of {} published", summary.successful, summary.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Providers
//!
//! - **memory**: In-memory publisher for testing and single-process use
//! - **nats**: NATS JetStream for persistent, acknowledged delivery
//!
//! ## Architecture
//!
//! - **Deduper**: per-fingerprint staleness filter shared across requests
//! - **AlertAdapter**: Alertmanager alerts to (event, subject) pairs
//! - **PublishOrchestrator**: publish, audit, aggregate per batch
//! - **ControlServer**: agent registry and replay completion events

pub mod alert;
pub mod audit;
pub mod control;
pub mod dedup;
pub mod error;
pub mod provider;
pub mod publish;
pub mod types;
pub mod variables;

// Re-export core types
pub use alert::{
    ingest_alerts, AdaptedAlerts, Alert, AlertAdapter, AlertNotification, IngestSummary,
    WebhookMessage,
};
pub use audit::{AuditRecord, AuditSink, MemoryAuditSink};
pub use control::{AgentDescriptor, AgentRegistry, CompletionStatus, ControlServer};
pub use dedup::{DedupOutcome, Deduper};
pub use error::{GatewayError, Result};
pub use provider::EventPublisher;
pub use publish::{PublishContext, PublishOrchestrator, PublishReport};
pub use types::{Event, EventPerSubject, EventSource, EventType, Subject, VariablesActionPayload};
pub use variables::{
    lookup_variable_type, publish_variable_action, HubVariables, VariableLookupError,
};

// Re-export providers for convenience
pub use provider::memory::MemoryPublisher;
pub use provider::nats::{NatsClient, NatsConfig, NatsPublisher, StorageType};
