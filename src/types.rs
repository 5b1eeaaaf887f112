//! Core event types for the gateway
//!
//! All types use camelCase JSON serialization for wire compatibility.

use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Prometheus Alertmanager webhook
    PrometheusAlerts,
    /// Variable mutations requested by operators or agents
    #[serde(rename = "manual_variables_api")]
    ManualVariables,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::PrometheusAlerts => "prometheus_alerts",
            EventSource::ManualVariables => "manual_variables_api",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical domain event
///
/// Built once by an adapter, defaulted and validated once, then handed
/// to the publish orchestrator unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event identifier, filled by `apply_defaults` when empty
    #[serde(default)]
    pub id: String,

    /// Dot-joined `<category>.<verb>` (e.g., "DiskUsageHigh.firing")
    pub name: String,

    pub source: EventSource,

    /// Stable key from the origin (alert fingerprint, agent instance id)
    #[serde(default)]
    pub source_id: String,

    /// Tenant scope
    pub hub_name: String,

    /// When the underlying change happened, not when it was processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Serialized body, opaque to the transport
    #[serde(default)]
    pub payload: String,

    #[serde(default)]
    pub correlation_id: String,
}

impl Event {
    /// Create an event with the required fields; everything else empty
    pub fn new(
        name: impl Into<String>,
        source: EventSource,
        hub_name: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            source,
            source_id: String::new(),
            hub_name: hub_name.into(),
            timestamp: None,
            payload: String::new(),
            correlation_id: String::new(),
        }
    }

    /// Build a manual-variable mutation event named `var.<operation>`
    pub fn variable_action(
        hub_name: &str,
        variable_ref: &str,
        data_type: &str,
        operation: &str,
        data: serde_json::Value,
    ) -> Result<Self> {
        let payload = VariablesActionPayload {
            variable_ref: variable_ref.to_string(),
            data_type: data_type.to_string(),
            operation: operation.to_string(),
            data,
        };

        let mut event = Event::new(
            format!("{}.{}", EventType::Var, operation),
            EventSource::ManualVariables,
            hub_name,
        );
        event.payload = serde_json::to_string(&payload)?;
        event.apply_defaults();
        Ok(event)
    }

    /// Fill the id and timestamp when they were not supplied
    pub fn apply_defaults(&mut self) {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now());
        }
    }

    /// Reject events that cannot be routed
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(GatewayError::InvalidEvent("name is required".to_string()));
        }
        if self.hub_name.is_empty() {
            return Err(GatewayError::InvalidEvent(
                "hub name is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Event-type tag leading every subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Alert,
    Var,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Alert => "alert",
            EventType::Var => "var",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing key for a published event
///
/// Rendered as `<type>.<path>`; the transport adds its own prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject {
    pub event_type: EventType,
    pub path: String,
}

impl Subject {
    pub fn new(event_type: EventType, path: impl Into<String>) -> Self {
        Self {
            event_type,
            path: path.into(),
        }
    }

    /// `alert.<hub>.<fingerprint>` with the fingerprint made token-safe
    pub fn for_alert(hub_name: &str, fingerprint: &str) -> Self {
        Self::new(
            EventType::Alert,
            format!("{}.{}", hub_name, safe_token(fingerprint)),
        )
    }

    /// `var.<hub>.<variable>` with both parts made token-safe
    pub fn for_variable(hub_name: &str, variable: &str) -> Self {
        Self::new(
            EventType::Var,
            format!("{}.{}", safe_token(hub_name), safe_token(variable)),
        )
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.event_type, self.path)
    }
}

/// An event paired with where it should be published
#[derive(Debug, Clone, PartialEq)]
pub struct EventPerSubject {
    pub event: Event,
    pub subject: Subject,
}

impl EventPerSubject {
    pub fn new(event: Event, subject: Subject) -> Self {
        Self { event, subject }
    }
}

/// Payload of a variable mutation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesActionPayload {
    pub variable_ref: String,
    pub data_type: String,
    pub operation: String,
    pub data: serde_json::Value,
}

/// Map an arbitrary string onto a single subject token
///
/// Separators and wildcards are replaced with `_` so the value can never
/// split or widen a subject.
pub fn safe_token(raw: &str) -> String {
    if raw.is_empty() {
        return "_".to_string();
    }
    raw.chars()
        .map(|c| match c {
            '.' | '*' | '>' | '/' | '\\' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}
