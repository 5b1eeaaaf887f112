//! Alertmanager webhook adapter
//!
//! Converts a batch of Alertmanager notifications into canonical events,
//! consulting the shared [`Deduper`] so repeated or out-of-order
//! notifications for the same alert series are dropped silently.

use crate::dedup::Deduper;
use crate::error::{GatewayError, Result};
use crate::publish::{PublishContext, PublishOrchestrator};
use crate::types::{Event, EventPerSubject, EventSource, Subject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Annotation carrying the alert's display name
pub const ALERT_NAME_ANNOTATION: &str = "alert_name";
/// Annotation carrying the tenant the alert belongs to
pub const HUB_NAME_ANNOTATION: &str = "hub_name";
/// Optional annotation with the value that tripped the alert
pub const CURRENT_VALUE_ANNOTATION: &str = "current_value";

/// Label or annotation set
pub type KeyValues = BTreeMap<String, String>;

/// A single Alertmanager alert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// "firing" or "resolved", compared case-insensitively
    pub status: String,

    #[serde(default)]
    pub labels: KeyValues,

    #[serde(default)]
    pub annotations: KeyValues,

    #[serde(default)]
    pub starts_at: DateTime<Utc>,

    #[serde(default)]
    pub ends_at: DateTime<Utc>,

    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,

    /// Stable identifier of the alert series
    #[serde(default)]
    pub fingerprint: String,
}

impl Alert {
    fn annotation(&self, key: &str) -> &str {
        self.annotations.get(key).map(String::as_str).unwrap_or_default()
    }

    /// Alert name annotation, empty when absent
    pub fn name(&self) -> &str {
        self.annotation(ALERT_NAME_ANNOTATION)
    }

    pub fn is_resolved(&self) -> bool {
        self.status.eq_ignore_ascii_case("resolved")
    }

    /// When the alert's state actually changed
    ///
    /// End time once resolved, start time while firing.
    pub fn change_time(&self) -> DateTime<Utc> {
        if self.is_resolved() {
            self.ends_at
        } else {
            self.starts_at
        }
    }
}

/// Alertmanager template data: one notification carrying a group of alerts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertNotification {
    #[serde(default)]
    pub receiver: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub alerts: Vec<Alert>,

    #[serde(default)]
    pub group_labels: KeyValues,

    #[serde(default)]
    pub common_labels: KeyValues,

    #[serde(default)]
    pub common_annotations: KeyValues,

    #[serde(default, rename = "externalURL")]
    pub external_url: String,
}

/// Full webhook body posted by Alertmanager
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    #[serde(flatten)]
    pub data: AlertNotification,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub group_key: String,

    #[serde(default)]
    pub truncated_alerts: u64,
}

/// Body stored in each alert event's payload
#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    labels: &'a KeyValues,
    #[serde(skip_serializing_if = "no_entries")]
    annotations: &'a KeyValues,
    status: &'a str,
    #[serde(skip_serializing_if = "no_text")]
    value: &'a str,
}

fn no_entries(values: &&KeyValues) -> bool {
    values.is_empty()
}

fn no_text(value: &&str) -> bool {
    value.is_empty()
}

/// Output of adapting one batch
#[derive(Debug, Clone, Default)]
pub struct AdaptedAlerts {
    /// Events in input order
    pub events: Vec<EventPerSubject>,

    /// Alerts dropped as stale duplicates
    pub skipped: usize,
}

/// Converts Alertmanager alerts into events
///
/// The `Deduper` is shared by every request so that duplicates are caught
/// across deliveries, not only within one batch.
#[derive(Debug, Clone)]
pub struct AlertAdapter {
    deduper: Arc<Deduper>,
}

impl AlertAdapter {
    pub fn new(deduper: Arc<Deduper>) -> Self {
        Self { deduper }
    }

    /// Adapt a batch, dropping alerts that are not newer than what was seen
    ///
    /// Any alert without a fingerprint rejects the whole batch before the
    /// dedup filter is touched.
    pub fn adapt(&self, notification: &AlertNotification) -> Result<AdaptedAlerts> {
        if let Some(alert) = notification
            .alerts
            .iter()
            .find(|alert| alert.fingerprint.is_empty())
        {
            return Err(GatewayError::MissingFingerprint {
                alert_name: alert.name().to_string(),
                status: alert.status.clone(),
            });
        }

        let mut adapted = AdaptedAlerts {
            events: Vec::with_capacity(notification.alerts.len()),
            skipped: 0,
        };

        for alert in &notification.alerts {
            let change_time = alert.change_time();
            let outcome = self.deduper.update_if_newer(&alert.fingerprint, change_time);
            if !outcome.accepted {
                adapted.skipped += 1;
                tracing::info!(
                    alert_name = %alert.name(),
                    last_update = ?outcome.previous,
                    this_change = %change_time,
                    "Skipping stale alert"
                );
                continue;
            }

            let event = to_event(alert, change_time)?;
            let subject = Subject::for_alert(&event.hub_name, &alert.fingerprint);
            tracing::debug!(
                alert_name = %alert.name(),
                subject = %subject,
                "Subject for alert"
            );

            adapted.events.push(EventPerSubject::new(event, subject));
        }

        Ok(adapted)
    }
}

fn to_event(alert: &Alert, change_time: DateTime<Utc>) -> Result<Event> {
    let payload = AlertPayload {
        labels: &alert.labels,
        annotations: &alert.annotations,
        status: &alert.status,
        value: alert.annotation(CURRENT_VALUE_ANNOTATION),
    };
    let payload = serde_json::to_string(&payload)?;

    let correlation_core = if alert.fingerprint.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        alert.fingerprint.clone()
    };

    let mut event = Event::new(
        format!("{}.{}", alert.name(), alert.status),
        EventSource::PrometheusAlerts,
        alert.annotation(HUB_NAME_ANNOTATION),
    )
    .with_source_id(alert.fingerprint.clone())
    .with_timestamp(change_time)
    .with_payload(payload);
    event.correlation_id = format!("{}-{}", Utc::now().timestamp_millis(), correlation_core);
    event.apply_defaults();

    if let Err(e) = event.validate() {
        tracing::error!(
            error = %e,
            event_name = %event.name,
            source_id = %event.source_id,
            "Failed to validate event"
        );
        return Err(e);
    }

    Ok(event)
}

/// Response body for a fully processed webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub message: String,
    pub total: usize,
    pub successful: usize,
    pub skipped: usize,
}

/// Adapt a notification and publish the resulting events
///
/// Adapter failures abort before anything is published. When some
/// publishes fail the error reports how many of the adapted events made it.
pub async fn ingest_alerts(
    adapter: &AlertAdapter,
    orchestrator: &PublishOrchestrator,
    notification: &AlertNotification,
    ctx: &PublishContext,
) -> Result<IngestSummary> {
    tracing::debug!(
        receiver = %notification.receiver,
        status = %notification.status,
        alert_count = notification.alerts.len(),
        "Processing Prometheus alerts"
    );

    let adapted = adapter.adapt(notification).map_err(|e| {
        tracing::error!(error = %e, "Failed to adapt Prometheus alerts");
        e
    })?;

    let report = orchestrator.publish_events(&adapted.events, ctx).await;
    let successful = report.success_count;
    if let Some(source) = report.into_error() {
        return Err(GatewayError::PartialPublish {
            successful,
            total: adapted.events.len(),
            source: Box::new(source),
        });
    }

    Ok(IngestSummary {
        message: "Processed Prometheus alerts".to_string(),
        total: notification.alerts.len(),
        successful,
        skipped: adapted.skipped,
    })
}
