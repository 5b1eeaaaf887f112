//! Audit trail: one record per attempted publish
//!
//! Every publish attempt, successful or not, is flattened into an
//! [`AuditRecord`] and handed to an [`AuditSink`]. Persistence lives behind
//! the trait; the gateway only builds the record.

use crate::error::Result;
use crate::types::Event;
use async_trait::async_trait;
use chrono::SecondsFormat;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Flattened, string-keyed view of a published (or failed) event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    fields: BTreeMap<String, String>,
}

impl AuditRecord {
    /// Flatten an event together with the outcome of its publish attempt
    pub fn from_event(event: &Event, publish_success: bool) -> Self {
        let timestamp = event
            .timestamp
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();

        let fields = BTreeMap::from([
            ("id".to_string(), event.id.clone()),
            ("name".to_string(), event.name.clone()),
            ("timestamp".to_string(), timestamp),
            ("payload".to_string(), event.payload.clone()),
            ("source".to_string(), event.source.to_string()),
            ("sourceId".to_string(), event.source_id.clone()),
            ("correlation_id".to_string(), event.correlation_id.clone()),
            ("hub_name".to_string(), event.hub_name.clone()),
            ("publish_success".to_string(), publish_success.to_string()),
        ]);

        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn publish_success(&self) -> bool {
        self.get("publish_success") == Some("true")
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }
}

/// Destination for audit records
///
/// Implementations append to an external, append-only log.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one record
    async fn insert_audit_record(&self, record: &AuditRecord) -> Result<()>;
}

/// In-memory audit sink for development and testing
///
/// Keeps at most `max_records`, dropping the oldest first.
pub struct MemoryAuditSink {
    records: Arc<RwLock<Vec<AuditRecord>>>,
    max_records: usize,
}

impl MemoryAuditSink {
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            max_records,
        }
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Most recent records first
    pub async fn list(&self, limit: usize) -> Vec<AuditRecord> {
        let records = self.records.read().await;
        records.iter().rev().take(limit).cloned().collect()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn insert_audit_record(&self, record: &AuditRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.push(record.clone());

        if self.max_records > 0 && records.len() > self.max_records {
            let drain_count = records.len() - self.max_records;
            records.drain(..drain_count);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventSource;
    use chrono::{DateTime, Utc};

    fn test_event(name: &str) -> Event {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T10:00:00.250+02:00")
            .unwrap()
            .with_timezone(&Utc);
        let mut event = Event::new(name, EventSource::PrometheusAlerts, "prod")
            .with_source_id("abc123")
            .with_timestamp(ts)
            .with_payload("{}");
        event.id = "evt-1".to_string();
        event.correlation_id = "1714550400250-abc123".to_string();
        event
    }

    #[test]
    fn test_record_fields() {
        let record = AuditRecord::from_event(&test_event("DiskUsageHigh.firing"), true);

        assert_eq!(record.get("id"), Some("evt-1"));
        assert_eq!(record.get("name"), Some("DiskUsageHigh.firing"));
        assert_eq!(record.get("timestamp"), Some("2024-05-01T08:00:00Z"));
        assert_eq!(record.get("payload"), Some("{}"));
        assert_eq!(record.get("source"), Some("prometheus_alerts"));
        assert_eq!(record.get("sourceId"), Some("abc123"));
        assert_eq!(record.get("correlation_id"), Some("1714550400250-abc123"));
        assert_eq!(record.get("hub_name"), Some("prod"));
        assert_eq!(record.get("publish_success"), Some("true"));
        assert!(record.publish_success());
        assert_eq!(record.fields().len(), 9);
    }

    #[test]
    fn test_record_failure_flag() {
        let record = AuditRecord::from_event(&test_event("a.b"), false);
        assert!(!record.publish_success());
        assert_eq!(record.into_fields()["publish_success"], "false");
    }

    #[tokio::test]
    async fn test_memory_sink_insert_and_count() {
        let sink = MemoryAuditSink::default();
        assert_eq!(sink.count().await, 0);

        let record = AuditRecord::from_event(&test_event("a.b"), true);
        tokio_test::assert_ok!(sink.insert_audit_record(&record).await);

        assert_eq!(sink.count().await, 1);
    }

    #[tokio::test]
    async fn test_memory_sink_list_newest_first() {
        let sink = MemoryAuditSink::default();
        for i in 0..5 {
            let record = AuditRecord::from_event(&test_event(&format!("event.{}", i)), true);
            sink.insert_audit_record(&record).await.unwrap();
        }

        let list = sink.list(3).await;
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].get("name"), Some("event.4"));
        assert_eq!(list[2].get("name"), Some("event.2"));
    }

    #[tokio::test]
    async fn test_memory_sink_max_capacity() {
        let sink = MemoryAuditSink::new(3);
        for i in 0..5 {
            let record = AuditRecord::from_event(&test_event(&format!("event.{}", i)), true);
            sink.insert_audit_record(&record).await.unwrap();
        }

        assert_eq!(sink.count().await, 3);
        let list = sink.list(10).await;
        assert_eq!(list[0].get("name"), Some("event.4"));
        assert_eq!(list[2].get("name"), Some("event.2"));
    }
}
