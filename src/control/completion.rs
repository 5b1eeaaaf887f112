//! Replay completion detection
//!
//! Scans log batches for a terminal ingest status and turns a hit into a
//! variable-mutation event for the agent's replay status variable.

use super::message::{attribute, log_records, value_as_string, LogsData};
use super::registry::AgentDescriptor;
use crate::error::{GatewayError, Result};
use crate::types::{Event, EventPerSubject, EventSource, EventType, Subject, VariablesActionPayload};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability tag of custom messages carrying ingest logs
pub const S3_RECEIVER_CAPABILITY: &str = "org.opentelemetry.collector.receiver.awss3";

/// Log attribute reporting ingest progress
pub const INGEST_STATUS_ATTRIBUTE: &str = "ingest_status";

/// Event name of every completion event
pub const REPLAY_COMPLETE_EVENT: &str = "replay-complete";

/// Terminal ingest status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Completed,
    Failed,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Completed => "completed",
            CompletionStatus::Failed => "failed",
        }
    }

    /// Parse a terminal status; anything else is still in progress
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completed" => Some(CompletionStatus::Completed),
            "failed" => Some(CompletionStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First terminal status found in the batch, in record order
pub fn find_completion_status(logs: &LogsData) -> Option<CompletionStatus> {
    log_records(logs)
        .filter_map(|record| attribute(&record.attributes, INGEST_STATUS_ATTRIBUTE))
        .find_map(|value| CompletionStatus::parse(&value_as_string(Some(value))))
}

/// Detail carried as the variable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayCompletion {
    pub replay_name: String,
    pub replay_status: String,
}

/// Build the completion event for an agent's replay
///
/// Every descriptor field the subject and payload depend on must be
/// present; nothing is built otherwise.
pub fn build_completion_event(
    agent: &AgentDescriptor,
    status: CompletionStatus,
) -> Result<EventPerSubject> {
    if agent.hub_name.is_empty() {
        return Err(GatewayError::MissingAgentField("hubName"));
    }
    if agent.replay_id.is_empty() {
        return Err(GatewayError::MissingAgentField("replay ID"));
    }
    if agent.replay_status_variable.is_empty() {
        return Err(GatewayError::MissingAgentField("replay status variable ref"));
    }

    // Raw hub and variable names: the subject must match what variable
    // subscribers already listen on
    let subject = Subject::new(
        EventType::Var,
        format!("{}.{}", agent.hub_name, agent.replay_status_variable),
    );

    let detail = serde_json::to_string(&ReplayCompletion {
        replay_name: agent.replay_id.clone(),
        replay_status: status.to_string(),
    })?;
    tracing::info!(
        subject = %subject,
        event = %detail,
        "Publishing replay completion event"
    );

    let wrapper = VariablesActionPayload {
        variable_ref: agent.replay_status_variable.clone(),
        data_type: "string".to_string(),
        operation: "add".to_string(),
        data: serde_json::Value::String(detail),
    };
    let payload = match serde_json::to_string(&wrapper) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Failed to marshal replay completion payload");
            String::new()
        }
    };

    let mut event = Event::new(REPLAY_COMPLETE_EVENT, EventSource::ManualVariables, &agent.hub_name)
        .with_source_id(&agent.instance_id)
        .with_payload(payload);
    event.apply_defaults();

    Ok(EventPerSubject::new(event, subject))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::message::{
        string_attribute, AnyValue, KeyValue, LogRecord, ResourceLogs, ScopeLogs,
    };
    use opentelemetry_proto::tonic::common::v1::any_value::Value;

    fn descriptor() -> AgentDescriptor {
        AgentDescriptor {
            instance_id: "collector-1".to_string(),
            hub_name: "mdaihub-sample".to_string(),
            replay_id: "replay-42".to_string(),
            replay_status_variable: "replay_a_request".to_string(),
        }
    }

    fn batch(log_records: Vec<LogRecord>) -> LogsData {
        LogsData {
            resource_logs: vec![ResourceLogs {
                scope_logs: vec![ScopeLogs {
                    log_records,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    fn logs(statuses: &[Option<&str>]) -> LogsData {
        batch(
            statuses
                .iter()
                .map(|status| LogRecord {
                    attributes: status
                        .map(|s| vec![string_attribute(INGEST_STATUS_ATTRIBUTE, s)])
                        .unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
        )
    }

    #[test]
    fn test_find_first_terminal_status() {
        let data = logs(&[None, Some("in_progress"), Some("failed"), Some("completed")]);
        assert_eq!(find_completion_status(&data), Some(CompletionStatus::Failed));
    }

    #[test]
    fn test_no_terminal_status() {
        assert_eq!(find_completion_status(&logs(&[None, Some("started")])), None);
        assert_eq!(find_completion_status(&LogsData::default()), None);
    }

    #[test]
    fn test_status_read_from_non_string_value_is_ignored() {
        let data = batch(vec![LogRecord {
            attributes: vec![KeyValue {
                key: INGEST_STATUS_ATTRIBUTE.to_string(),
                value: Some(AnyValue {
                    value: Some(Value::BoolValue(true)),
                }),
            }],
            ..Default::default()
        }]);
        assert_eq!(find_completion_status(&data), None);
    }

    #[test]
    fn test_missing_replay_status_variable_is_rejected() {
        let agent = AgentDescriptor {
            replay_status_variable: String::new(),
            ..descriptor()
        };
        let err = build_completion_event(&agent, CompletionStatus::Completed).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::MissingAgentField("replay status variable ref")
        ));
    }

    #[test]
    fn test_missing_fields_checked_in_order() {
        let agent = AgentDescriptor {
            instance_id: "collector-1".to_string(),
            ..Default::default()
        };
        let err = build_completion_event(&agent, CompletionStatus::Completed).unwrap_err();
        assert_eq!(err.to_string(), "missing hubName");

        let agent = AgentDescriptor {
            replay_id: String::new(),
            ..descriptor()
        };
        let err = build_completion_event(&agent, CompletionStatus::Completed).unwrap_err();
        assert_eq!(err.to_string(), "missing replay ID");
    }

    #[test]
    fn test_failed_completion_event() {
        let pair = build_completion_event(&descriptor(), CompletionStatus::Failed).unwrap();

        assert_eq!(pair.subject.to_string(), "var.mdaihub-sample.replay_a_request");

        let event = &pair.event;
        assert_eq!(event.name, REPLAY_COMPLETE_EVENT);
        assert_eq!(event.source, EventSource::ManualVariables);
        assert_eq!(event.source_id, "collector-1");
        assert_eq!(event.hub_name, "mdaihub-sample");
        assert!(!event.id.is_empty());
        assert!(event.timestamp.is_some());
        assert!(event.validate().is_ok());

        let wrapper: VariablesActionPayload = serde_json::from_str(&event.payload).unwrap();
        assert_eq!(wrapper.variable_ref, "replay_a_request");
        assert_eq!(wrapper.data_type, "string");
        assert_eq!(wrapper.operation, "add");

        let detail = wrapper.data.as_str().unwrap();
        let decoded: serde_json::Value = serde_json::from_str(detail).unwrap();
        assert_eq!(
            decoded,
            serde_json::json!({"replay_name": "replay-42", "replay_status": "failed"})
        );
    }

    #[test]
    fn test_completed_status_in_detail() {
        let pair = build_completion_event(&descriptor(), CompletionStatus::Completed).unwrap();
        let wrapper: VariablesActionPayload = serde_json::from_str(&pair.event.payload).unwrap();
        let detail: ReplayCompletion = serde_json::from_str(wrapper.data.as_str().unwrap()).unwrap();
        assert_eq!(detail.replay_status, "completed");
        assert_eq!(detail.replay_name, "replay-42");
    }
}
