//! Control-channel message model
//!
//! Only the parts of the OpAMP agent/server exchange the gateway reads are
//! modelled here. Attributes use the OTLP common `KeyValue`, which OpAMP
//! shares, and custom ingest payloads are OTLP protobuf log batches.

use crate::error::{GatewayError, Result};
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use prost::Message;

pub use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue};
pub use opentelemetry_proto::tonic::logs::v1::{LogRecord, LogsData, ResourceLogs, ScopeLogs};

/// Message sent by a connected agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentToServer {
    /// 16-byte agent instance UID
    pub instance_uid: Vec<u8>,

    pub sequence_num: u64,

    pub agent_description: Option<AgentDescription>,

    pub custom_message: Option<CustomMessage>,
}

/// Self-reported agent attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentDescription {
    pub identifying_attributes: Vec<KeyValue>,

    pub non_identifying_attributes: Vec<KeyValue>,
}

/// Capability-scoped payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomMessage {
    pub capability: String,

    pub message_type: String,

    pub data: Vec<u8>,
}

/// Reply to an agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerToAgent {
    pub instance_uid: Vec<u8>,

    pub error_response: Option<ServerErrorResponse>,
}

impl ServerToAgent {
    pub fn error(instance_uid: Vec<u8>, message: impl Into<String>) -> Self {
        Self {
            instance_uid,
            error_response: Some(ServerErrorResponse {
                error_message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerErrorResponse {
    pub error_message: String,
}

/// String-valued attribute
pub fn string_attribute(key: impl Into<String>, value: impl Into<String>) -> KeyValue {
    KeyValue {
        key: key.into(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.into())),
        }),
    }
}

/// The string payload of a value, empty for anything else
pub fn string_value(value: Option<&AnyValue>) -> &str {
    match value.and_then(|v| v.value.as_ref()) {
        Some(Value::StringValue(s)) => s.as_str(),
        _ => "",
    }
}

/// Render a scalar value as a string; arrays, maps and bytes read as empty
pub fn value_as_string(value: Option<&AnyValue>) -> String {
    match value.and_then(|v| v.value.as_ref()) {
        Some(Value::StringValue(s)) => s.clone(),
        Some(Value::BoolValue(b)) => b.to_string(),
        Some(Value::IntValue(i)) => i.to_string(),
        Some(Value::DoubleValue(d)) => d.to_string(),
        _ => String::new(),
    }
}

/// Value of the first attribute named `key`
pub fn attribute<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a AnyValue> {
    attributes
        .iter()
        .find(|attr| attr.key == key)
        .and_then(|attr| attr.value.as_ref())
}

/// Every log record, resource by resource, scope by scope
pub fn log_records(logs: &LogsData) -> impl Iterator<Item = &LogRecord> {
    logs.resource_logs
        .iter()
        .flat_map(|resource| &resource.scope_logs)
        .flat_map(|scope| &scope.log_records)
}

/// Decode an OTLP protobuf log batch
pub fn decode_logs(data: &[u8]) -> Result<LogsData> {
    LogsData::decode(data).map_err(|e| GatewayError::Decode(e.to_string()))
}
