//! NATS JetStream configuration

use crate::error::{GatewayError, Result};
use crate::types::Subject;
use serde::{Deserialize, Serialize};

/// Storage backend for the JetStream stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    File,
    Memory,
}

/// Connection and stream settings for the NATS publisher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatsConfig {
    /// Server URL (default: nats://127.0.0.1:4222)
    #[serde(default = "default_url")]
    pub url: String,

    /// Connection name reported to the server
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// JetStream stream receiving all gateway events
    #[serde(default = "default_stream_name")]
    pub stream_name: String,

    /// Prefix prepended to every subject (default: eventing)
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    #[serde(default)]
    pub storage: StorageType,

    /// Maximum messages retained by the stream (0 = unlimited)
    #[serde(default)]
    pub max_events: i64,

    /// Maximum message age in seconds (0 = unlimited)
    #[serde(default)]
    pub max_age_secs: u64,

    /// Maximum stream size in bytes (0 = unlimited)
    #[serde(default)]
    pub max_bytes: i64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on waiting for a publish acknowledgement
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,

    /// Optional auth token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_client_name() -> String {
    "publisher-a3s-gateway".to_string()
}

fn default_stream_name() -> String {
    "GATEWAY_EVENTS".to_string()
}

fn default_subject_prefix() -> String {
    "eventing".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_publish_timeout_secs() -> u64 {
    5
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            client_name: default_client_name(),
            stream_name: default_stream_name(),
            subject_prefix: default_subject_prefix(),
            storage: StorageType::default(),
            max_events: 0,
            max_age_secs: 0,
            max_bytes: 0,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
            token: None,
        }
    }
}

impl NatsConfig {
    /// Defaults overlaid with `NATS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values returned by `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("NATS_URL") {
            config.url = url;
        }
        if let Some(name) = lookup("NATS_CLIENT_NAME") {
            config.client_name = name;
        }
        if let Some(stream) = lookup("NATS_STREAM_NAME") {
            config.stream_name = stream;
        }
        if let Some(prefix) = lookup("NATS_SUBJECT_PREFIX") {
            config.subject_prefix = prefix;
        }
        if let Some(token) = lookup("NATS_TOKEN") {
            config.token = Some(token);
        }
        if let Some(secs) = lookup("NATS_PUBLISH_TIMEOUT_SECS") {
            config.publish_timeout_secs = secs.parse().map_err(|e| {
                GatewayError::Config(format!(
                    "NATS_PUBLISH_TIMEOUT_SECS must be a number of seconds, got {:?}: {}",
                    secs, e
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(GatewayError::Config("NATS url cannot be empty".to_string()));
        }
        if self.stream_name.is_empty() {
            return Err(GatewayError::Config(
                "Stream name cannot be empty".to_string(),
            ));
        }
        if self.subject_prefix.is_empty() {
            return Err(GatewayError::Config(
                "Subject prefix cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Full subject for a routing key: `<prefix>.<type>.<path>`
    pub fn build_subject(&self, subject: &Subject) -> String {
        format!("{}.{}", self.subject_prefix, subject)
    }

    /// Subjects captured by the stream
    pub fn stream_subjects(&self) -> Vec<String> {
        vec![format!("{}.>", self.subject_prefix)]
    }
}
