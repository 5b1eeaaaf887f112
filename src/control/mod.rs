//! Agent control channel
//!
//! Agents report who they are and what they are replaying; the server
//! keeps the latest report per instance and, when an agent's ingest logs
//! announce a terminal status, publishes a `replay-complete` event for the
//! replay status variable.

pub mod completion;
pub mod message;
pub mod registry;

pub use completion::{
    build_completion_event, find_completion_status, CompletionStatus, ReplayCompletion,
    S3_RECEIVER_CAPABILITY,
};
pub use message::{decode_logs, AgentToServer, LogsData, ServerToAgent};
pub use registry::{harvest_descriptor, AgentDescriptor, AgentRegistry};

use crate::error::{GatewayError, Result};
use crate::publish::{PublishContext, PublishOrchestrator};
use std::sync::Arc;
use uuid::Uuid;

/// Handles inbound control-channel messages
pub struct ControlServer {
    registry: Arc<AgentRegistry>,
    orchestrator: Arc<PublishOrchestrator>,
}

impl ControlServer {
    pub fn new(registry: Arc<AgentRegistry>, orchestrator: Arc<PublishOrchestrator>) -> Self {
        Self {
            registry,
            orchestrator,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Process one agent message and produce the reply
    ///
    /// Failures while handling a custom message are logged and never
    /// reach the agent; only an unparsable instance UID is answered with
    /// an error.
    pub async fn on_message(&self, msg: &AgentToServer, ctx: &PublishContext) -> ServerToAgent {
        let uid = match Uuid::from_slice(&msg.instance_uid) {
            Ok(uid) => uid,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse instance uid");
                return ServerToAgent::error(msg.instance_uid.clone(), e.to_string());
            }
        };
        let agent_key = uid.to_string();

        if let Some(descriptor) = harvest_descriptor(msg) {
            tracing::debug!(agent = %agent_key, hub_name = %descriptor.hub_name, "Agent described itself");
            self.registry.set_descriptor(&agent_key, descriptor);
        }

        if let Some(custom) = &msg.custom_message {
            if custom.capability == S3_RECEIVER_CAPABILITY {
                if let Err(e) = self.handle_ingest_logs(&agent_key, &custom.data, ctx).await {
                    tracing::warn!(agent = %agent_key, error = %e, "Failed to handle S3 receiver message");
                }
            }
        }

        ServerToAgent {
            instance_uid: msg.instance_uid.clone(),
            error_response: None,
        }
    }

    async fn handle_ingest_logs(
        &self,
        agent_key: &str,
        data: &[u8],
        ctx: &PublishContext,
    ) -> Result<()> {
        let logs = decode_logs(data).map_err(|e| {
            tracing::error!(agent = %agent_key, error = %e, "Failed to unmarshal ingest logs");
            e
        })?;

        match find_completion_status(&logs) {
            Some(status) => self.publish_completion_event(agent_key, status, ctx).await,
            None => Ok(()),
        }
    }

    /// Publish the completion event for a registered agent
    pub async fn publish_completion_event(
        &self,
        agent_key: &str,
        status: CompletionStatus,
        ctx: &PublishContext,
    ) -> Result<()> {
        let agent = self
            .registry
            .get_descriptor(agent_key)
            .ok_or_else(|| GatewayError::UnknownAgent(agent_key.to_string()))?;

        let pair = build_completion_event(&agent, status)?;
        self.orchestrator
            .publish_one(pair.event, pair.subject, ctx)
            .await?;

        tracing::info!(agent = %agent_key, status = %status, "Replay completion event published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::control::message::{
        string_attribute, AgentDescription, CustomMessage, LogRecord, ResourceLogs, ScopeLogs,
    };
    use crate::control::registry::{
        HUB_NAME_ATTRIBUTE, INSTANCE_ID_ATTRIBUTE, REPLAY_ID_ATTRIBUTE,
        REPLAY_STATUS_VARIABLE_ATTRIBUTE,
    };
    use crate::provider::memory::MemoryPublisher;
    use prost::Message;

    const UID: [u8; 16] = [7; 16];

    fn server() -> (ControlServer, Arc<MemoryPublisher>, Arc<MemoryAuditSink>) {
        let publisher = Arc::new(MemoryPublisher::new());
        let audit = Arc::new(MemoryAuditSink::default());
        let orchestrator = Arc::new(PublishOrchestrator::new(publisher.clone(), audit.clone()));
        (
            ControlServer::new(Arc::new(AgentRegistry::new()), orchestrator),
            publisher,
            audit,
        )
    }

    fn describe(replay_status_variable: &str) -> AgentToServer {
        AgentToServer {
            instance_uid: UID.to_vec(),
            agent_description: Some(AgentDescription {
                identifying_attributes: vec![string_attribute(
                    INSTANCE_ID_ATTRIBUTE,
                    "collector-1",
                )],
                non_identifying_attributes: vec![
                    string_attribute(HUB_NAME_ATTRIBUTE, "mdaihub-sample"),
                    string_attribute(REPLAY_ID_ATTRIBUTE, "replay-42"),
                    string_attribute(REPLAY_STATUS_VARIABLE_ATTRIBUTE, replay_status_variable),
                ],
            }),
            ..Default::default()
        }
    }

    fn ingest_logs(status: &str) -> AgentToServer {
        let data = LogsData {
            resource_logs: vec![ResourceLogs {
                scope_logs: vec![ScopeLogs {
                    log_records: vec![LogRecord {
                        attributes: vec![string_attribute("ingest_status", status)],
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        AgentToServer {
            instance_uid: UID.to_vec(),
            custom_message: Some(CustomMessage {
                capability: S3_RECEIVER_CAPABILITY.to_string(),
                message_type: String::new(),
                data: data.encode_to_vec(),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_uid_gets_error_response() {
        let (server, _publisher, _audit) = server();
        let msg = AgentToServer {
            instance_uid: vec![1, 2, 3],
            ..Default::default()
        };

        let reply = server.on_message(&msg, &PublishContext::new()).await;
        assert!(reply.error_response.is_some());
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn test_description_is_registered() {
        let (server, _publisher, _audit) = server();
        let reply = server
            .on_message(&describe("replay_a_request"), &PublishContext::new())
            .await;

        assert!(reply.error_response.is_none());
        assert_eq!(reply.instance_uid, UID.to_vec());

        let key = Uuid::from_bytes(UID).to_string();
        let descriptor = server.registry().get_descriptor(&key).unwrap();
        assert_eq!(descriptor.instance_id, "collector-1");
        assert_eq!(descriptor.replay_status_variable, "replay_a_request");
    }

    #[tokio::test]
    async fn test_completion_published_once_agent_known() {
        let (server, publisher, audit) = server();
        let ctx = PublishContext::new();

        server.on_message(&describe("replay_a_request"), &ctx).await;
        let reply = server.on_message(&ingest_logs("completed"), &ctx).await;
        assert!(reply.error_response.is_none());

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].1.to_string(), "var.mdaihub-sample.replay_a_request");
        assert_eq!(published[0].0.source_id, "collector-1");
        assert_eq!(audit.count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_agent_publishes_nothing() {
        let (server, publisher, audit) = server();
        let reply = server
            .on_message(&ingest_logs("failed"), &PublishContext::new())
            .await;

        assert!(reply.error_response.is_none());
        assert_eq!(publisher.attempts(), 0);
        assert_eq!(audit.count().await, 0);

        let err = server
            .publish_completion_event("nobody", CompletionStatus::Failed, &PublishContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownAgent(_)));
    }

    #[tokio::test]
    async fn test_incomplete_descriptor_publishes_nothing() {
        let (server, publisher, audit) = server();
        let ctx = PublishContext::new();

        server.on_message(&describe(""), &ctx).await;
        server.on_message(&ingest_logs("completed"), &ctx).await;

        assert_eq!(publisher.attempts(), 0);
        assert_eq!(audit.count().await, 0);
    }

    #[tokio::test]
    async fn test_non_terminal_status_is_ignored() {
        let (server, publisher, _audit) = server();
        let ctx = PublishContext::new();

        server.on_message(&describe("replay_a_request"), &ctx).await;
        server.on_message(&ingest_logs("running"), &ctx).await;
        assert_eq!(publisher.attempts(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_logs_are_tolerated() {
        let (server, publisher, _audit) = server();
        let ctx = PublishContext::new();
        server.on_message(&describe("replay_a_request"), &ctx).await;

        let mut msg = ingest_logs("completed");
        if let Some(custom) = msg.custom_message.as_mut() {
            custom.data = vec![0xff, 0xff, 0xff];
        }

        let reply = server.on_message(&msg, &ctx).await;
        assert!(reply.error_response.is_none());
        assert_eq!(publisher.attempts(), 0);
    }

    #[tokio::test]
    async fn test_other_capability_is_ignored() {
        let (server, publisher, _audit) = server();
        let ctx = PublishContext::new();
        server.on_message(&describe("replay_a_request"), &ctx).await;

        let mut msg = ingest_logs("completed");
        if let Some(custom) = msg.custom_message.as_mut() {
            custom.capability = "io.example.other".to_string();
        }

        server.on_message(&msg, &ctx).await;
        assert_eq!(publisher.attempts(), 0);
    }
}
