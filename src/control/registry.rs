//! Connected-agent registry
//!
//! Remembers, per control-channel instance, the descriptor an agent last
//! reported about itself. Completion events are correlated through it.

use super::message::{string_value, AgentToServer};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Identifying attribute holding the agent's service instance id
pub const INSTANCE_ID_ATTRIBUTE: &str = "service.instance.id";
/// Non-identifying attribute naming the hub the agent works for
pub const HUB_NAME_ATTRIBUTE: &str = "hub_name";
/// Non-identifying attribute naming the replay job
pub const REPLAY_ID_ATTRIBUTE: &str = "replay_id";
/// Non-identifying attribute naming the variable that tracks replay status
pub const REPLAY_STATUS_VARIABLE_ATTRIBUTE: &str = "replay_status_variable";

/// What an agent reported about itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub instance_id: String,
    pub hub_name: String,
    pub replay_id: String,
    pub replay_status_variable: String,
}

/// Pull a descriptor out of a message's agent description
///
/// Returns `None` when the message carries none of the recognized
/// attributes. Unrecognized keys are ignored.
pub fn harvest_descriptor(msg: &AgentToServer) -> Option<AgentDescriptor> {
    let description = msg.agent_description.as_ref()?;

    let mut descriptor = AgentDescriptor::default();
    let mut found = false;

    for attr in &description.identifying_attributes {
        if attr.key == INSTANCE_ID_ATTRIBUTE {
            descriptor.instance_id = string_value(attr.value.as_ref()).to_string();
            found = true;
        }
    }

    for attr in &description.non_identifying_attributes {
        let field = match attr.key.as_str() {
            HUB_NAME_ATTRIBUTE => &mut descriptor.hub_name,
            REPLAY_ID_ATTRIBUTE => &mut descriptor.replay_id,
            REPLAY_STATUS_VARIABLE_ATTRIBUTE => &mut descriptor.replay_status_variable,
            _ => continue,
        };
        *field = string_value(attr.value.as_ref()).to_string();
        found = true;
    }

    found.then_some(descriptor)
}

/// Instance id → latest descriptor
///
/// Writes replace the previous descriptor wholesale; there is no merge and
/// no expiry.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentDescriptor>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_descriptor(&self, instance_id: &str, descriptor: AgentDescriptor) {
        let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
        agents.insert(instance_id.to_string(), descriptor);
    }

    pub fn get_descriptor(&self, instance_id: &str) -> Option<AgentDescriptor> {
        let agents = self.agents.read().unwrap_or_else(PoisonError::into_inner);
        agents.get(instance_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
