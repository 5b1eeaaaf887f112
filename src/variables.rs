//! Manual variable lookup
//!
//! Resolves the declared type of a hub's manual variable, the check every
//! variable mutation goes through before an event is built, and publishes
//! the resulting `var.<operation>` event.

use crate::error::Result;
use crate::publish::{PublishContext, PublishOrchestrator};
use crate::types::{Event, Subject};
use std::collections::HashMap;
use thiserror::Error;

/// Hub name → variable name → declared data type
pub type HubVariables = HashMap<String, HashMap<String, String>>;

/// Why a variable could not be resolved; each maps onto an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VariableLookupError {
    #[error("no hubs with manual variables found")]
    NoManualVariables,

    #[error("missing hub or variable name")]
    MissingParams,

    #[error("hub not found")]
    HubNotFound,

    #[error("variable not found")]
    VariableNotFound,
}

impl VariableLookupError {
    pub fn http_status(&self) -> u16 {
        match self {
            VariableLookupError::MissingParams => 400,
            VariableLookupError::NoManualVariables
            | VariableLookupError::HubNotFound
            | VariableLookupError::VariableNotFound => 404,
        }
    }
}

/// Declared data type of `variable` in `hub`
pub fn lookup_variable_type<'a>(
    hub: &str,
    variable: &str,
    variables: &'a HubVariables,
) -> std::result::Result<&'a str, VariableLookupError> {
    if variables.is_empty() {
        return Err(VariableLookupError::NoManualVariables);
    }
    if hub.is_empty() || variable.is_empty() {
        return Err(VariableLookupError::MissingParams);
    }

    variables
        .get(hub)
        .ok_or(VariableLookupError::HubNotFound)?
        .get(variable)
        .map(String::as_str)
        .ok_or(VariableLookupError::VariableNotFound)
}

/// Publish one mutation of a hub's manual variable
///
/// The payload carries the variable's declared type. Returns the event that
/// was published; nothing is published when the lookup fails.
pub async fn publish_variable_action(
    orchestrator: &PublishOrchestrator,
    variables: &HubVariables,
    hub: &str,
    variable: &str,
    operation: &str,
    data: serde_json::Value,
    ctx: &PublishContext,
) -> Result<Event> {
    let data_type = lookup_variable_type(hub, variable, variables)?;

    let event = Event::variable_action(hub, variable, data_type, operation, data)?;
    let subject = Subject::for_variable(hub, variable);
    tracing::info!(
        event_id = %event.id,
        name = %event.name,
        subject = %subject,
        "Publishing variable event"
    );

    orchestrator
        .publish_one(event.clone(), subject, ctx)
        .await?;
    Ok(event)
}
