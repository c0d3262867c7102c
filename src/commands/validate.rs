//! Boundary validation for commands arriving from another window or process
//!
//! Peers may run a different protocol version or send corrupted data, so
//! every inbound payload is parsed into a typed command here first. Failures
//! are values, never panics; callers drop the input.

use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{
    NodeWindowCommand, START_AGENT_RUN, START_TEAM_RUN, StartAgentRunPayload, StartTeamRunPayload,
};

/// Why an inbound value is not a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expected a JSON object")]
    NotAnObject,

    #[error("field `{0}` must be a non-empty string")]
    InvalidField(&'static str),

    #[error("unknown command type `{0}`")]
    UnknownCommandType(String),
}

fn required_str(obj: &Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        _ => Err(ValidationError::InvalidField(field)),
    }
}

/// Parse a `START_AGENT_RUN` payload
///
/// # Errors
///
/// Returns the first field that is missing, not a string, or blank
pub fn parse_start_agent_run_payload(value: &Value) -> Result<StartAgentRunPayload, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;
    Ok(StartAgentRunPayload {
        agent_definition_id: required_str(obj, "agentDefinitionId")?,
        agent_name: required_str(obj, "agentName")?,
        source_node_id: required_str(obj, "sourceNodeId")?,
        home_node_id: required_str(obj, "homeNodeId")?,
    })
}

/// Parse a `START_TEAM_RUN` payload
///
/// # Errors
///
/// Returns the first field that is missing, not a string, or blank
pub fn parse_start_team_run_payload(value: &Value) -> Result<StartTeamRunPayload, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;
    Ok(StartTeamRunPayload {
        team_definition_id: required_str(obj, "teamDefinitionId")?,
        team_name: required_str(obj, "teamName")?,
        source_node_id: required_str(obj, "sourceNodeId")?,
        home_node_id: required_str(obj, "homeNodeId")?,
    })
}

/// Parse an untyped value into a [`NodeWindowCommand`]
///
/// # Errors
///
/// Returns a [`ValidationError`] for non-objects, blank envelope fields,
/// unknown command types, or a payload that fails its per-type check
pub fn parse_node_window_command(value: &Value) -> Result<NodeWindowCommand, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;
    let command_id = required_str(obj, "commandId")?;
    let command_type = required_str(obj, "commandType")?;
    let issued_at_iso = required_str(obj, "issuedAtIso")?;
    let payload = obj.get("payload").unwrap_or(&Value::Null);

    match command_type.as_str() {
        START_AGENT_RUN => Ok(NodeWindowCommand::start_agent_run(
            command_id,
            issued_at_iso,
            parse_start_agent_run_payload(payload)?,
        )),
        START_TEAM_RUN => Ok(NodeWindowCommand::start_team_run(
            command_id,
            issued_at_iso,
            parse_start_team_run_payload(payload)?,
        )),
        _ => Err(ValidationError::UnknownCommandType(command_type)),
    }
}

/// Whether `value` is a well-formed `START_AGENT_RUN` payload
#[must_use]
pub fn is_start_agent_run_payload(value: &Value) -> bool {
    parse_start_agent_run_payload(value).is_ok()
}

/// Whether `value` is a well-formed `START_TEAM_RUN` payload
#[must_use]
pub fn is_start_team_run_payload(value: &Value) -> bool {
    parse_start_team_run_payload(value).is_ok()
}

/// Whether `value` is a well-formed command of a known type
#[must_use]
pub fn is_node_window_command(value: &Value) -> bool {
    parse_node_window_command(value).is_ok()
}
