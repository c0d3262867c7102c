//! Cross-window command types

use serde::{Deserialize, Serialize};

/// Wire tag for [`CommandKind::StartAgentRun`]
pub const START_AGENT_RUN: &str = "START_AGENT_RUN";

/// Wire tag for [`CommandKind::StartTeamRun`]
pub const START_TEAM_RUN: &str = "START_TEAM_RUN";

/// Ask the destination window to prepare a run of one agent definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAgentRunPayload {
    pub agent_definition_id: String,
    pub agent_name: String,
    pub source_node_id: String,
    pub home_node_id: String,
}

/// Ask the destination window to prepare a run of one team definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTeamRunPayload {
    pub team_definition_id: String,
    pub team_name: String,
    pub source_node_id: String,
    pub home_node_id: String,
}

/// Command variants, tagged by `commandType` with the body under `payload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "commandType", content = "payload")]
pub enum CommandKind {
    #[serde(rename = "START_AGENT_RUN")]
    StartAgentRun(StartAgentRunPayload),
    #[serde(rename = "START_TEAM_RUN")]
    StartTeamRun(StartTeamRunPayload),
}

/// A command routed to the window that hosts a node
///
/// `command_id` is the receiver's idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeWindowCommand {
    pub command_id: String,
    pub issued_at_iso: String,
    #[serde(flatten)]
    pub kind: CommandKind,
}

impl NodeWindowCommand {
    /// Build a `START_AGENT_RUN` command
    #[must_use]
    pub fn start_agent_run(
        command_id: impl Into<String>,
        issued_at_iso: impl Into<String>,
        payload: StartAgentRunPayload,
    ) -> Self {
        Self {
            command_id: command_id.into(),
            issued_at_iso: issued_at_iso.into(),
            kind: CommandKind::StartAgentRun(payload),
        }
    }

    /// Build a `START_TEAM_RUN` command
    #[must_use]
    pub fn start_team_run(
        command_id: impl Into<String>,
        issued_at_iso: impl Into<String>,
        payload: StartTeamRunPayload,
    ) -> Self {
        Self {
            command_id: command_id.into(),
            issued_at_iso: issued_at_iso.into(),
            kind: CommandKind::StartTeamRun(payload),
        }
    }

    /// Wire name of the command type
    #[must_use]
    pub const fn command_type(&self) -> &'static str {
        match self.kind {
            CommandKind::StartAgentRun(_) => START_AGENT_RUN,
            CommandKind::StartTeamRun(_) => START_TEAM_RUN,
        }
    }

    /// Node the referenced definition lives on
    #[must_use]
    pub fn home_node_id(&self) -> &str {
        match &self.kind {
            CommandKind::StartAgentRun(p) => &p.home_node_id,
            CommandKind::StartTeamRun(p) => &p.home_node_id,
        }
    }

    /// Node whose window issued the command
    #[must_use]
    pub fn source_node_id(&self) -> &str {
        match &self.kind {
            CommandKind::StartAgentRun(p) => &p.source_node_id,
            CommandKind::StartTeamRun(p) => &p.source_node_id,
        }
    }

    /// Definition the command refers to
    #[must_use]
    pub fn definition_id(&self) -> &str {
        match &self.kind {
            CommandKind::StartAgentRun(p) => &p.agent_definition_id,
            CommandKind::StartTeamRun(p) => &p.team_definition_id,
        }
    }
}

/// Reason given when an inbound command fails validation
pub const REJECT_INVALID_COMMAND: &str = "invalid-command";

/// Reason given when the destination node is not registered
pub const REJECT_UNKNOWN_NODE: &str = "unknown-node";

/// Reason given when a command is routed to a node other than its home
pub const REJECT_HOME_NODE_MISMATCH: &str = "command-home-node-mismatch";

/// Outcome of handing a command to the window host
///
/// When `accepted`, exactly one of `delivered`/`queued` is set. When not,
/// `reason` says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub accepted: bool,
    pub delivered: bool,
    pub queued: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DispatchResult {
    /// Command reached a ready window
    #[must_use]
    pub fn delivered(window_id: impl Into<String>) -> Self {
        Self {
            accepted: true,
            delivered: true,
            queued: false,
            window_id: Some(window_id.into()),
            reason: None,
        }
    }

    /// Command is waiting for the window to become ready
    #[must_use]
    pub fn queued(window_id: Option<String>) -> Self {
        Self {
            accepted: true,
            delivered: false,
            queued: true,
            window_id,
            reason: None,
        }
    }

    /// Command was refused
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            delivered: false,
            queued: false,
            window_id: None,
            reason: Some(reason.into()),
        }
    }
}

/// Answer to an ensure-window request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowReady {
    pub window_id: String,
    pub created: bool,
}
