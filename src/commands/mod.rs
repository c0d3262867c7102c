//! Commands exchanged between node windows
//!
//! A command asks the window that hosts a node to start a run of one of
//! that node's agent or team definitions.

pub mod relay;
pub mod types;
pub mod validate;

pub use relay::{CommandRelay, DEFAULT_MAX_PENDING_PER_NODE};
pub use types::{
    CommandKind, DispatchResult, NodeWindowCommand, REJECT_HOME_NODE_MISMATCH,
    REJECT_INVALID_COMMAND, REJECT_UNKNOWN_NODE, START_AGENT_RUN, START_TEAM_RUN,
    StartAgentRunPayload, StartTeamRunPayload, WindowReady,
};
pub use validate::{
    ValidationError, is_node_window_command, is_start_agent_run_payload,
    is_start_team_run_payload, parse_node_window_command,
};
