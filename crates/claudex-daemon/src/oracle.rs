use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use claudex_protocol::Status;

/// Snapshot of an externally-detected agent session rooted at a directory,
/// returned by `AgentOracle::find_active_session`. Used by the resume
/// decision (`ClientMessage::Start`/`Restart`) to decide whether
/// `last_agent_session_id` is still resumable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub id: String,
    pub modified: DateTime<Utc>,
    pub git_branch: Option<String>,
    pub first_prompt: Option<String>,
    pub message_count: usize,
}

/// Snapshot of an agent's live state, returned by `AgentOracle::get_state`.
/// Consulted by the status monitor when `agent_active` is set, as a
/// high-confidence override of the heuristic cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub status: Status,
    pub current_tool: Option<String>,
    pub tool_target: Option<String>,
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    pub model: Option<String>,
    pub tokens_used: Option<u64>,
    pub session_id: Option<String>,
    pub pending_tools: Vec<String>,
    pub recent_tools: Vec<String>,
}

/// Read-only collaborator: a transcript reader for whatever interactive
/// agent CLI the pane is running. The core treats this as a pure function
/// of the filesystem; no implementation beyond `NullOracle` ships here.
pub trait AgentOracle: Send + Sync {
    fn find_active_session(&self, directory: &Path) -> Option<ActiveSession>;
    fn get_state(&self, directory: &Path) -> Option<AgentState>;
}

/// Default oracle: never finds an active session and never overrides the
/// tracker. Keeps the resume decision and the status monitor fully
/// exercisable without a real transcript reader wired in.
#[derive(Debug, Default)]
pub struct NullOracle;

impl AgentOracle for NullOracle {
    fn find_active_session(&self, _directory: &Path) -> Option<ActiveSession> {
        None
    }

    fn get_state(&self, _directory: &Path) -> Option<AgentState> {
        None
    }
}

/// Freshness window within which a resumable session's `modified`
/// timestamp is still trusted.
pub const RESUME_FRESHNESS: chrono::Duration = chrono::Duration::hours(24);

/// Whether `active` is recent enough, and belongs to the same id the
/// session last remembered, to justify choosing `resume` over a plain
/// shell start.
pub fn is_resumable(last_agent_session_id: &str, active: &ActiveSession, now: DateTime<Utc>) -> bool {
    active.id == last_agent_session_id && now.signed_duration_since(active.modified) < RESUME_FRESHNESS
}
