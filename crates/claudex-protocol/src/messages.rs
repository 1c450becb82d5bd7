use serde::{Deserialize, Serialize};

use crate::status::Status;

/// Terminal window size, carried by `resize`/`start`/`restart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
}

/// Messages sent from a subscriber to the daemon over the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        session_id: String,
    },
    Unsubscribe {
        session_id: String,
    },
    /// `data` is written verbatim to the pane's PTY.
    Input {
        session_id: String,
        data: String,
    },
    Resize {
        session_id: String,
        data: WindowSize,
    },
    /// Starts or resumes the session's main pane, per the resume decision
    /// in the session's `last_agent_session_id` and the agent-session oracle.
    Start {
        session_id: String,
        data: WindowSize,
    },
    Stop {
        session_id: String,
    },
    /// Equivalent to reset + start with identical resume logic.
    Restart {
        session_id: String,
        data: WindowSize,
    },
}

impl ClientMessage {
    pub fn session_id(&self) -> &str {
        match self {
            ClientMessage::Subscribe { session_id }
            | ClientMessage::Unsubscribe { session_id }
            | ClientMessage::Input { session_id, .. }
            | ClientMessage::Resize { session_id, .. }
            | ClientMessage::Start { session_id, .. }
            | ClientMessage::Stop { session_id }
            | ClientMessage::Restart { session_id, .. } => session_id,
        }
    }
}

/// Messages sent from the daemon to a subscriber over the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// `data` is the base64 encoding of raw PTY bytes, binary-safe on a
    /// text transport. Also used to deliver the initial scrollback
    /// snapshot to a freshly subscribed connection.
    Output {
        session_id: String,
        data: String,
    },
    Status {
        session_id: String,
        status: Status,
    },
}
