use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::layout::LayoutNode;
use crate::status::Status;

/// Snapshot of one session, returned by `list_sessions` and `create_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub directory: String,
    pub status: Status,
    pub layout: LayoutNode,
    pub parent_id: Option<String>,
    pub worktree_path: Option<String>,
    pub branch: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Control-plane requests, answered request/response rather than streamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ControlRequest {
    ListSessions,
    CreateSession {
        name: String,
        /// Working directory; `~` is expanded, defaults to the user's home.
        directory: String,
    },
    DeleteSession {
        session_id: String,
    },
    RenameSession {
        session_id: String,
        name: String,
    },
    UpdateCustomization {
        session_id: String,
        key: String,
        value: String,
    },
    CreateExperiment {
        parent_id: String,
        branch_name: String,
        worktree_path: String,
    },
    GetClientState,
    SetClientState {
        state: serde_json::Value,
    },
}

/// Control-plane responses. `Error` is the single error body for every
/// failure kind (invalid method, unknown session, invalid path).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ControlResponse {
    Sessions {
        sessions: Vec<SessionSummary>,
    },
    Session {
        session: SessionSummary,
    },
    Ok,
    ClientState {
        state: serde_json::Value,
    },
    Error {
        code: String,
        message: String,
    },
}

/// Opaque UI-preferences document persisted at `client-state.json`. The
/// core round-trips this verbatim and never interprets its contents.
pub type ClientState = BTreeMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_session_round_trip() {
        let req = ControlRequest::CreateSession {
            name: "A".to_string(),
            directory: "/tmp".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"method\":\"create_session\""));
        let back: ControlRequest = serde_json::from_str(&json).unwrap();
        match back {
            ControlRequest::CreateSession { name, directory } => {
                assert_eq!(name, "A");
                assert_eq!(directory, "/tmp");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn error_response_round_trip() {
        let resp = ControlResponse::Error {
            code: "session_not_found".to_string(),
            message: "no such session".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        let back: ControlResponse = serde_json::from_str(&json).unwrap();
        match back {
            ControlResponse::Error { code, .. } => assert_eq!(code, "session_not_found"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
