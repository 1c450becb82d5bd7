use serde::{Deserialize, Serialize};

use crate::control::{ControlRequest, ControlResponse};
use crate::messages::{ClientMessage, DaemonMessage};

/// One JSONL line read from a connection. The realtime channel
/// (`ClientMessage`) and the control plane (`ControlRequest`) are
/// multiplexed onto the same socket, distinguished by their `type`/`method`
/// tag, matching the discriminator `serde` already picks between variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
    Client(ClientMessage),
    Control(ControlRequest),
}

/// One JSONL line written to a connection: either a realtime frame
/// (`output`/`status`) or a control-plane response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutgoingMessage {
    Daemon(DaemonMessage),
    Control(ControlResponse),
}

impl From<DaemonMessage> for OutgoingMessage {
    fn from(msg: DaemonMessage) -> Self {
        OutgoingMessage::Daemon(msg)
    }
}

impl From<ControlResponse> for OutgoingMessage {
    fn from(resp: ControlResponse) -> Self {
        OutgoingMessage::Control(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_dispatches_to_client_message() {
        let raw = r#"{"type":"stop","session_id":"s1"}"#;
        let msg: IncomingMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, IncomingMessage::Client(ClientMessage::Stop { .. })));
    }

    #[test]
    fn incoming_dispatches_to_control_request() {
        let raw = r#"{"method":"list_sessions"}"#;
        let msg: IncomingMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, IncomingMessage::Control(ControlRequest::ListSessions)));
    }

    #[test]
    fn outgoing_daemon_message_round_trips() {
        let msg: OutgoingMessage = DaemonMessage::Status {
            session_id: "s1".to_string(),
            status: crate::status::Status::Shell,
        }
        .into();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"status\""));
    }
}
