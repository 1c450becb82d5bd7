use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use claudex_protocol::{ClientMessage, ControlRequest, ControlResponse, IncomingMessage, OutgoingMessage};

use crate::codec::{read_message, write_message};
use crate::errors::ClaudexError;
use crate::session::SessionManager;

/// Handle one accepted connection for its lifetime: a reader task (this
/// function) decoding JSONL frames and dispatching them to the manager, and
/// a writer task draining this connection's outgoing channel. The two run
/// independently so a slow reader never backs up outgoing status/output
/// frames, and a slow write never blocks decoding the next incoming frame.
///
/// A malformed frame is logged and dropped without closing the connection;
/// only a genuine transport failure or EOF ends the loop.
pub async fn handle_connection(stream: UnixStream, manager: Arc<SessionManager>, shutdown: CancellationToken) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let (tx, mut rx) = mpsc::unbounded_channel::<OutgoingMessage>();
    let conn_id = manager.fanout().register(tx).await;

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = write_message(&mut write_half, &msg).await {
                debug!(event = "server.connection.write_failed", error = %e);
                break;
            }
        }
    });

    loop {
        tokio::select! {
            result = read_message::<_, IncomingMessage>(&mut reader) => {
                match result {
                    Ok(Some(msg)) => dispatch(&manager, conn_id, msg).await,
                    Ok(None) => {
                        debug!(event = "server.connection.closed", conn_id);
                        break;
                    }
                    Err(ClaudexError::MalformedMessage(reason)) => {
                        warn!(event = "server.connection.malformed_message", conn_id, reason = %reason, "dropping frame, connection stays open");
                    }
                    Err(e) => {
                        warn!(event = "server.connection.read_error", conn_id, error = %e);
                        break;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                debug!(event = "server.connection.shutdown", conn_id);
                break;
            }
        }
    }

    manager.fanout().remove(conn_id).await;
    writer_task.abort();
}

async fn dispatch(manager: &Arc<SessionManager>, conn_id: crate::fanout::ConnectionId, msg: IncomingMessage) {
    match msg {
        IncomingMessage::Client(client_msg) => dispatch_client_message(manager, conn_id, client_msg).await,
        IncomingMessage::Control(req) => {
            let response = dispatch_control_request(manager, req).await;
            manager.fanout().send_to(conn_id, OutgoingMessage::Control(response)).await;
        }
    }
}

/// Realtime-channel messages are fire-and-forget: the wire protocol has no
/// error frame for them, so a failure (e.g. input to a stopped pane) is
/// logged rather than surfaced to the connection.
async fn dispatch_client_message(manager: &Arc<SessionManager>, conn_id: crate::fanout::ConnectionId, msg: ClientMessage) {
    let result = match msg {
        ClientMessage::Subscribe { session_id } => manager.subscribe(conn_id, &session_id).await,
        ClientMessage::Unsubscribe { session_id } => {
            manager.unsubscribe(conn_id, &session_id).await;
            Ok(())
        }
        ClientMessage::Input { session_id, data } => manager.write_input(&session_id, &data).await.map(|_| ()),
        ClientMessage::Resize { session_id, data } => manager.resize(&session_id, data.rows, data.cols).await,
        ClientMessage::Start { session_id, data } => manager.start(&session_id, data.rows, data.cols).await,
        ClientMessage::Stop { session_id } => manager.stop(&session_id).await,
        ClientMessage::Restart { session_id, data } => manager.restart(&session_id, data.rows, data.cols).await,
    };

    if let Err(e) = result {
        warn!(event = "server.client_message_failed", error = %e, code = e.error_code());
    }
}

async fn dispatch_control_request(manager: &Arc<SessionManager>, req: ControlRequest) -> ControlResponse {
    match req {
        ControlRequest::ListSessions => ControlResponse::Sessions { sessions: manager.list_sessions().await },
        ControlRequest::CreateSession { name, directory } => {
            match manager.create_session(name, directory).await {
                Ok(session) => ControlResponse::Session { session },
                Err(e) => error_response(e),
            }
        }
        ControlRequest::DeleteSession { session_id } => match manager.delete_session(&session_id).await {
            Ok(()) => ControlResponse::Ok,
            Err(e) => error_response(e),
        },
        ControlRequest::RenameSession { session_id, name } => match manager.rename_session(&session_id, name).await {
            Ok(()) => ControlResponse::Ok,
            Err(e) => error_response(e),
        },
        ControlRequest::UpdateCustomization { session_id, key, value } => {
            match manager.update_customization(&session_id, key, value).await {
                Ok(()) => ControlResponse::Ok,
                Err(e) => error_response(e),
            }
        }
        ControlRequest::CreateExperiment { parent_id, branch_name, worktree_path } => {
            match manager.create_experiment(parent_id, branch_name, worktree_path).await {
                Ok(session) => ControlResponse::Session { session },
                Err(e) => error_response(e),
            }
        }
        ControlRequest::GetClientState => {
            let state = manager.get_client_state().await;
            ControlResponse::ClientState {
                state: serde_json::to_value(state).unwrap_or(serde_json::json!({})),
            }
        }
        ControlRequest::SetClientState { state } => match serde_json::from_value(state) {
            Ok(state) => match manager.set_client_state(state).await {
                Ok(()) => ControlResponse::Ok,
                Err(e) => error_response(e),
            },
            Err(e) => error_response(ClaudexError::ProtocolError(format!("client state must be a JSON object: {e}"))),
        },
    }
}

fn error_response(err: ClaudexError) -> ControlResponse {
    ControlResponse::Error { code: err.error_code().to_string(), message: err.to_string() }
}
