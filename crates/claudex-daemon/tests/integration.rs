//! End-to-end scenarios over a real Unix-socket server: a session is
//! created, a shell is started under a real PTY, and subscribers observe
//! output/status frames exactly as a browser client would.

use std::time::Duration;

use base64::Engine;
use tokio::io::BufReader;
use tokio::net::UnixStream;

use claudex_daemon::codec::{read_message, write_message};
use claudex_daemon::types::DaemonConfig;
use claudex_protocol::{
    ClientMessage, ControlRequest, ControlResponse, DaemonMessage, IncomingMessage,
    OutgoingMessage, Status, WindowSize,
};

struct TestServer {
    _dir: tempfile::TempDir,
    paths: claudex_paths::ClaudexPaths,
}

impl TestServer {
    /// Spawn a real daemon on a temp-directory socket and wait until it is
    /// accepting connections.
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = claudex_paths::ClaudexPaths::from_dir(dir.path().to_path_buf());
        std::fs::create_dir_all(paths.storage_dir()).unwrap();

        let server_paths = paths.clone();
        tokio::spawn(async move {
            let _ = claudex_daemon::run_server(DaemonConfig::default(), server_paths).await;
        });

        let socket = paths.daemon_socket();
        for _ in 0..100 {
            if UnixStream::connect(&socket).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        Self { _dir: dir, paths }
    }

    async fn connect(&self) -> Conn {
        let stream = UnixStream::connect(self.paths.daemon_socket()).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Conn { reader: BufReader::new(read_half), writer: write_half }
    }
}

struct Conn {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl Conn {
    async fn send_client(&mut self, msg: ClientMessage) {
        write_message(&mut self.writer, &IncomingMessage::Client(msg)).await.unwrap();
    }

    /// Write a raw line directly to the socket, bypassing the codec's own
    /// serialization — used to inject a deliberately malformed frame.
    async fn send_raw_line(&mut self, line: &str) {
        use tokio::io::AsyncWriteExt;
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn request(&mut self, req: ControlRequest) -> ControlResponse {
        write_message(&mut self.writer, &IncomingMessage::Control(req)).await.unwrap();
        loop {
            match read_message::<_, OutgoingMessage>(&mut self.reader).await.unwrap() {
                Some(OutgoingMessage::Control(resp)) => return resp,
                Some(OutgoingMessage::Daemon(_)) => continue,
                None => panic!("connection closed while awaiting a control response"),
            }
        }
    }

    async fn next_daemon_message(&mut self, timeout: Duration) -> Option<DaemonMessage> {
        let result = tokio::time::timeout(timeout, read_message::<_, OutgoingMessage>(&mut self.reader)).await;
        match result {
            Ok(Ok(Some(OutgoingMessage::Daemon(msg)))) => Some(msg),
            _ => None,
        }
    }

    /// Drain frames until one is an `output` frame whose decoded bytes
    /// contain `needle`, or the deadline elapses.
    async fn wait_for_output_containing(&mut self, needle: &str, deadline: Duration) -> bool {
        let start = tokio::time::Instant::now();
        while start.elapsed() < deadline {
            let remaining = deadline.saturating_sub(start.elapsed());
            match self.next_daemon_message(remaining).await {
                Some(DaemonMessage::Output { data, .. }) => {
                    let bytes = base64::engine::general_purpose::STANDARD.decode(&data).unwrap_or_default();
                    if String::from_utf8_lossy(&bytes).contains(needle) {
                        return true;
                    }
                }
                Some(DaemonMessage::Status { .. }) => continue,
                None => return false,
            }
        }
        false
    }

    async fn wait_for_status(&mut self, status: Status, deadline: Duration) -> bool {
        let start = tokio::time::Instant::now();
        while start.elapsed() < deadline {
            let remaining = deadline.saturating_sub(start.elapsed());
            match self.next_daemon_message(remaining).await {
                Some(DaemonMessage::Status { status: s, .. }) if s == status => return true,
                Some(_) => continue,
                None => return false,
            }
        }
        false
    }
}

fn create_session(resp: ControlResponse) -> claudex_protocol::SessionSummary {
    match resp {
        ControlResponse::Session { session } => session,
        other => panic!("expected Session response, got {other:?}"),
    }
}

/// Scenario A: create a session, subscribe, start a shell, write input,
/// and observe the echoed output, then stop and confirm the scrollback
/// file was written to disk.
#[tokio::test]
async fn scenario_a_shell_startup_and_stop() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let session = create_session(
        conn.request(ControlRequest::CreateSession { name: "A".to_string(), directory: "/tmp".to_string() }).await,
    );

    conn.send_client(ClientMessage::Subscribe { session_id: session.id.clone() }).await;
    // The scrollback snapshot for a never-started session is an empty output frame.
    assert!(matches!(
        conn.next_daemon_message(Duration::from_secs(1)).await,
        Some(DaemonMessage::Output { .. })
    ));

    conn.send_client(ClientMessage::Start {
        session_id: session.id.clone(),
        data: WindowSize { rows: 24, cols: 80 },
    })
    .await;

    assert!(
        conn.wait_for_status(Status::Shell, Duration::from_millis(500)).await,
        "expected a shell status frame shortly after start"
    );

    conn.send_client(ClientMessage::Input { session_id: session.id.clone(), data: "echo hi\n".to_string() }).await;
    assert!(
        conn.wait_for_output_containing("hi", Duration::from_secs(3)).await,
        "expected output echoing the input command"
    );

    conn.send_client(ClientMessage::Stop { session_id: session.id.clone() }).await;
    assert!(conn.wait_for_status(Status::Stopped, Duration::from_secs(2)).await);

    // Scrollback file exists, non-empty, and respects the 1 MiB ceiling.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let scrollback_path = server.paths.session_scrollback_file(&session.id);
    let bytes = std::fs::read(&scrollback_path).unwrap();
    assert!(!bytes.is_empty());
    assert!(bytes.len() <= 1024 * 1024);
}

/// Scenario E: two subscribers on the same session both see output in the
/// order the pane emitted it.
#[tokio::test]
async fn scenario_e_multi_subscriber_fanout_ordering() {
    let server = TestServer::start().await;
    let mut control = server.connect().await;

    let session = create_session(
        control
            .request(ControlRequest::CreateSession { name: "E".to_string(), directory: "/tmp".to_string() })
            .await,
    );

    let mut c1 = server.connect().await;
    let mut c2 = server.connect().await;
    c1.send_client(ClientMessage::Subscribe { session_id: session.id.clone() }).await;
    c2.send_client(ClientMessage::Subscribe { session_id: session.id.clone() }).await;
    let _ = c1.next_daemon_message(Duration::from_secs(1)).await; // initial snapshot
    let _ = c2.next_daemon_message(Duration::from_secs(1)).await;

    control
        .send_client(ClientMessage::Start { session_id: session.id.clone(), data: WindowSize { rows: 24, cols: 80 } })
        .await;

    control
        .send_client(ClientMessage::Input { session_id: session.id.clone(), data: "echo marker-one\n".to_string() })
        .await;
    control
        .send_client(ClientMessage::Input { session_id: session.id.clone(), data: "echo marker-two\n".to_string() })
        .await;

    assert!(c1.wait_for_output_containing("marker-one", Duration::from_secs(3)).await);
    assert!(c1.wait_for_output_containing("marker-two", Duration::from_secs(3)).await);
    assert!(c2.wait_for_output_containing("marker-one", Duration::from_secs(3)).await);
    assert!(c2.wait_for_output_containing("marker-two", Duration::from_secs(3)).await);
}

/// Stop then stop is a no-op: only one `stopped` status frame is ever sent.
#[tokio::test]
async fn stop_then_stop_emits_exactly_one_stopped_status() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let session = create_session(
        conn.request(ControlRequest::CreateSession { name: "S".to_string(), directory: "/tmp".to_string() }).await,
    );
    conn.send_client(ClientMessage::Subscribe { session_id: session.id.clone() }).await;
    let _ = conn.next_daemon_message(Duration::from_secs(1)).await;

    conn.send_client(ClientMessage::Start { session_id: session.id.clone(), data: WindowSize { rows: 24, cols: 80 } })
        .await;
    assert!(conn.wait_for_status(Status::Shell, Duration::from_millis(500)).await);

    conn.send_client(ClientMessage::Stop { session_id: session.id.clone() }).await;
    assert!(conn.wait_for_status(Status::Stopped, Duration::from_secs(2)).await);

    conn.send_client(ClientMessage::Stop { session_id: session.id.clone() }).await;
    // No second stopped frame should arrive; any message observed within the
    // window must not be another Stopped status.
    let second = conn.next_daemon_message(Duration::from_millis(500)).await;
    assert!(!matches!(second, Some(DaemonMessage::Status { status: Status::Stopped, .. })));
}

/// Control plane: create, list, rename, update customization, delete.
#[tokio::test]
async fn control_plane_session_lifecycle() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let session = create_session(
        conn.request(ControlRequest::CreateSession { name: "orig".to_string(), directory: "/tmp".to_string() })
            .await,
    );

    match conn.request(ControlRequest::ListSessions).await {
        ControlResponse::Sessions { sessions } => assert_eq!(sessions.len(), 1),
        other => panic!("unexpected response: {other:?}"),
    }

    let renamed = conn
        .request(ControlRequest::RenameSession { session_id: session.id.clone(), name: "renamed".to_string() })
        .await;
    assert!(matches!(renamed, ControlResponse::Ok));

    let updated = conn
        .request(ControlRequest::UpdateCustomization {
            session_id: session.id.clone(),
            key: "color".to_string(),
            value: "blue".to_string(),
        })
        .await;
    assert!(matches!(updated, ControlResponse::Ok));

    let deleted = conn.request(ControlRequest::DeleteSession { session_id: session.id.clone() }).await;
    assert!(matches!(deleted, ControlResponse::Ok));

    match conn.request(ControlRequest::ListSessions).await {
        ControlResponse::Sessions { sessions } => assert!(sessions.is_empty()),
        other => panic!("unexpected response: {other:?}"),
    }
}

/// Unknown session id surfaces as the single error response body.
#[tokio::test]
async fn unknown_session_id_is_an_error() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let resp = conn.request(ControlRequest::DeleteSession { session_id: "nonexistent".to_string() }).await;
    match resp {
        ControlResponse::Error { code, .. } => assert_eq!(code, "session_not_found"),
        other => panic!("unexpected response: {other:?}"),
    }
}

/// A malformed frame is logged and dropped; the connection stays open and
/// keeps serving later, well-formed requests.
#[tokio::test]
async fn malformed_frame_does_not_close_the_connection() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    conn.send_raw_line("not json at all").await;

    match conn.request(ControlRequest::ListSessions).await {
        ControlResponse::Sessions { sessions } => assert!(sessions.is_empty()),
        other => panic!("unexpected response: {other:?}"),
    }
}

/// Client state round-trips through the control plane.
#[tokio::test]
async fn client_state_round_trips_over_the_wire() {
    let server = TestServer::start().await;
    let mut conn = server.connect().await;

    let state = serde_json::json!({"theme": "dark", "sessionOrder": ["a", "b"]});
    let set = conn.request(ControlRequest::SetClientState { state: state.clone() }).await;
    assert!(matches!(set, ControlResponse::Ok));

    match conn.request(ControlRequest::GetClientState).await {
        ControlResponse::ClientState { state: loaded } => {
            assert_eq!(loaded.get("theme"), state.get("theme"));
        }
        other => panic!("unexpected response: {other:?}"),
    }
}
