use thiserror::Error;

/// Every error the daemon can produce, from PTY spawn failures through
/// protocol violations. Carries an `error_code()` so a `DaemonMessage::Error`
/// can report a stable machine-readable tag alongside the human message.
#[derive(Debug, Error)]
pub enum ClaudexError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("pane not found: {0}")]
    PaneNotFound(String),

    #[error("session already exists: {0}")]
    SessionAlreadyExists(String),

    #[error("session is not running: {0}")]
    SessionNotRunning(String),

    #[error("failed to spawn pty: {0}")]
    SpawnFailure(String),

    #[error("pty closed")]
    PtyClosed,

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("daemon already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("daemon not running")]
    NotRunning,

    #[error("shutdown timed out")]
    ShutdownTimeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("path resolution error: {0}")]
    Path(#[from] claudex_paths::PathError),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl ClaudexError {
    /// Stable machine-readable tag sent over the wire in `DaemonMessage::Error`.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClaudexError::SessionNotFound(_) => "session_not_found",
            ClaudexError::PaneNotFound(_) => "pane_not_found",
            ClaudexError::SessionAlreadyExists(_) => "session_already_exists",
            ClaudexError::SessionNotRunning(_) => "session_not_running",
            ClaudexError::SpawnFailure(_) => "spawn_failure",
            ClaudexError::PtyClosed => "pty_closed",
            ClaudexError::ProtocolError(_) => "protocol_error",
            ClaudexError::MalformedMessage(_) => "malformed_message",
            ClaudexError::AlreadyRunning(_) => "already_running",
            ClaudexError::NotRunning => "not_running",
            ClaudexError::ShutdownTimeout => "shutdown_timeout",
            ClaudexError::Io(_) => "io_error",
            ClaudexError::Serde(_) => "serde_error",
            ClaudexError::Config(_) => "config_error",
            ClaudexError::Path(_) => "path_error",
            ClaudexError::InvalidPath(_) => "invalid_path",
            ClaudexError::Base64Decode(_) => "base64_decode_error",
        }
    }

    /// Whether this error resulted from a caller mistake (bad session id,
    /// stale request) as opposed to an internal/environmental failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ClaudexError::SessionNotFound(_)
                | ClaudexError::PaneNotFound(_)
                | ClaudexError::SessionAlreadyExists(_)
                | ClaudexError::SessionNotRunning(_)
                | ClaudexError::ProtocolError(_)
                | ClaudexError::MalformedMessage(_)
                | ClaudexError::InvalidPath(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClaudexError>;
