use serde::{Deserialize, Serialize};

fn default_scrollback_buffer_size() -> usize {
    1024 * 1024
}

fn default_pty_read_chunk_size() -> usize {
    4096
}

fn default_client_channel_capacity() -> usize {
    256
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

/// Daemon-wide tunables, loaded from `[daemon]` in `~/.claudex/config.toml`
/// with every field defaulted so a missing or partial file is never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Byte cap per session's scrollback ring buffer.
    #[serde(default = "default_scrollback_buffer_size")]
    pub scrollback_buffer_size: usize,

    /// Bytes read from the PTY master per blocking read.
    #[serde(default = "default_pty_read_chunk_size")]
    pub pty_read_chunk_size: usize,

    /// Per-subscriber broadcast channel capacity before frames are dropped.
    #[serde(default = "default_client_channel_capacity")]
    pub client_channel_capacity: usize,

    /// How long graceful shutdown waits for in-flight connections to close.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            scrollback_buffer_size: default_scrollback_buffer_size(),
            pty_read_chunk_size: default_pty_read_chunk_size(),
            client_channel_capacity: default_client_channel_capacity(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.scrollback_buffer_size == 0 {
            return Err("scrollback_buffer_size must be greater than zero".to_string());
        }
        if self.pty_read_chunk_size == 0 {
            return Err("pty_read_chunk_size must be greater than zero".to_string());
        }
        if self.client_channel_capacity == 0 {
            return Err("client_channel_capacity must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    daemon: DaemonConfig,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
        }
    }
}

/// Load `[daemon]` settings from `path`, falling back to defaults when the
/// file is missing or fails to parse. A present-but-invalid `[daemon]`
/// section (e.g. a zero buffer size) is still an error: only a missing file
/// is tolerated silently.
pub fn load_daemon_config(path: &std::path::Path) -> DaemonConfig {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            tracing::debug!(event = "config.load_skipped", path = %path.display(), "no config file, using defaults");
            return DaemonConfig::default();
        }
    };

    match toml::from_str::<ConfigFile>(&contents) {
        Ok(file) => {
            if let Err(reason) = file.daemon.validate() {
                tracing::warn!(event = "config.invalid", %reason, "falling back to defaults");
                return DaemonConfig::default();
            }
            tracing::info!(event = "config.load_completed", path = %path.display());
            file.daemon
        }
        Err(err) => {
            tracing::warn!(event = "config.parse_failed", error = %err, "falling back to defaults");
            DaemonConfig::default()
        }
    }
}

/// Snapshot of daemon health, returned by a status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub pid: u32,
    pub session_count: usize,
    pub uptime_secs: u64,
}
