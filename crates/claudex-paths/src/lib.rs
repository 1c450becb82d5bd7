use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("home directory not found — set $HOME environment variable")]
    HomeNotFound,
}

/// Centralized path construction for the `~/.claudex/` storage layout.
///
/// Single source of truth for every path the daemon reads or writes. Use
/// `resolve()` in production code and `from_dir()` in tests.
#[derive(Debug, Clone)]
pub struct ClaudexPaths {
    storage_dir: PathBuf,
}

impl ClaudexPaths {
    /// Resolve paths from the user's home directory (`~/.claudex`).
    pub fn resolve() -> Result<Self, PathError> {
        let home = dirs::home_dir().ok_or(PathError::HomeNotFound)?;
        Ok(Self {
            storage_dir: home.join(".claudex"),
        })
    }

    /// Create paths from an explicit base directory. Use in tests.
    pub fn from_dir(storage_dir: PathBuf) -> Self {
        Self { storage_dir }
    }

    /// The base `~/.claudex` storage directory.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn daemon_socket(&self) -> PathBuf {
        self.storage_dir.join("daemon.sock")
    }

    pub fn daemon_pid_file(&self) -> PathBuf {
        self.storage_dir.join("daemon.pid")
    }

    pub fn user_config(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }

    pub fn client_state_file(&self) -> PathBuf {
        self.storage_dir.join("client-state.json")
    }

    /// Session metadata file: `<storage>/<id>.json`.
    pub fn session_metadata_file(&self, session_id: &str) -> PathBuf {
        self.storage_dir.join(format!("{session_id}.json"))
    }

    /// Session scrollback backup file: `<storage>/<id>.scrollback`.
    pub fn session_scrollback_file(&self, session_id: &str) -> PathBuf {
        self.storage_dir.join(format!("{session_id}.scrollback"))
    }

    /// Reserved metadata file name that is never parsed as session metadata.
    pub const CLIENT_STATE_FILE_NAME: &'static str = "client-state.json";
}
