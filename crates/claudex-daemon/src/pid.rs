use std::path::Path;

use nix::sys::signal::kill;
use nix::unistd::Pid;

use crate::errors::{ClaudexError, Result};

/// Write the current process id to `path`, overwriting any existing file.
pub fn write_pid_file(path: &Path) -> Result<()> {
    std::fs::write(path, std::process::id().to_string())?;
    Ok(())
}

/// Read a pid from `path`, returning `None` if the file is absent or
/// does not contain a valid integer.
pub fn read_pid_file(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

pub fn remove_pid_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Whether a process with the given pid currently exists, probed with
/// a null signal (no actual signal delivered).
pub fn is_process_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Check whether a daemon is already running via `pid_path`. A stale pid
/// file (process no longer alive) is cleaned up and treated as "not
/// running" rather than surfaced as an error.
pub fn check_daemon_running(pid_path: &Path) -> Result<Option<u32>> {
    let Some(pid) = read_pid_file(pid_path) else {
        return Ok(None);
    };

    if is_process_alive(pid) {
        Ok(Some(pid))
    } else {
        tracing::info!(event = "pid.stale_cleanup", pid, "removing stale pid file");
        remove_pid_file(pid_path)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read_pid_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        write_pid_file(&path).unwrap();
        assert_eq!(read_pid_file(&path), Some(std::process::id()));
    }

    #[test]
    fn read_pid_file_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent.pid");
        assert_eq!(read_pid_file(&path), None);
    }

    #[test]
    fn read_pid_file_garbage_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        std::fs::write(&path, "not-a-number").unwrap();
        assert_eq!(read_pid_file(&path), None);
    }

    #[test]
    fn remove_pid_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        assert!(remove_pid_file(&path).is_ok());
        write_pid_file(&path).unwrap();
        assert!(remove_pid_file(&path).is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn check_daemon_running_cleans_up_stale_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        // pid 1 is very unlikely to match any process we could spawn in
        // CI, but to avoid flakiness we pick a deterministically-unused
        // high pid instead of asserting on liveness of pid 1.
        std::fs::write(&path, "999999").unwrap();
        let result = check_daemon_running(&path).unwrap();
        assert_eq!(result, None);
        assert!(!path.exists());
    }

    #[test]
    fn check_daemon_running_detects_live_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        write_pid_file(&path).unwrap();
        let result = check_daemon_running(&path).unwrap();
        assert_eq!(result, Some(std::process::id()));
    }
}
