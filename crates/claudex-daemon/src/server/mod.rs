pub mod connection;
pub mod shutdown;

use std::sync::Arc;

use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use claudex_paths::ClaudexPaths;

use crate::errors::{ClaudexError, Result};
use crate::fanout::ConnectionRegistry;
use crate::oracle::{AgentOracle, NullOracle};
use crate::pid;
use crate::session::SessionManager;
use crate::types::DaemonConfig;

/// Run the daemon: bind the Unix socket, restore persisted sessions, and
/// accept connections until a shutdown signal arrives.
///
/// 1. Refuses to start a second instance (pid file liveness check).
/// 2. Writes the pid file and cleans up a stale socket.
/// 3. Restores every persisted session as an inactive runtime entry.
/// 4. Accepts connections, each handled on its own task, until SIGTERM/SIGINT.
/// 5. On shutdown, forces a save of every session and removes the pid/socket files.
pub async fn run_server(config: DaemonConfig, paths: ClaudexPaths) -> Result<()> {
    run_server_with_oracle(config, paths, Arc::new(NullOracle)).await
}

pub async fn run_server_with_oracle(config: DaemonConfig, paths: ClaudexPaths, oracle: Arc<dyn AgentOracle>) -> Result<()> {
    let pid_path = paths.daemon_pid_file();
    let socket_path = paths.daemon_socket();

    if let Some(existing_pid) = pid::check_daemon_running(&pid_path)? {
        return Err(ClaudexError::AlreadyRunning(existing_pid));
    }

    std::fs::create_dir_all(paths.storage_dir())?;
    pid::write_pid_file(&pid_path)?;

    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    info!(event = "server.started", pid = std::process::id(), socket = %socket_path.display());

    let fanout = Arc::new(ConnectionRegistry::new());
    let manager = SessionManager::new(config, paths, oracle, fanout);
    manager.load_persisted().await;

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown::wait_for_shutdown_signal(signal_shutdown).await;
    });

    loop {
        tokio::select! {
            accept = listener.accept() => {
                match accept {
                    Ok((stream, _addr)) => {
                        let mgr = manager.clone();
                        let shutdown_token = shutdown.clone();
                        tokio::spawn(connection::handle_connection(stream, mgr, shutdown_token));
                    }
                    Err(e) => {
                        error!(event = "server.accept_failed", error = %e);
                    }
                }
            }
            _ = shutdown.cancelled() => {
                info!(event = "server.shutdown_started");
                break;
            }
        }
    }

    manager.shutdown().await;
    cleanup(&pid_path, &socket_path);
    info!(event = "server.shutdown_completed");

    Ok(())
}

fn cleanup(pid_path: &std::path::Path, socket_path: &std::path::Path) {
    if let Err(e) = pid::remove_pid_file(pid_path) {
        error!(event = "server.pid_cleanup_failed", error = %e);
    }
    if socket_path.exists() {
        if let Err(e) = std::fs::remove_file(socket_path) {
            error!(event = "server.socket_cleanup_failed", error = %e);
        }
    }
}
