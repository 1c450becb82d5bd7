use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wait for SIGTERM or SIGINT/Ctrl-C, then cancel `token` so every task
/// selecting on it unwinds.
pub async fn wait_for_shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(event = "server.sigterm_register_failed", error = %e);
                let _ = ctrl_c.await;
                info!(event = "server.signal_received", signal = "SIGINT");
                token.cancel();
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => {
                info!(event = "server.signal_received", signal = "SIGINT");
            }
            _ = sigterm.recv() => {
                info!(event = "server.signal_received", signal = "SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!(event = "server.signal_received", signal = "SIGINT");
    }

    token.cancel();
}
