use tracing::{error, info};

fn main() {
    claudex_daemon::init_logging();
    info!(event = "daemon.start_started");

    let exit_code = match run() {
        Ok(()) => {
            info!(event = "daemon.start_completed");
            0
        }
        Err(e) => {
            error!(event = "daemon.start_failed", error = %e);
            eprintln!("claudex-daemon: {e}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run() -> claudex_daemon::Result<()> {
    eprintln!("Starting claudex-daemon in foreground (pid {})...", std::process::id());

    let paths = claudex_paths::ClaudexPaths::resolve()?;
    let config = claudex_daemon::load_daemon_config(&paths.user_config());

    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        error!(event = "daemon.runtime_init_failed", error = %e);
        e
    })?;

    rt.block_on(claudex_daemon::run_server(config, paths))
}
