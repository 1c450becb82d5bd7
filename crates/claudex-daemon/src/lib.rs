pub mod client_state;
pub mod codec;
pub mod errors;
pub mod fanout;
pub mod oracle;
pub mod pid;
pub mod pty;
pub mod server;
pub mod session;
pub mod tracker;
pub mod types;

pub use claudex_protocol::{ClientMessage, DaemonMessage};
pub use errors::{ClaudexError, Result};
pub use server::run_server;
pub use session::SessionManager;
pub use types::{load_daemon_config, DaemonConfig, DaemonStatus};

/// Install the process-wide `tracing` subscriber: JSON-formatted events to
/// stderr, level controlled by `RUST_LOG` (defaulting to `info`).
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().json().with_env_filter(filter).with_target(true).init();
}
