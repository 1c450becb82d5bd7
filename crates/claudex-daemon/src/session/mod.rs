pub mod manager;
pub mod persistence;
pub mod state;

pub use manager::SessionManager;
pub use state::{ExitSender, OutputSink, Session, SessionMetadata, StatusSink};
