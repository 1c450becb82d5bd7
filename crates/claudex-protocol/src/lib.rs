pub mod control;
pub mod layout;
pub mod messages;
pub mod status;
pub mod wire;

pub use control::{ClientState, ControlRequest, ControlResponse, SessionSummary};
pub use layout::{LayoutNode, SplitDirection};
pub use messages::{ClientMessage, DaemonMessage, WindowSize};
pub use status::Status;
pub use wire::{IncomingMessage, OutgoingMessage};
