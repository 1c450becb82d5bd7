pub mod cwd;
pub mod pane;
pub mod read_loop;
pub mod scrollback;

pub use pane::PtyPane;
pub use read_loop::PtyExitEvent;
pub use scrollback::{PtyOutputBroadcaster, ScrollbackBuffer};
