use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Activity classification for a single pane or a whole session.
///
/// Variants are declared in ascending priority order: when a session
/// aggregates status across multiple panes, the pane with the
/// highest-priority status wins. `Error` always wins; `Idle` only wins
/// when nothing else is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Stopped,
    Shell,
    WaitingInput,
    Executing,
    Thinking,
    Error,
}

impl Status {
    fn rank(self) -> u8 {
        match self {
            Status::Idle => 0,
            Status::Stopped => 1,
            Status::Shell => 2,
            Status::WaitingInput => 3,
            Status::Executing => 4,
            Status::Thinking => 5,
            Status::Error => 6,
        }
    }
}

impl PartialOrd for Status {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Status {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Idle => "idle",
            Status::Stopped => "stopped",
            Status::Shell => "shell",
            Status::WaitingInput => "waiting_input",
            Status::Executing => "executing",
            Status::Thinking => "thinking",
            Status::Error => "error",
        };
        f.write_str(s)
    }
}
