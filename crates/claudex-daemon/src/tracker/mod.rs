pub mod features;
pub mod io_window;
pub mod line;
pub mod timeout;
pub mod verdict;

use std::time::{Duration, Instant};

use claudex_protocol::Status;

use io_window::IoRateWindow;
use line::{LineEntry, LineRing};

const CONTEXT_RING_SIZE: usize = 50;
const IO_RATE_WINDOW: Duration = Duration::from_secs(2);
const CHANGE_CONFIDENCE_THRESHOLD: f64 = 0.60;

/// Per-pane classifier: maps the byte stream and timing into a `Status`
/// with a confidence score, per the hybrid output-analysis and
/// timeout-driven design.
#[derive(Debug)]
pub struct StateTracker {
    status: Status,
    confidence: f64,
    last_input_time: Option<Instant>,
    last_output_time: Option<Instant>,
    state_changed_at: Instant,
    agent_active: bool,
    io_window: IoRateWindow,
    lines: LineRing,
    partial_line: String,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            status: Status::Idle,
            confidence: 1.0,
            last_input_time: None,
            last_output_time: None,
            state_changed_at: Instant::now(),
            agent_active: false,
            io_window: IoRateWindow::new(IO_RATE_WINDOW),
            lines: LineRing::new(CONTEXT_RING_SIZE),
            partial_line: String::new(),
        }
    }

    /// Construct a tracker already in `status`, used when a pane starts in
    /// `shell` or resumes directly into `waiting_input`.
    pub fn starting_in(status: Status, agent_active: bool) -> Self {
        let mut tracker = Self::new();
        tracker.status = status;
        tracker.agent_active = agent_active;
        tracker
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn agent_active(&self) -> bool {
        self.agent_active
    }

    pub fn record_input(&mut self, now: Instant) {
        self.last_input_time = Some(now);
    }

    /// Feed a freshly decoded (UTF-8-boundary-clean) output chunk into the
    /// tracker. Returns `Some(new_status)` if the status actually changed.
    pub fn ingest(&mut self, chunk: &str, now: Instant) -> Option<Status> {
        self.last_output_time = Some(now);
        self.io_window.record(chunk.len(), now);

        self.partial_line.push_str(chunk);
        let mut remainder = String::new();
        {
            let mut parts = self.partial_line.split('\n').peekable();
            while let Some(part) = parts.next() {
                if parts.peek().is_some() {
                    self.lines.push(LineEntry::new(part));
                } else {
                    remainder = part.to_string();
                }
            }
        }
        self.partial_line = remainder;

        if self.lines.is_empty() {
            return None;
        }

        let result = verdict::analyze_state(
            &self.lines,
            &self.io_window,
            self.last_input_time,
            self.last_output_time,
            self.agent_active,
            self.status,
            now,
        );

        if result.set_agent_active {
            self.agent_active = true;
        }

        self.apply(result.verdict, now)
    }

    /// Run the timeout monitor's wall-clock rules for one tick.
    pub fn tick(&mut self, now: Instant) -> Option<Status> {
        let verdict = timeout::tick(
            self.status,
            self.state_changed_at,
            self.last_input_time,
            self.last_output_time,
            self.agent_active,
            now,
        )?;
        self.apply(verdict, now)
    }

    /// Directly install a high-confidence status from the external agent
    /// oracle, bypassing the cascade (used by the status monitor when
    /// `agent_active` and the oracle has a fresher verdict).
    pub fn apply_oracle_status(&mut self, status: Status, now: Instant) -> Option<Status> {
        self.apply(verdict::Verdict { status, confidence: 1.0 }, now)
    }

    /// Forcibly reset the tracker to a clean state (used by pane `reset`).
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Unconditionally install `status`, bypassing the confidence/strong-
    /// transition gate in `apply`. Used by pane `stop`/exit handling, where
    /// the transition must be deterministic regardless of any heuristic: a
    /// read error or explicit stop always produces a stopped status.
    pub fn force_status(&mut self, status: Status, now: Instant) -> Option<Status> {
        if status == self.status {
            return None;
        }
        self.status = status;
        self.state_changed_at = now;
        self.confidence = 1.0;
        Some(status)
    }

    fn apply(&mut self, verdict: verdict::Verdict, now: Instant) -> Option<Status> {
        self.confidence = verdict.confidence;

        if verdict.status == self.status {
            return None;
        }

        let strong = verdict::is_strong_transition(self.status, verdict.status);
        if verdict.confidence >= CHANGE_CONFIDENCE_THRESHOLD || strong {
            self.status = verdict.status;
            self.state_changed_at = now;
            Some(self.status)
        } else {
            None
        }
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tracker_starts_idle() {
        let tracker = StateTracker::new();
        assert_eq!(tracker.status(), Status::Idle);
    }

    #[test]
    fn ingest_spinner_line_transitions_to_thinking() {
        let mut tracker = StateTracker::starting_in(Status::Shell, false);
        let now = Instant::now();
        let changed = tracker.ingest("⠋ working\n", now);
        assert_eq!(changed, Some(Status::Thinking));
        assert!(tracker.agent_active());
        assert!(tracker.confidence() >= 0.90);
    }

    #[test]
    fn sticky_agent_active_resists_shell_prompt() {
        let mut tracker = StateTracker::starting_in(Status::WaitingInput, true);
        let now = Instant::now();
        tracker.ingest("user@host:~$ \n", now);
        assert_ne!(tracker.status(), Status::Shell);
    }

    #[test]
    fn partial_line_is_carried_across_ingest_calls() {
        let mut tracker = StateTracker::new();
        let now = Instant::now();
        tracker.ingest("⠋ wor", now);
        // no full line yet, so no spinner-driven transition
        assert_eq!(tracker.status(), Status::Idle);
        tracker.ingest("king\n", now);
        assert_eq!(tracker.status(), Status::Thinking);
    }

    #[test]
    fn timeout_tick_moves_thinking_to_waiting_input_after_60s() {
        let mut tracker = StateTracker::starting_in(Status::Thinking, true);
        let t0 = Instant::now();
        tracker.last_output_time = Some(t0);
        tracker.state_changed_at = t0;
        let later = t0 + Duration::from_secs(61);
        let changed = tracker.tick(later);
        assert_eq!(changed, Some(Status::WaitingInput));
    }

    #[test]
    fn clear_resets_to_idle_and_drops_agent_active() {
        let mut tracker = StateTracker::starting_in(Status::Thinking, true);
        tracker.clear();
        assert_eq!(tracker.status(), Status::Idle);
        assert!(!tracker.agent_active());
    }

    #[test]
    fn force_status_overrides_regardless_of_confidence() {
        let mut tracker = StateTracker::starting_in(Status::Thinking, true);
        let now = Instant::now();
        let changed = tracker.force_status(Status::Stopped, now);
        assert_eq!(changed, Some(Status::Stopped));
        assert_eq!(tracker.status(), Status::Stopped);
    }

    #[test]
    fn force_status_is_a_no_op_when_unchanged() {
        let mut tracker = StateTracker::starting_in(Status::Stopped, false);
        assert_eq!(tracker.force_status(Status::Stopped, Instant::now()), None);
    }

    #[test]
    fn low_confidence_verdict_does_not_change_status() {
        let mut tracker = StateTracker::starting_in(Status::Idle, false);
        let now = Instant::now();
        tracker.ingest("nothing of note here\n", now);
        // Shell(0.50) is not a strong transition from Idle and confidence < 0.60
        assert_eq!(tracker.status(), Status::Idle);
    }
}
