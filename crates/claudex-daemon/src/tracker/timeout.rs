use std::time::{Duration, Instant};

use claudex_protocol::Status;

use super::verdict::Verdict;

/// Evaluate the wall-clock timeout rules for one monitor tick. Returns
/// `None` when no rule fires (including always, for `Stopped`/`Error`/`Idle`,
/// which the timeout monitor never touches).
#[allow(clippy::too_many_arguments)]
pub fn tick(
    current: Status,
    state_changed_at: Instant,
    last_input_time: Option<Instant>,
    last_output_time: Option<Instant>,
    agent_active: bool,
    now: Instant,
) -> Option<Verdict> {
    match current {
        Status::Stopped | Status::Error | Status::Idle => None,

        Status::Thinking => {
            let since_output = last_output_time.map(|t| now.saturating_duration_since(t));
            if since_output.is_none_or(|d| d > Duration::from_secs(60)) {
                Some(Verdict { status: Status::WaitingInput, confidence: 0.60 })
            } else {
                None
            }
        }

        Status::Executing => {
            if now.saturating_duration_since(state_changed_at) > Duration::from_secs(5 * 60) {
                Some(Verdict { status: Status::WaitingInput, confidence: 0.50 })
            } else {
                None
            }
        }

        Status::Shell | Status::WaitingInput => {
            let Some(input_at) = last_input_time else {
                return None;
            };
            let since_input = now.saturating_duration_since(input_at);
            let input_after_output = last_output_time.is_none_or(|o| input_at > o);
            if since_input > Duration::from_millis(500)
                && since_input < Duration::from_secs(5)
                && input_after_output
                && agent_active
            {
                Some(Verdict { status: Status::Thinking, confidence: 0.70 })
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_acts_on_terminal_statuses() {
        let now = Instant::now();
        for s in [Status::Stopped, Status::Error, Status::Idle] {
            assert!(tick(s, now, None, None, true, now).is_none());
        }
    }

    #[test]
    fn thinking_times_out_after_60s_of_silence() {
        let changed = Instant::now();
        let output_at = changed;
        let now = changed + Duration::from_secs(61);
        let result = tick(Status::Thinking, changed, None, Some(output_at), true, now);
        assert_eq!(result.unwrap().status, Status::WaitingInput);
    }

    #[test]
    fn thinking_stays_within_60s() {
        let changed = Instant::now();
        let output_at = changed;
        let now = changed + Duration::from_secs(30);
        assert!(tick(Status::Thinking, changed, None, Some(output_at), true, now).is_none());
    }

    #[test]
    fn executing_times_out_after_5min() {
        let changed = Instant::now();
        let now = changed + Duration::from_secs(301);
        let result = tick(Status::Executing, changed, None, None, true, now);
        assert_eq!(result.unwrap().status, Status::WaitingInput);
    }

    #[test]
    fn shell_transitions_to_thinking_shortly_after_input() {
        let changed = Instant::now();
        let input_at = changed;
        let now = changed + Duration::from_secs(1);
        let result = tick(Status::Shell, changed, Some(input_at), None, true, now);
        assert_eq!(result.unwrap().status, Status::Thinking);
    }

    #[test]
    fn shell_does_not_transition_without_agent_active() {
        let changed = Instant::now();
        let input_at = changed;
        let now = changed + Duration::from_secs(1);
        assert!(tick(Status::Shell, changed, Some(input_at), None, false, now).is_none());
    }

    #[test]
    fn shell_does_not_transition_too_soon_after_input() {
        let changed = Instant::now();
        let input_at = changed;
        let now = changed + Duration::from_millis(100);
        assert!(tick(Status::Shell, changed, Some(input_at), None, true, now).is_none());
    }
}
