use std::time::Instant;

use claudex_protocol::Status;

use super::features;
use super::io_window::IoRateWindow;
use super::line::LineRing;

/// A classification result: the proposed status and how sure we are.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub status: Status,
    pub confidence: f64,
}

impl Verdict {
    fn new(status: Status, confidence: f64) -> Self {
        Self { status, confidence }
    }
}

/// The context verdict over the full line window. May request that
/// `agent_active` be set (the caller owns the sticky flag).
pub struct ContextVerdict {
    pub verdict: Verdict,
    pub set_agent_active: bool,
}

/// Evaluate the context verdict described in the state tracker design:
/// spinners and tool patterns win outright; otherwise the sticky
/// `agent_active` flag disambiguates a trailing shell prompt from a
/// false positive inside agent tool output.
pub fn context_verdict(ring: &LineRing, agent_active: bool) -> ContextVerdict {
    if ring.iter().any(|l| l.has_spinner) {
        return ContextVerdict {
            verdict: Verdict::new(Status::Thinking, 0.85),
            set_agent_active: false,
        };
    }
    if ring.iter().any(|l| l.has_tool_pattern) {
        return ContextVerdict {
            verdict: Verdict::new(Status::Executing, 0.80),
            set_agent_active: false,
        };
    }

    let last_agent_ui = ring.last_index_where(|l| l.has_agent_ui);
    let last_shell_prompt = ring.last_index_where(|l| l.has_shell_prompt);

    let prompt_confidence = |ring: &LineRing| -> f64 {
        match ring.iter().last() {
            Some(last) if features::looks_like_agent_prompt(&last.text) => 0.85,
            _ => 0.70,
        }
    };

    if agent_active {
        return ContextVerdict {
            verdict: Verdict::new(Status::WaitingInput, prompt_confidence(ring)),
            set_agent_active: false,
        };
    }

    match (last_agent_ui, last_shell_prompt) {
        (Some(ui), shell) if shell.is_none_or(|s| ui > s) => ContextVerdict {
            verdict: Verdict::new(Status::WaitingInput, prompt_confidence(ring)),
            set_agent_active: true,
        },
        (ui, Some(shell)) if ui.is_none_or(|u| shell > u) => ContextVerdict {
            verdict: Verdict::new(Status::Shell, 0.80),
            set_agent_active: false,
        },
        _ => ContextVerdict {
            verdict: Verdict::new(Status::Shell, 0.50),
            set_agent_active: false,
        },
    }
}

/// Evaluate the I/O-behavior verdict over the rolling byte-rate window.
#[allow(clippy::too_many_arguments)]
pub fn io_behavior_verdict(
    io_window: &IoRateWindow,
    last_input_time: Option<Instant>,
    last_output_time: Option<Instant>,
    agent_active: bool,
    current: Status,
    now: Instant,
) -> Verdict {
    if io_window.bytes_per_second(now) > 1000.0 {
        return Verdict::new(Status::Executing, 0.75);
    }

    if agent_active {
        if let (Some(input_at), output_at) = (last_input_time, last_output_time) {
            let input_is_recent = now.saturating_duration_since(input_at) < std::time::Duration::from_secs(10);
            let input_after_output = output_at.is_none_or(|o| input_at > o);
            if input_is_recent && input_after_output {
                return Verdict::new(Status::Thinking, 0.65);
            }
        }

        if let Some(output_at) = last_output_time {
            if now.saturating_duration_since(output_at) > std::time::Duration::from_secs(5) {
                return Verdict::new(Status::WaitingInput, 0.60);
            }
        }
    }

    Verdict::new(current, 0.30)
}

/// Result of a single chunk classification, including whether the sticky
/// `agent_active` flag should be (or should stay) set.
pub struct AnalysisResult {
    pub verdict: Verdict,
    pub set_agent_active: bool,
}

/// The `analyze_state` cascade: spinner/tool short-circuits over the last 5
/// lines, then context, then I/O-rate, then agreement, then a low-confidence
/// hold at the current status.
#[allow(clippy::too_many_arguments)]
pub fn analyze_state(
    ring: &LineRing,
    io_window: &IoRateWindow,
    last_input_time: Option<Instant>,
    last_output_time: Option<Instant>,
    agent_active: bool,
    current: Status,
    now: Instant,
) -> AnalysisResult {
    if ring.tail(5).any(|l| l.has_spinner) {
        return AnalysisResult {
            verdict: Verdict::new(Status::Thinking, 0.95),
            set_agent_active: true,
        };
    }
    if ring.tail(5).any(|l| l.has_tool_pattern) {
        return AnalysisResult {
            verdict: Verdict::new(Status::Executing, 0.90),
            set_agent_active: true,
        };
    }

    let context = context_verdict(ring, agent_active);
    if context.verdict.confidence >= 0.80 {
        return AnalysisResult {
            verdict: context.verdict,
            set_agent_active: context.set_agent_active,
        };
    }

    let io = io_behavior_verdict(io_window, last_input_time, last_output_time, agent_active, current, now);
    if io.confidence >= 0.70 {
        return AnalysisResult {
            verdict: io,
            set_agent_active: false,
        };
    }

    if context.verdict.confidence >= 0.50 && io.confidence >= 0.50 && context.verdict.status == io.status {
        return AnalysisResult {
            verdict: Verdict::new(context.verdict.status, (context.verdict.confidence + io.confidence) / 2.0),
            set_agent_active: context.set_agent_active,
        };
    }

    if context.verdict.confidence >= 0.50 {
        return AnalysisResult {
            verdict: context.verdict,
            set_agent_active: context.set_agent_active,
        };
    }

    AnalysisResult {
        verdict: Verdict::new(current, 0.40),
        set_agent_active: false,
    }
}

/// Strong transitions are permitted even below the usual confidence
/// threshold because their direction is known correct whenever any
/// evidence supports them.
pub fn is_strong_transition(from: Status, to: Status) -> bool {
    matches!(
        (from, to),
        (Status::Shell, Status::Thinking)
            | (Status::Shell, Status::Executing)
            | (Status::Shell, Status::WaitingInput)
            | (Status::Thinking, Status::WaitingInput)
            | (Status::Executing, Status::WaitingInput)
    )
}
