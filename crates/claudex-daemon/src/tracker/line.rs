use std::collections::VecDeque;
use std::time::Instant;

use super::features;

/// One decoded output line plus the features computed once at ingest.
#[derive(Debug, Clone)]
pub struct LineEntry {
    pub text: String,
    pub has_spinner: bool,
    pub has_tool_pattern: bool,
    pub has_agent_ui: bool,
    pub has_shell_prompt: bool,
    pub at: Instant,
}

impl LineEntry {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            has_spinner: features::has_spinner(&text),
            has_tool_pattern: features::has_tool_pattern(&text),
            has_agent_ui: features::has_agent_ui(&text),
            has_shell_prompt: features::has_shell_prompt(&text),
            text,
            at: Instant::now(),
        }
    }
}

/// Bounded ring of up to `CAPACITY` recent lines, oldest evicted first.
#[derive(Debug)]
pub struct LineRing {
    entries: VecDeque<LineEntry>,
    capacity: usize,
}

impl LineRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: LineEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &LineEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineEntry> {
        self.entries.iter()
    }

    /// Index (within the full window) of the last line matching `pred`,
    /// or `None` if no line matches.
    pub fn last_index_where(&self, pred: impl Fn(&LineEntry) -> bool) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .find(|(_, e)| pred(e))
            .map(|(i, _)| i)
    }
}
