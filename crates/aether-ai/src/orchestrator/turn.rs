//! Per-turn state.

use std::collections::VecDeque;
use std::fmt;

use crate::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Plan,
    Reason,
    SelectTools,
    Recovery,
    Execute,
    Summarize,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Plan => "plan",
            Phase::Reason => "reason",
            Phase::SelectTools => "select_tools",
            Phase::Recovery => "recovery",
            Phase::Execute => "execute",
            Phase::Summarize => "summarize",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Mutable state of one turn. `reply` only ever holds text from phases
/// that finished streaming.
#[derive(Debug)]
pub(crate) struct Turn {
    pub phase: Phase,
    pub iterations: u32,
    pub selections: u32,
    pub reply: String,
    pub pending: VecDeque<ToolCall>,
    pub tools_used: usize,
    pub truncated: bool,
}

impl Turn {
    pub fn new() -> Self {
        Self {
            phase: Phase::Plan,
            iterations: 0,
            selections: 0,
            reply: String::new(),
            pending: VecDeque::new(),
            tools_used: 0,
            truncated: false,
        }
    }

    pub fn enter(&mut self, phase: Phase) {
        tracing::trace!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    pub fn commit(&mut self, text: &str) {
        self.reply.push_str(text);
    }
}
