//! Conversation engine tuning.

use serde::{Deserialize, Serialize};

/// Tool-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum tool executions per turn (valid range: 1-20).
    pub max_iterations: u32,
    /// Per-tool execution timeout in seconds (valid range: 1-300).
    pub tool_timeout_secs: u32,
    /// Case-insensitive phrases that mark a message as needing tools.
    pub intent_keywords: Vec<String>,
    /// How many keywords must match before tool use is required.
    pub intent_min_matches: u32,
    /// Channel capacity between a turn and its caller.
    pub event_buffer: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            tool_timeout_secs: 30,
            intent_keywords: [
                "analyze",
                "analyse",
                "pseudocode",
                "assembly",
                "disassembl",
                "decompil",
                "xref",
                "cross-ref",
                "caller",
                "callee",
                "string",
                "variable",
                "search",
                "find",
                "jump",
                "look at",
                "what does",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            intent_min_matches: 1,
            event_buffer: 64,
        }
    }
}
