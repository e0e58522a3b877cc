//! Synthesizing tool calls from free text.
//!
//! Some models describe the tool they want instead of calling it. When a
//! selection yields no structured calls, a `ToolCallRecovery` strategy gets
//! a chance to read the turn's prose and propose calls itself.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::{ToolCall, ToolDefinition};

pub trait ToolCallRecovery: Send + Sync {
    /// Propose calls from `texts`, restricted to `tools`.
    fn recover(&self, texts: &[&str], tools: &[ToolDefinition]) -> Vec<ToolCall>;
}

/// Calls every registered tool mentioned by name, in order of first
/// mention, each once and with empty arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct MentionRecovery;

impl ToolCallRecovery for MentionRecovery {
    fn recover(&self, texts: &[&str], tools: &[ToolDefinition]) -> Vec<ToolCall> {
        let mut mentions: Vec<((usize, usize), &str)> = Vec::new();
        for tool in tools {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(&tool.name));
            let Ok(re) = Regex::new(&pattern) else {
                continue;
            };
            let first = texts
                .iter()
                .enumerate()
                .find_map(|(i, text)| re.find(text).map(|m| (i, m.start())));
            if let Some(position) = first {
                mentions.push((position, tool.name.as_str()));
            }
        }
        mentions.sort_by_key(|(position, _)| *position);

        mentions
            .into_iter()
            .enumerate()
            .map(|(n, (_, name))| {
                debug!(tool = name, "recovered tool call from text");
                ToolCall {
                    id: format!("recovered_{n}"),
                    name: name.to_string(),
                    arguments: Value::Object(Default::default()),
                }
            })
            .collect()
    }
}
