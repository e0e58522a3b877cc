//! Reassembly of streamed tool-call fragments.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::{ToolCall, ToolCallDelta};

/// Argument text that did not parse as JSON once its call was complete.
#[derive(Debug, thiserror::Error)]
#[error("malformed arguments for {tool}: {reason}")]
pub struct MalformedArguments {
    pub tool: String,
    pub reason: String,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Collects `ToolCallDelta`s keyed by index and yields complete calls in
/// index order.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    partials: BTreeMap<usize, PartialCall>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: ToolCallDelta) {
        let partial = self.partials.entry(delta.index).or_default();
        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            partial.id = Some(id);
        }
        if let Some(name) = delta.name {
            partial.name.push_str(&name);
        }
        if let Some(fragment) = delta.arguments {
            partial.arguments.push_str(&fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Finish assembly. Calls that never received a name are dropped;
    /// malformed arguments are logged and replaced with `{}`.
    pub fn finish(self) -> Vec<ToolCall> {
        let mut calls = Vec::with_capacity(self.partials.len());
        for (index, partial) in self.partials {
            if partial.name.is_empty() {
                debug!(index, "dropping tool call fragment without a name");
                continue;
            }
            let arguments = match parse_arguments(&partial.name, &partial.arguments) {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, "executing tool with empty arguments");
                    Value::Object(Default::default())
                }
            };
            calls.push(ToolCall {
                id: partial
                    .id
                    .unwrap_or_else(|| format!("call_{}", aether_common::new_id())),
                name: partial.name,
                arguments,
            });
        }
        calls
    }
}

/// Parse complete argument text. Blank text means "no arguments".
pub fn parse_arguments(tool: &str, raw: &str) -> Result<Value, MalformedArguments> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| MalformedArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fragment(index: usize, name: Option<&str>, arguments: &str) -> ToolCallDelta {
        ToolCallDelta {
            index,
            id: name.map(|n| format!("id-{n}")),
            name: name.map(String::from),
            arguments: Some(arguments.to_string()),
        }
    }

    #[test]
    fn concatenates_fragments_at_one_index() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(0, Some("search_functions"), "{\"a\":1"));
        asm.push(fragment(0, None, "}"));

        let calls = asm.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search_functions");
        assert_eq!(calls[0].id, "id-search_functions");
        assert_eq!(calls[0].arguments, json!({"a": 1}));
    }

    #[test]
    fn interleaved_indices_stay_separate() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(1, Some("jump_to_function"), "{\"function_id\":"));
        asm.push(fragment(0, Some("search_functions"), "{\"query\":"));
        asm.push(fragment(1, None, "\"main\"}"));
        asm.push(fragment(0, None, "\"crypt\"}"));

        let calls = asm.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "search_functions");
        assert_eq!(calls[0].arguments, json!({"query": "crypt"}));
        assert_eq!(calls[1].name, "jump_to_function");
        assert_eq!(calls[1].arguments, json!({"function_id": "main"}));
    }

    #[test]
    fn malformed_arguments_become_empty_object() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(0, Some("get_xrefs"), "{\"broken\":"));
        let calls = asm.finish();
        assert_eq!(calls[0].arguments, json!({}));
    }

    #[test]
    fn blank_arguments_mean_no_arguments() {
        let mut asm = ToolCallAssembler::new();
        asm.push(fragment(0, Some("get_assembly"), ""));
        assert_eq!(asm.finish()[0].arguments, json!({}));
    }

    #[test]
    fn nameless_calls_are_dropped_and_ids_are_generated() {
        let mut asm = ToolCallAssembler::new();
        asm.push(ToolCallDelta {
            index: 0,
            arguments: Some("{}".into()),
            ..Default::default()
        });
        asm.push(ToolCallDelta {
            index: 1,
            name: Some("get_strings".into()),
            ..Default::default()
        });

        let calls = asm.finish();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].id.starts_with("call_"));
    }

    #[test]
    fn parse_arguments_reports_tool_name() {
        let err = parse_arguments("get_variables", "[1,").unwrap_err();
        assert_eq!(err.tool, "get_variables");
        assert!(err.to_string().starts_with("malformed arguments for get_variables"));
    }
}
