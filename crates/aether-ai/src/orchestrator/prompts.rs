//! Instructions for each phase of a turn.

use crate::ToolDefinition;

pub const SYSTEM_PROMPT: &str = "You are an AI assistant helping with reverse engineering. \
You have access to the current function's context and previous conversation history. \
Please provide clear and concise responses focusing on the reverse engineering aspects.";

const PLAN: &str = "Before doing anything else, state in two or three sentences how you will \
answer the user's last message and which of the available tools, if any, you expect to need. \
Do not answer the question yet.";

const REASON: &str = "Think step by step about what you know so far and what is still missing \
to answer the user's last message. If more information is needed, name the tool that would \
provide it. Do not call any tools in this step.";

const SELECT: &str = "Call the single most useful tool for the next step. If you already have \
everything needed to answer, do not call any tool and reply briefly that you are ready.";

const SUMMARIZE: &str = "Using the tool results above, give a comprehensive answer to the \
user's last message. Cite the evidence you gathered (addresses, names, strings, code) and say \
plainly where the evidence is incomplete.";

pub fn plan(tools: &[ToolDefinition]) -> String {
    format!("{PLAN}\n\n{}", catalog(tools))
}

pub fn reason(tools: &[ToolDefinition]) -> String {
    format!("{REASON}\n\n{}", catalog(tools))
}

pub fn select() -> &'static str {
    SELECT
}

pub fn summarize() -> &'static str {
    SUMMARIZE
}

pub fn truncation_notice(max_iterations: u32) -> String {
    format!(
        "[Stopped after {max_iterations} tool calls. The answer above may be incomplete; ask a follow-up to continue.]"
    )
}

/// Marker shown to the caller when a tool runs.
pub fn tool_call_marker(name: &str, arguments: &serde_json::Value) -> String {
    format!("calling {name}({arguments})")
}

fn catalog(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return "No tools are available.".to_string();
    }
    let lines: Vec<String> = tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect();
    format!("Available tools:\n{}", lines.join("\n"))
}
