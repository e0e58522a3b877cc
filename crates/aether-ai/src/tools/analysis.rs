//! Built-in reverse-engineering tools.

use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::context::FunctionData;

use super::{Tool, ToolContext, ToolError, ToolHandler, ToolRegistry};

const ASSEMBLY_PREVIEW: usize = 20;
const XREF_PREVIEW: usize = 10;
const SEARCH_LIMIT: usize = 10;
const SAMPLE_SIZE: usize = 5;

const NO_FUNCTION: &str =
    "No function is currently selected. Use jump_to_function to select one.";
const NO_BINARY: &str = "No binary context available";

#[derive(Debug, Clone, Copy)]
enum Analysis {
    Pseudocode,
    Assembly,
    Variables,
    Xrefs,
    Strings,
    SearchFunctions,
    LookupAddress,
    JumpToFunction,
}

fn no_params() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

fn string_param(name: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            name: {"type": "string", "description": description}
        },
        "required": [name]
    })
}

/// The full analysis tool set.
pub fn analysis_tools() -> Vec<Tool> {
    vec![
        Tool::new(
            "get_pseudocode",
            "Get the pseudocode/decompiled code for the current function",
            no_params(),
            Analysis::Pseudocode,
        ),
        Tool::new(
            "get_assembly",
            "Get the assembly instructions for the current function",
            no_params(),
            Analysis::Assembly,
        ),
        Tool::new(
            "get_variables",
            "Get the local variables and parameters for the current function",
            no_params(),
            Analysis::Variables,
        ),
        Tool::new(
            "get_xrefs",
            "Get cross-references (incoming/outgoing calls) for the current function",
            no_params(),
            Analysis::Xrefs,
        ),
        Tool::new(
            "get_strings",
            "Get string references used by the current function",
            no_params(),
            Analysis::Strings,
        ),
        Tool::new(
            "search_functions",
            "Search for functions by name or pattern",
            string_param("query", "Function name or pattern to search for"),
            Analysis::SearchFunctions,
        ),
        Tool::new(
            "lookup_address",
            "Find which function contains a given address",
            string_param("address", "Hexadecimal address, with or without 0x prefix"),
            Analysis::LookupAddress,
        ),
        Tool::new(
            "jump_to_function",
            "Jump to and analyze a specific function",
            string_param("function_id", "Name or address of the function to jump to"),
            Analysis::JumpToFunction,
        ),
    ]
}

pub fn register_analysis_tools(registry: &ToolRegistry) {
    for tool in analysis_tools() {
        registry.register(tool);
    }
}

#[async_trait]
impl ToolHandler for Analysis {
    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<String, ToolError> {
        match self {
            Analysis::Pseudocode => Ok(with_current(ctx, pseudocode)),
            Analysis::Assembly => Ok(with_current(ctx, assembly)),
            Analysis::Variables => Ok(with_current(ctx, variables)),
            Analysis::Xrefs => Ok(with_current(ctx, xrefs)),
            Analysis::Strings => Ok(with_current(ctx, strings)),
            Analysis::SearchFunctions => {
                let query = required_str(args, "query")?;
                Ok(search_functions(&binary_functions(ctx).await, query))
            }
            Analysis::LookupAddress => {
                let address = required_str(args, "address")?;
                lookup_address(&binary_functions(ctx).await, address)
            }
            Analysis::JumpToFunction => {
                let target = required_str(args, "function_id")?;
                let functions = binary_functions(ctx).await;
                Ok(jump_to_function(ctx, &functions, target))
            }
        }
    }
}

/// The first lookup for a binary may read its list from disk.
async fn binary_functions(ctx: &ToolContext) -> Arc<Vec<FunctionData>> {
    let provider = Arc::clone(&ctx.provider);
    let session = ctx.session_id.clone();
    tokio::task::spawn_blocking(move || provider.binary_functions(&session))
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "binary function list lookup failed");
            Arc::new(Vec::new())
        })
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ToolError::InvalidArguments(format!("missing required string argument '{key}'"))
        })
}

fn with_current(ctx: &ToolContext, render: fn(&FunctionData) -> String) -> String {
    match ctx.provider.current_function(&ctx.session_id) {
        Some(data) => render(&data),
        None => NO_FUNCTION.to_string(),
    }
}

fn pseudocode(data: &FunctionData) -> String {
    if data.pseudocode.is_empty() {
        "Pseudocode not available".to_string()
    } else {
        format!("Pseudocode:\n{}", data.pseudocode)
    }
}

fn assembly(data: &FunctionData) -> String {
    if data.assembly.is_empty() {
        return "Assembly not available".to_string();
    }
    let mut out = format!("Assembly ({} instructions):\n", data.assembly.len());
    for instr in data.assembly.iter().take(ASSEMBLY_PREVIEW) {
        let _ = writeln!(out, "{}: {} {}", instr.address, instr.mnemonic, instr.operands);
    }
    if data.assembly.len() > ASSEMBLY_PREVIEW {
        let _ = write!(
            out,
            "... and {} more instructions",
            data.assembly.len() - ASSEMBLY_PREVIEW
        );
    }
    out
}

fn variables(data: &FunctionData) -> String {
    if data.variables.is_empty() {
        return "Variables not available".to_string();
    }
    let mut out = format!("Variables ({}):\n", data.variables.len());
    for var in &data.variables {
        let _ = writeln!(out, "- {} ({})", var.name, var.var_type);
    }
    out
}

fn xrefs(data: &FunctionData) -> String {
    let incoming = &data.xrefs.incoming;
    let outgoing = &data.xrefs.outgoing;
    if incoming.is_empty() && outgoing.is_empty() {
        return "Cross-references not available".to_string();
    }
    let mut out = String::from("Cross-references:\n");
    let _ = writeln!(out, "Incoming calls ({}):", incoming.len());
    for xref in incoming.iter().take(XREF_PREVIEW) {
        let _ = writeln!(out, "- {} at {}", xref.name, xref.address);
    }
    let _ = writeln!(out, "Outgoing calls ({}):", outgoing.len());
    for xref in outgoing.iter().take(XREF_PREVIEW) {
        let _ = writeln!(out, "- {} at {}", xref.name, xref.address);
    }
    out
}

fn strings(data: &FunctionData) -> String {
    if data.strings.is_empty() {
        return "Strings not available".to_string();
    }
    let mut out = format!("Strings ({}):\n", data.strings.len());
    for s in &data.strings {
        let _ = writeln!(out, "- \"{}\"", s.value);
    }
    out
}

fn sample(functions: &[FunctionData]) -> String {
    let mut out = functions
        .iter()
        .take(SAMPLE_SIZE)
        .map(|f| format!("- {} at {}", f.function_name, f.address))
        .collect::<Vec<_>>()
        .join("\n");
    if functions.len() > SAMPLE_SIZE {
        let _ = write!(out, "\n... and {} more", functions.len() - SAMPLE_SIZE);
    }
    out
}

fn search_functions(functions: &[FunctionData], query: &str) -> String {
    if functions.is_empty() {
        return NO_BINARY.to_string();
    }

    let needle = query.to_lowercase();
    let matches: Vec<&FunctionData> = functions
        .iter()
        .filter(|f| {
            f.function_name.to_lowercase().contains(&needle)
                || f.address.to_lowercase().contains(&needle)
        })
        .collect();

    if matches.is_empty() {
        return format!(
            "No functions found matching '{query}' in {} functions\nSample functions:\n{}",
            functions.len(),
            sample(functions)
        );
    }

    let mut out = format!("Found {} function(s) matching '{query}':\n", matches.len());
    for f in matches.iter().take(SEARCH_LIMIT) {
        let _ = writeln!(out, "- {} at {}", f.function_name, f.address);
    }
    out
}

fn parse_address(text: &str) -> Option<u64> {
    let digits = text
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u64::from_str_radix(digits, 16).ok()
}

fn lookup_address(functions: &[FunctionData], address: &str) -> Result<String, ToolError> {
    let target = parse_address(address)
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{address}' is not a hex address")))?;

    if functions.is_empty() {
        return Ok(NO_BINARY.to_string());
    }

    let hit = functions.iter().find_map(|f| {
        let entry = parse_address(&f.address)?;
        let end = entry.saturating_add(f.size.max(1));
        (entry..end).contains(&target).then(|| (f, target - entry))
    });

    Ok(match hit {
        Some((f, 0)) => format!("Address {address} is the entry point of {}", f.function_name),
        Some((f, offset)) => format!(
            "Address {address} is inside {} at {} (+0x{offset:x})",
            f.function_name, f.address
        ),
        None => format!("No function contains address {address}"),
    })
}

fn jump_to_function(ctx: &ToolContext, functions: &[FunctionData], target: &str) -> String {
    let binary = ctx
        .provider
        .current_function(&ctx.session_id)
        .map(|f| f.binary_name.clone())
        .unwrap_or_default();
    if functions.is_empty() {
        return NO_BINARY.to_string();
    }

    let wanted = target.to_lowercase();
    let Some(found) = functions.iter().find(|f| {
        f.function_name.to_lowercase() == wanted || f.address.to_lowercase() == wanted
    }) else {
        return format!(
            "Function '{target}' not found\nAvailable functions ({} total):\n{}",
            functions.len(),
            sample(functions)
        );
    };

    let function_id = if found.address.is_empty() {
        target.to_string()
    } else {
        found.address.clone()
    };

    if ctx.provider.summary(&function_id).is_none() {
        let mut data = found.clone();
        if data.binary_name.is_empty() {
            data.binary_name = binary;
        }
        ctx.provider.cache_function(&function_id, data);
    }
    ctx.provider.set_function(&ctx.session_id, &function_id);

    format!(
        "Jumped to function: {} at {}. You can now analyze this function with other tools.",
        found.function_name, found.address
    )
}
