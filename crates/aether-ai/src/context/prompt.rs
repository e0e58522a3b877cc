//! Rendering of function context as a system prompt.

use std::fmt::Write;

use super::FunctionContext;

/// Render the selected context. Sections that were not requested or are
/// empty are left out.
pub fn render_context_prompt(ctx: &FunctionContext) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Function Context:");
    let _ = writeln!(out, "- Name: {}", ctx.function_name);
    let _ = writeln!(out, "- Address: {}", ctx.address);
    if !ctx.binary_name.is_empty() {
        let _ = writeln!(out, "- Binary: {}", ctx.binary_name);
    }

    if let Some(pseudocode) = ctx.pseudocode.as_deref().filter(|p| !p.is_empty()) {
        let _ = writeln!(out, "\nPseudocode Analysis:\n{pseudocode}");
    }

    if let Some(assembly) = ctx.assembly.as_ref().filter(|a| !a.is_empty()) {
        let _ = writeln!(out, "\nAssembly Instructions:");
        for instr in assembly {
            let _ = writeln!(out, "{}: {} {}", instr.address, instr.mnemonic, instr.operands);
        }
    }

    if let Some(variables) = ctx.variables.as_ref().filter(|v| !v.is_empty()) {
        let _ = writeln!(out, "\nLocal Variables:");
        for var in variables {
            let _ = writeln!(out, "- {} ({}) at offset {}", var.name, var.var_type, var.offset);
        }
    }

    if let Some(xrefs) = &ctx.xrefs {
        if !xrefs.incoming.is_empty() {
            let _ = writeln!(out, "\nIncoming References:");
            for xref in &xrefs.incoming {
                let _ = writeln!(out, "- {} at {} (offset: {})", xref.name, xref.address, xref.offset);
            }
        }
        if !xrefs.outgoing.is_empty() {
            let _ = writeln!(out, "\nOutgoing References:");
            for xref in &xrefs.outgoing {
                let _ = writeln!(out, "- {} at {} (offset: {})", xref.name, xref.address, xref.offset);
            }
        }
    }

    if let Some(strings) = ctx.strings.as_ref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "\nString References:");
        for s in strings {
            let _ = writeln!(out, "- {} at {}", s.value, s.address);
        }
    }

    if let Some(cfg) = ctx.cfg.as_ref().filter(|c| !c.nodes.is_empty()) {
        let _ = writeln!(out, "\nControl Flow Graph:");
        for node in &cfg.nodes {
            let _ = writeln!(out, "\nNode at {}:", node.address);
            for instr in &node.instructions {
                let _ = writeln!(out, "  {} {}", instr.mnemonic, instr.operands);
            }
        }
        let _ = writeln!(out, "\nEdges:");
        for edge in &cfg.edges {
            let _ = writeln!(out, "- {} -> {}", edge.source, edge.target);
        }
    }

    out
}
