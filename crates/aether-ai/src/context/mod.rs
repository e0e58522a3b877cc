//! Cached function data and the per-session analysis cursor.
//!
//! A `ContextProvider` owns what the disassembler extracted for each
//! function and which function every session is currently looking at.
//! Tools and manual-mode prompts read through it; only navigation moves
//! a cursor.

mod memory;
mod prompt;
mod types;

pub use memory::InMemoryContextProvider;
pub use prompt::render_context_prompt;
pub use types::*;

use std::collections::HashMap;
use std::sync::Arc;

use aether_common::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("unexpected function list format in {0}")]
    Format(String),
}

/// Which optional sections to include when building context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFields {
    pub pseudocode: bool,
    pub assembly: bool,
    pub variables: bool,
    pub xrefs: bool,
    pub strings: bool,
    pub cfg: bool,
}

impl ContextFields {
    pub fn all() -> Self {
        Self {
            pseudocode: true,
            assembly: true,
            variables: true,
            xrefs: true,
            strings: true,
            cfg: true,
        }
    }

    /// Build from caller toggles such as `{"assembly": true}`. Unknown keys
    /// are ignored.
    pub fn from_toggles(toggles: &HashMap<String, bool>) -> Self {
        let on = |key: &str| toggles.get(key).copied().unwrap_or(false);
        Self {
            pseudocode: on("pseudocode"),
            assembly: on("assembly"),
            variables: on("variables"),
            xrefs: on("xrefs"),
            strings: on("strings"),
            cfg: on("cfg"),
        }
    }
}

pub trait ContextProvider: Send + Sync {
    /// Context for the session's current function, restricted to `fields`.
    fn get_context(&self, session: &SessionId, fields: &ContextFields) -> Option<FunctionContext>;

    /// The full cached record behind the session's cursor.
    fn current_function(&self, session: &SessionId) -> Option<Arc<FunctionData>>;

    /// Point the session's cursor at `function_id`.
    fn set_function(&self, session: &SessionId, function_id: &str);

    /// Drop the session's cursor.
    fn release(&self, session: &SessionId);

    /// Every function of the binary the session's current function belongs to.
    fn binary_functions(&self, session: &SessionId) -> Arc<Vec<FunctionData>>;

    fn cache_function(&self, function_id: &str, data: FunctionData);

    fn summary(&self, function_id: &str) -> Option<ContextSummary>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_map_to_fields() {
        let toggles: HashMap<String, bool> = [
            ("assembly".to_string(), true),
            ("strings".to_string(), false),
            ("notes".to_string(), true),
        ]
        .into_iter()
        .collect();
        let fields = ContextFields::from_toggles(&toggles);
        assert!(fields.assembly);
        assert!(!fields.strings);
        assert!(!fields.pseudocode);
        assert_eq!(ContextFields::from_toggles(&HashMap::new()), ContextFields::default());
    }
}
