//! Function data as produced by the extractor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Accept either a JSON string or number and keep it as text. Offsets and
/// addresses arrive in both shapes depending on the extractor version.
fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instruction {
    #[serde(deserialize_with = "text_or_number")]
    pub address: String,
    pub mnemonic: String,
    pub operands: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: String,
    #[serde(deserialize_with = "text_or_number")]
    pub offset: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefEntry {
    pub name: String,
    #[serde(deserialize_with = "text_or_number")]
    pub address: String,
    #[serde(deserialize_with = "text_or_number")]
    pub offset: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Xrefs {
    pub incoming: Vec<XrefEntry>,
    pub outgoing: Vec<XrefEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringRef {
    pub value: String,
    #[serde(deserialize_with = "text_or_number")]
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfgNode {
    #[serde(deserialize_with = "text_or_number")]
    pub address: String,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfgEdge {
    #[serde(deserialize_with = "text_or_number")]
    pub source: String,
    #[serde(deserialize_with = "text_or_number")]
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cfg {
    pub nodes: Vec<CfgNode>,
    pub edges: Vec<CfgEdge>,
}

/// Everything known about one function. Missing fields default, so both
/// the extractor's list entries (`name`, `instructions`) and explicitly
/// pushed context (`function_name`, `assembly`) deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionData {
    #[serde(alias = "name")]
    pub function_name: String,
    #[serde(deserialize_with = "text_or_number")]
    pub address: String,
    pub binary_name: String,
    /// Body size in bytes.
    pub size: u64,
    pub signature: String,
    pub pseudocode: String,
    #[serde(alias = "instructions")]
    pub assembly: Vec<Instruction>,
    pub variables: Vec<Variable>,
    pub xrefs: Xrefs,
    pub strings: Vec<StringRef>,
    pub cfg: Cfg,
}

/// The subset of a function selected by `ContextFields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunctionContext {
    pub function_name: String,
    pub address: String,
    pub binary_name: String,
    pub pseudocode: Option<String>,
    pub assembly: Option<Vec<Instruction>>,
    pub variables: Option<Vec<Variable>>,
    pub xrefs: Option<Xrefs>,
    pub strings: Option<Vec<StringRef>>,
    pub cfg: Option<Cfg>,
}

impl FunctionContext {
    /// Replace cached pseudocode with what the operator is currently
    /// looking at. Applies only when pseudocode was requested.
    pub fn with_pseudocode_override(mut self, pseudocode: Option<&str>) -> Self {
        if let (Some(current), Some(text)) = (self.pseudocode.as_mut(), pseudocode) {
            *current = text.to_string();
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableData {
    pub assembly: usize,
    pub variables: usize,
    pub strings: usize,
    pub xrefs_incoming: usize,
    pub xrefs_outgoing: usize,
    pub cfg_nodes: usize,
    pub cfg_edges: usize,
    pub has_pseudocode: bool,
}

/// What is cached for one function, without the data itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSummary {
    pub function_id: String,
    pub function_name: String,
    pub address: String,
    pub binary_name: String,
    pub available_data: AvailableData,
    pub cached_at: DateTime<Utc>,
}

impl ContextSummary {
    pub fn new(function_id: &str, data: &FunctionData, cached_at: DateTime<Utc>) -> Self {
        Self {
            function_id: function_id.to_string(),
            function_name: data.function_name.clone(),
            address: data.address.clone(),
            binary_name: data.binary_name.clone(),
            available_data: AvailableData {
                assembly: data.assembly.len(),
                variables: data.variables.len(),
                strings: data.strings.len(),
                xrefs_incoming: data.xrefs.incoming.len(),
                xrefs_outgoing: data.xrefs.outgoing.len(),
                cfg_nodes: data.cfg.nodes.len(),
                cfg_edges: data.cfg.edges.len(),
                has_pseudocode: !data.pseudocode.is_empty(),
            },
            cached_at,
        }
    }
}
