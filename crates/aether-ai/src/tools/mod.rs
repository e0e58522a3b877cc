//! Analysis tools the model may call.
//!
//! Every tool is a named async handler plus a JSON-schema definition.
//! Handlers receive a `ToolContext` naming the calling session, so each
//! session reads (and navigates) its own function cursor.

mod analysis;
mod registry;

pub use analysis::{analysis_tools, register_analysis_tools};
pub use registry::ToolRegistry;

use std::sync::Arc;

use aether_common::SessionId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ContextProvider;
use crate::ToolDefinition;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Execution(String),
    #[error("Tool {tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

/// What a handler can see about the call.
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: SessionId,
    pub provider: Arc<dyn ContextProvider>,
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: &ToolContext, args: &serde_json::Value) -> Result<String, ToolError>;
}

/// A definition paired with its handler.
pub struct Tool {
    pub definition: ToolDefinition,
    pub(crate) handler: Arc<dyn ToolHandler>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// Outcome of one execution. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tool: String,
    pub timestamp: DateTime<Utc>,
}

impl ToolExecutionResult {
    pub fn success(tool: &str, result: String) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            tool: tool.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(tool: &str, error: impl ToString) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
            tool: tool.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Text fed back to the model as the tool message.
    pub fn to_message_content(&self) -> String {
        let body = if self.success {
            self.result.as_deref().unwrap_or_default().to_string()
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("unknown error"))
        };
        format!("[Tool Result: {}]\n{}", self.tool, body)
    }
}
