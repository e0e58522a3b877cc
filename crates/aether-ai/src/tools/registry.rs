//! Tool registry and fault-isolated execution.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use aether_common::SessionId;
use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::context::ContextProvider;
use crate::ToolDefinition;

use super::{Tool, ToolContext, ToolError, ToolExecutionResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<Tool>>>,
    provider: Arc<dyn ContextProvider>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new(provider: Arc<dyn ContextProvider>) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            provider,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a tool, replacing any existing tool with the same name.
    pub fn register(&self, tool: Tool) {
        let name = tool.name().to_string();
        let replaced = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), Arc::new(tool))
            .is_some();
        debug!(tool = %name, replaced, "tool registered");
    }

    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Definitions offered to the model, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|tool| tool.definition.clone())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Run a tool on behalf of `session`. Unknown names, handler errors,
    /// panics and timeouts all come back as failed results.
    pub async fn execute(
        &self,
        session: &SessionId,
        name: &str,
        args: &serde_json::Value,
    ) -> ToolExecutionResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "unknown tool requested");
            return ToolExecutionResult::failure(name, ToolError::NotFound(name.to_string()));
        };

        let ctx = ToolContext {
            session_id: session.clone(),
            provider: Arc::clone(&self.provider),
        };

        debug!(session = %session, tool = name, "executing tool");
        let call = AssertUnwindSafe(tool.handler.call(&ctx, args)).catch_unwind();
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(output))) => ToolExecutionResult::success(name, output),
            Ok(Ok(Err(e))) => {
                warn!(tool = name, error = %e, "tool failed");
                ToolExecutionResult::failure(name, e)
            }
            Ok(Err(panic)) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                warn!(tool = name, reason = %reason, "tool panicked");
                ToolExecutionResult::failure(name, ToolError::Execution(reason))
            }
            Err(_) => {
                warn!(tool = name, "tool timed out");
                ToolExecutionResult::failure(
                    name,
                    ToolError::Timeout {
                        tool: name.to_string(),
                        secs: self.timeout.as_secs(),
                    },
                )
            }
        }
    }

    /// Forget the session's cursor.
    pub fn release_session(&self, session: &SessionId) {
        self.provider.release(session);
    }
}
