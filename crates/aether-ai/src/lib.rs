//! Conversation engine for interactive binary analysis.
//!
//! Provides:
//! - An OpenAI-compatible streaming completion client
//! - Indexed tool-call delta reassembly
//! - Read-only analysis tools bound to a per-session function cursor
//! - Session storage with background title generation
//! - Sliding-window admission control
//! - The phase-driven tool loop that turns one message into a streamed answer

pub mod context;
pub mod delta;
pub mod openai;
pub mod orchestrator;
pub mod rate_limit;
pub mod session;
pub mod streaming;
pub mod tools;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use context::{ContextFields, ContextProvider, FunctionData, InMemoryContextProvider};
pub use delta::ToolCallAssembler;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use orchestrator::{ChatRequest, Orchestrator, OutputEvent, ToolUsePolicy};
pub use rate_limit::{AdmissionError, RateLimiter};
pub use session::{Session, SessionStore};
pub use tools::{ToolExecutionResult, ToolRegistry};

/// Receiving half of a streamed completion. The stream is finished when the
/// channel closes; dropping the receiver cancels the request.
pub type DeltaStream = mpsc::Receiver<Result<Delta, AiError>>;

/// A stateless streaming completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Fail fast when credentials are missing.
    fn ensure_configured(&self) -> Result<(), AiError>;

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, AiError>;

    /// Run a request to completion and return only its text.
    async fn complete_text(&self, request: CompletionRequest) -> Result<String, AiError> {
        let mut rx = self.stream(request).await?;
        let mut text = String::new();
        while let Some(delta) = rx.recv().await {
            if let Delta::Text(chunk) = delta? {
                text.push_str(&chunk);
            }
        }
        Ok(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A fully assembled tool invocation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Whether the model may, must, or must not call tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    None,
    #[default]
    Auto,
    Required,
}

impl ToolChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolChoice::None => "none",
            ToolChoice::Auto => "auto",
            ToolChoice::Required => "required",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    /// Overrides the client's configured token cap.
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = choice;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// One incremental piece of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    Text(String),
    ToolCall(ToolCallDelta),
}

/// A fragment of a tool call. Fragments sharing an `index` belong to the
/// same call; `arguments` pieces are concatenated in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("{0}")]
    NotConfigured(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout")]
    Timeout,
}

impl AiError {
    /// Credential problems the operator has to fix, as opposed to transient
    /// service failures.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AiError::NotConfigured(_) | AiError::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::tool("x")).unwrap();
        assert_eq!(json, r#"{"role":"tool","content":"x"}"#);
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(AiError::NotConfigured("no key".into()).is_configuration());
        assert!(AiError::Unauthorized("bad key".into()).is_configuration());
        assert!(!AiError::RateLimited.is_configuration());
        assert!(!AiError::NetworkError("reset".into()).is_configuration());
    }

    #[test]
    fn tool_choice_wire_names() {
        assert_eq!(ToolChoice::None.as_str(), "none");
        assert_eq!(ToolChoice::Auto.as_str(), "auto");
        assert_eq!(ToolChoice::Required.as_str(), "required");
    }

    struct Canned(Vec<Delta>);

    #[async_trait]
    impl CompletionClient for Canned {
        fn ensure_configured(&self) -> Result<(), AiError> {
            Ok(())
        }

        async fn stream(&self, _request: CompletionRequest) -> Result<DeltaStream, AiError> {
            let (tx, rx) = mpsc::channel(self.0.len() + 1);
            for delta in &self.0 {
                tx.try_send(Ok(delta.clone())).unwrap();
            }
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn complete_text_ignores_tool_fragments() {
        let client = Canned(vec![
            Delta::Text("Hello".into()),
            Delta::ToolCall(ToolCallDelta {
                index: 0,
                name: Some("get_strings".into()),
                ..Default::default()
            }),
            Delta::Text(", world".into()),
        ]);
        let text = client
            .complete_text(CompletionRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(text, "Hello, world");
    }
}
