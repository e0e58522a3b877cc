//! The turn engine.

use std::collections::HashMap;
use std::sync::Arc;

use aether_common::SessionId;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::context::{render_context_prompt, ContextFields, ContextProvider};
use crate::delta::ToolCallAssembler;
use crate::rate_limit::RateLimiter;
use crate::session::{SessionError, SessionStore};
use crate::tools::ToolRegistry;
use crate::{
    AiError, CompletionClient, CompletionRequest, Delta, Message, Role, ToolCall, ToolChoice,
};

use super::events::{ErrorType, OutputEvent};
use super::intent::ToolUsePolicy;
use super::prompts;
use super::recovery::{MentionRecovery, ToolCallRecovery};
use super::turn::{Phase, Turn};

const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Content the operator's view holds right now, overriding the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DynamicContent {
    #[serde(default)]
    pub pseudocode: Option<String>,
}

/// One inbound chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub function_id: Option<String>,
    #[serde(default)]
    pub use_ai_tools: bool,
    #[serde(default)]
    pub toggle_states: HashMap<String, bool>,
    #[serde(default)]
    pub dynamic_content: Option<DynamicContent>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn for_function(mut self, function_id: impl Into<String>) -> Self {
        self.function_id = Some(function_id.into());
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.use_ai_tools = true;
        self
    }

    pub fn with_toggle(mut self, field: impl Into<String>, on: bool) -> Self {
        self.toggle_states.insert(field.into(), on);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The event receiver was dropped; the caller is gone.
    #[error("caller disconnected")]
    Disconnected,

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// How a turn ended, for the caller's bookkeeping. Everything user-facing
/// has already been sent as events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed {
        session_id: SessionId,
        tools_executed: usize,
        truncated: bool,
    },
    RateLimited,
    Failed {
        session_id: SessionId,
        error_type: ErrorType,
    },
}

/// Why a turn stopped early.
enum Abort {
    Completion(AiError),
    Caller(TurnError),
}

impl From<TurnError> for Abort {
    fn from(e: TurnError) -> Self {
        Abort::Caller(e)
    }
}

/// How streamed text is shown while a phase runs.
#[derive(Debug, Clone, Copy)]
enum Show {
    Reply,
    Thinking,
}

struct PhaseOutput {
    text: String,
    calls: Vec<ToolCall>,
}

struct Emitter<'a> {
    tx: &'a mpsc::Sender<OutputEvent>,
    session: SessionId,
}

impl Emitter<'_> {
    async fn send(&self, event: OutputEvent) -> Result<(), TurnError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| TurnError::Disconnected)
    }

    async fn text(&self, display: Show, text: &str) -> Result<(), TurnError> {
        let event = match display {
            Show::Reply => OutputEvent::reply(&self.session, text),
            Show::Thinking => OutputEvent::thinking(&self.session, text),
        };
        self.send(event).await
    }
}

/// Drives turns against shared sessions, tools and admission control.
pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    sessions: SessionStore,
    tools: Arc<ToolRegistry>,
    limiter: Arc<RateLimiter>,
    provider: Arc<dyn ContextProvider>,
    policy: ToolUsePolicy,
    recovery: Arc<dyn ToolCallRecovery>,
    max_iterations: u32,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        sessions: SessionStore,
        tools: Arc<ToolRegistry>,
        limiter: Arc<RateLimiter>,
        provider: Arc<dyn ContextProvider>,
    ) -> Self {
        Self {
            client,
            sessions,
            tools,
            limiter,
            provider,
            policy: ToolUsePolicy::default(),
            recovery: Arc::new(MentionRecovery),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_policy(mut self, policy: ToolUsePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_recovery(mut self, recovery: Arc<dyn ToolCallRecovery>) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Run one turn, streaming events into `tx`. The caller closes its
    /// stream (with `[DONE]`) once this returns.
    pub async fn handle(
        &self,
        request: ChatRequest,
        tx: &mpsc::Sender<OutputEvent>,
    ) -> Result<TurnOutcome, TurnError> {
        if let Err(e) = self.limiter.admit() {
            warn!(error = %e, "chat request rejected");
            let event = OutputEvent {
                reply: Some(format!("Rate limit exceeded. Please try again later. {e}")),
                session_id: request.session_id.clone(),
                ..Default::default()
            };
            tx.send(event).await.map_err(|_| TurnError::Disconnected)?;
            return Ok(TurnOutcome::RateLimited);
        }

        let session_id = self
            .sessions
            .get_or_create(request.session_id.as_ref())
            .await
            .id;
        if let Some(function_id) = request.function_id.as_deref().filter(|f| !f.is_empty()) {
            self.sessions
                .associate_function(&session_id, function_id)
                .await?;
        }
        self.sessions
            .append_message(&session_id, Role::User, request.message.as_str())
            .await?;

        let out = Emitter {
            tx,
            session: session_id.clone(),
        };

        if let Err(e) = self.client.ensure_configured() {
            warn!(session = %session_id, error = %e, "completion service not configured");
            out.send(OutputEvent::error(
                &session_id,
                e.to_string(),
                ErrorType::ConfigurationError,
            ))
            .await?;
            return Ok(TurnOutcome::Failed {
                session_id,
                error_type: ErrorType::ConfigurationError,
            });
        }

        info!(session = %session_id, tools = request.use_ai_tools, "turn started");
        let history = self.sessions.history(&session_id).await?;
        let mut turn = Turn::new();
        let result = if request.use_ai_tools {
            self.run_tool_turn(&out, &request, history, &mut turn).await
        } else {
            self.run_manual_turn(&out, &request, history, &mut turn).await
        };
        let failed_in = turn.phase;
        turn.enter(Phase::Done);

        if !turn.reply.is_empty() {
            if let Err(e) = self
                .sessions
                .append_message(&session_id, Role::Assistant, turn.reply.as_str())
                .await
            {
                warn!(session = %session_id, error = %e, "reply not recorded");
            }
        }

        match result {
            Ok(()) => {
                info!(
                    session = %session_id,
                    tools = turn.tools_used,
                    truncated = turn.truncated,
                    "turn complete"
                );
                Ok(TurnOutcome::Completed {
                    session_id,
                    tools_executed: turn.tools_used,
                    truncated: turn.truncated,
                })
            }
            Err(Abort::Caller(e)) => {
                debug!(session = %session_id, phase = %failed_in, "caller went away mid-turn");
                Err(e)
            }
            Err(Abort::Completion(e)) => {
                error!(session = %session_id, phase = %failed_in, error = %e, "turn aborted");
                let (text, error_type) = if e.is_configuration() {
                    (e.to_string(), ErrorType::ConfigurationError)
                } else {
                    (format!("Error: {e}"), ErrorType::ApiError)
                };
                out.send(OutputEvent::error(&session_id, text, error_type))
                    .await?;
                Ok(TurnOutcome::Failed {
                    session_id,
                    error_type,
                })
            }
        }
    }

    async fn run_manual_turn(
        &self,
        out: &Emitter<'_>,
        request: &ChatRequest,
        history: Vec<Message>,
        turn: &mut Turn,
    ) -> Result<(), Abort> {
        let fields = ContextFields::from_toggles(&request.toggle_states);
        let live_pseudocode = request
            .dynamic_content
            .as_ref()
            .and_then(|d| d.pseudocode.as_deref());

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(prompts::SYSTEM_PROMPT));
        messages.extend(history);
        if let Some(context) = self.provider.get_context(&out.session, &fields) {
            let prompt = render_context_prompt(&context.with_pseudocode_override(live_pseudocode));
            messages.push(Message::system(prompt));
        }

        turn.enter(Phase::Summarize);
        let output = self
            .stream_phase(out, CompletionRequest::new(messages), Show::Reply)
            .await?;
        turn.commit(&output.text);
        Ok(())
    }

    async fn run_tool_turn(
        &self,
        out: &Emitter<'_>,
        request: &ChatRequest,
        history: Vec<Message>,
        turn: &mut Turn,
    ) -> Result<(), Abort> {
        let tools = self.tools.definitions();
        let force_first = self.policy.requires_tools(&request.message);

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(prompts::SYSTEM_PROMPT));
        messages.extend(history);

        turn.enter(Phase::Plan);
        let plan = self
            .stream_phase(
                out,
                instructed(&messages, prompts::plan(&tools)),
                Show::Reply,
            )
            .await?;
        turn.commit(&plan.text);
        push_assistant(&mut messages, &plan.text);

        let mut reasoning;
        loop {
            turn.enter(Phase::Reason);
            let reason = self
                .stream_phase(
                    out,
                    instructed(&messages, prompts::reason(&tools)),
                    Show::Thinking,
                )
                .await?;
            reasoning = reason.text;
            push_assistant(&mut messages, &reasoning);

            turn.enter(Phase::SelectTools);
            let choice = if force_first && turn.selections == 0 {
                ToolChoice::Required
            } else {
                ToolChoice::Auto
            };
            turn.selections += 1;
            let selection = self
                .stream_phase(
                    out,
                    instructed(&messages, prompts::select()).with_tools(tools.clone(), choice),
                    Show::Thinking,
                )
                .await?;
            turn.pending.extend(selection.calls);

            if turn.pending.is_empty() && turn.tools_used == 0 {
                turn.enter(Phase::Recovery);
                let recovered = self
                    .recovery
                    .recover(&[plan.text.as_str(), reasoning.as_str()], &tools);
                if !recovered.is_empty() {
                    info!(session = %out.session, calls = recovered.len(), "recovered tool calls from text");
                }
                turn.pending.extend(recovered);
            }

            let Some(call) = turn.pending.pop_front() else {
                break;
            };

            turn.enter(Phase::Execute);
            let marker = prompts::tool_call_marker(&call.name, &call.arguments);
            out.send(OutputEvent::tool_call(&out.session, marker.as_str()))
                .await?;
            let result = self
                .tools
                .execute(&out.session, &call.name, &call.arguments)
                .await;
            messages.push(Message::assistant(marker));
            messages.push(Message::tool(result.to_message_content()));
            turn.tools_used += 1;
            turn.iterations += 1;

            if turn.iterations >= self.max_iterations {
                warn!(
                    session = %out.session,
                    max = self.max_iterations,
                    dropped = turn.pending.len(),
                    "tool iteration cap reached"
                );
                turn.truncated = true;
                break;
            }
        }

        out.send(OutputEvent::remove_thinking(&out.session)).await?;
        let separator = if turn.reply.is_empty() { "" } else { "\n\n" };

        if turn.tools_used == 0 {
            let text = format!("{separator}{reasoning}");
            if !text.is_empty() {
                out.text(Show::Reply, &text).await?;
            }
            turn.commit(&text);
            return Ok(());
        }

        turn.enter(Phase::Summarize);
        if !separator.is_empty() {
            out.text(Show::Reply, separator).await?;
        }
        let summary = self
            .stream_phase(
                out,
                instructed(&messages, prompts::summarize()),
                Show::Reply,
            )
            .await?;
        turn.commit(separator);
        turn.commit(&summary.text);

        if turn.truncated {
            let notice = format!("\n\n{}", prompts::truncation_notice(self.max_iterations));
            out.text(Show::Reply, &notice).await?;
            turn.commit(&notice);
        }
        Ok(())
    }

    /// Stream one completion to the caller and collect its text and any
    /// assembled tool calls.
    async fn stream_phase(
        &self,
        out: &Emitter<'_>,
        request: CompletionRequest,
        display: Show,
    ) -> Result<PhaseOutput, Abort> {
        let mut rx = self
            .client
            .stream(request)
            .await
            .map_err(Abort::Completion)?;
        let mut text = String::new();
        let mut assembler = ToolCallAssembler::new();

        while let Some(delta) = rx.recv().await {
            match delta.map_err(Abort::Completion)? {
                Delta::Text(chunk) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    out.text(display, &chunk).await?;
                    text.push_str(&chunk);
                }
                Delta::ToolCall(fragment) => assembler.push(fragment),
            }
        }

        Ok(PhaseOutput {
            text,
            calls: assembler.finish(),
        })
    }
}

/// `messages` followed by a system instruction for the next phase.
fn instructed(messages: &[Message], instruction: impl Into<String>) -> CompletionRequest {
    let mut messages = messages.to_vec();
    messages.push(Message::system(instruction));
    CompletionRequest::new(messages)
}

fn push_assistant(messages: &mut Vec<Message>, text: &str) {
    if !text.trim().is_empty() {
        messages.push(Message::assistant(text));
    }
}
