//! Turn orchestration.
//!
//! One inbound chat message becomes one *turn*. In manual mode the turn is
//! a single streamed completion over the operator-selected context. In tool
//! mode the turn walks PLAN → REASON → SELECT_TOOLS → (RECOVERY) → EXECUTE,
//! loops back to REASON while calls are pending, and ends with SUMMARIZE.
//! Everything the caller sees arrives as `OutputEvent`s on a bounded channel.

mod engine;
mod events;
mod intent;
mod prompts;
mod recovery;
mod turn;


pub use engine::{ChatRequest, DynamicContent, Orchestrator, TurnError, TurnOutcome};
pub use events::{ErrorType, EventKind, OutputEvent, END_OF_STREAM};
pub use intent::ToolUsePolicy;
pub use recovery::{MentionRecovery, ToolCallRecovery};
pub use turn::Phase;
