//! Conversation session management.
//!
//! A `Session` holds one conversation's history. The `SessionStore` owns
//! every live session, tracks the most recently used one, names sessions
//! after their first user message, and evicts idle ones.

mod naming;
mod store;
mod types;

pub use naming::{clean_title, fallback_name, resolve_name, CompletionNamer, NameOutcome, SessionNamer};
pub use store::SessionStore;
pub use types::{Session, SessionError, SessionSummary};
