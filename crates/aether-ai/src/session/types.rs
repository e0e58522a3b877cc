//! Session records.

use aether_common::SessionId;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Message, Role};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(SessionId),
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub name: Option<String>,
    /// Function the operator associated with this conversation.
    pub function_id: Option<String>,
    pub(crate) naming_started: bool,
}

impl Session {
    pub(crate) fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
            name: None,
            function_id: None,
            naming_started: false,
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            message_count: self.messages.len(),
            messages: self.messages.clone(),
        }
    }
}

/// Listing entry for a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
    pub messages: Vec<Message>,
}
