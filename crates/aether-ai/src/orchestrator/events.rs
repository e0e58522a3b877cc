//! Events streamed to the caller during a turn.

use aether_common::SessionId;
use serde::{Deserialize, Serialize};

/// Sentinel frame that terminates a chat response stream.
pub const END_OF_STREAM: &str = "[DONE]";

/// Non-reply event categories. Plain reply fragments carry no kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Thinking,
    ToolCall,
    RemoveThinking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ConfigurationError,
    ApiError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EventKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
}

impl OutputEvent {
    pub fn reply(session: &SessionId, text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            session_id: Some(session.clone()),
            ..Default::default()
        }
    }

    pub fn thinking(session: &SessionId, text: impl Into<String>) -> Self {
        Self {
            kind: Some(EventKind::Thinking),
            ..Self::reply(session, text)
        }
    }

    pub fn tool_call(session: &SessionId, text: impl Into<String>) -> Self {
        Self {
            kind: Some(EventKind::ToolCall),
            ..Self::reply(session, text)
        }
    }

    /// Tells the caller to discard everything shown as thinking so far.
    pub fn remove_thinking(session: &SessionId) -> Self {
        Self {
            session_id: Some(session.clone()),
            kind: Some(EventKind::RemoveThinking),
            ..Default::default()
        }
    }

    pub fn error(session: &SessionId, text: impl Into<String>, error_type: ErrorType) -> Self {
        Self {
            error_type: Some(error_type),
            ..Self::reply(session, text)
        }
    }

    /// Text that belongs to the final answer.
    pub fn visible_reply(&self) -> Option<&str> {
        match (self.kind, self.error_type) {
            (None, None) => self.reply.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_only_present_fields() {
        let id = SessionId::from("abc");
        let json = serde_json::to_string(&OutputEvent::reply(&id, "hi")).unwrap();
        assert_eq!(json, r#"{"reply":"hi","session_id":"abc"}"#);

        let json = serde_json::to_string(&OutputEvent::remove_thinking(&id)).unwrap();
        assert_eq!(json, r#"{"session_id":"abc","type":"remove_thinking"}"#);

        let event = OutputEvent::error(&id, "no key", ErrorType::ConfigurationError);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["error_type"], "configuration_error");
    }

    #[test]
    fn only_plain_replies_are_visible() {
        let id = SessionId::from("abc");
        assert_eq!(OutputEvent::reply(&id, "a").visible_reply(), Some("a"));
        assert_eq!(OutputEvent::thinking(&id, "b").visible_reply(), None);
        assert_eq!(OutputEvent::tool_call(&id, "c").visible_reply(), None);
        assert_eq!(
            OutputEvent::error(&id, "d", ErrorType::ApiError).visible_reply(),
            None
        );
    }
}
