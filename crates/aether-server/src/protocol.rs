//! WebSocket wire protocol. Every inbound text frame is one tagged request.

use std::path::PathBuf;

use aether_ai::context::{ContextSummary, FunctionData};
use aether_ai::session::SessionSummary;
use aether_ai::ChatRequest;
use aether_common::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Answered with a stream of output events and a final `[DONE]` frame.
    Chat(ChatRequest),

    NewSession,

    ClearSession {
        session_id: SessionId,
    },

    DeleteSession {
        session_id: SessionId,
    },

    ListSessions,

    CurrentSession,

    /// Cache function data pushed by the disassembler, optionally pointing
    /// a session's cursor at it.
    SetContext {
        function_id: String,
        data: FunctionData,
        #[serde(default)]
        session_id: Option<SessionId>,
    },

    GetContext {
        function_id: String,
    },

    LoadBinary {
        path: PathBuf,
    },

    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerResponse {
    SessionCreated { session_id: SessionId },
    SessionCleared { session_id: SessionId },
    SessionDeleted { session_id: SessionId },
    Sessions { sessions: Vec<SessionSummary> },
    CurrentSession { session_id: Option<SessionId> },
    ContextSet { function_id: String },
    Context { summary: ContextSummary },
    BinaryLoaded { path: PathBuf, functions: usize },
    Pong,
    Error { message: String },
}

impl ServerResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ServerResponse::Error {
            message: message.into(),
        }
    }

    /// JSON text for a frame.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to encode response");
            r#"{"type":"error","message":"internal encoding error"}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_request() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"chat","message":"what does this do?","session_id":"abc",
                "use_ai_tools":true,"toggle_states":{"pseudocode":true},
                "dynamic_content":{"pseudocode":"int f(void);"}}"#,
        )
        .unwrap();
        let ClientMessage::Chat(request) = msg else {
            panic!("expected chat");
        };
        assert_eq!(request.message, "what does this do?");
        assert_eq!(request.session_id, Some(SessionId::from("abc")));
        assert!(request.use_ai_tools);
        assert_eq!(request.toggle_states.get("pseudocode"), Some(&true));
        assert_eq!(
            request.dynamic_content.unwrap().pseudocode.as_deref(),
            Some("int f(void);")
        );
    }

    #[test]
    fn chat_defaults_to_manual_mode() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"chat","message":"hi"}"#).unwrap();
        let ClientMessage::Chat(request) = msg else {
            panic!("expected chat");
        };
        assert!(!request.use_ai_tools);
        assert!(request.session_id.is_none());
    }

    #[test]
    fn parses_unit_and_struct_requests() {
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"list_sessions"}"#).unwrap(),
            ClientMessage::ListSessions
        ));
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"delete_session","session_id":"x"}"#)
                .unwrap(),
            ClientMessage::DeleteSession { .. }
        ));
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"bogus"}"#).is_err());
    }

    #[test]
    fn responses_are_tagged() {
        let frame = ServerResponse::SessionCreated {
            session_id: SessionId::from("abc"),
        }
        .to_frame();
        assert_eq!(frame, r#"{"type":"session_created","session_id":"abc"}"#);
        assert_eq!(ServerResponse::Pong.to_frame(), r#"{"type":"pong"}"#);
    }
}
