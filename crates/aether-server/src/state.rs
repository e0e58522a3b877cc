//! Shared server state and request dispatch.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use aether_ai::context::ContextProvider;
use aether_ai::{InMemoryContextProvider, Orchestrator, SessionStore};
use tracing::{info, warn};

use crate::protocol::{ClientMessage, ServerResponse};

/// Everything a connection needs, shared across connections.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: SessionStore,
    pub provider: Arc<InMemoryContextProvider>,
    pub data_dir: PathBuf,
    pub event_buffer: usize,
}

impl AppState {
    /// Answer a request that is not a chat turn.
    pub async fn dispatch(&self, message: ClientMessage) -> ServerResponse {
        match message {
            ClientMessage::Chat(_) => ServerResponse::error("chat requests are streamed"),
            ClientMessage::NewSession => ServerResponse::SessionCreated {
                session_id: self.sessions.create().await,
            },
            ClientMessage::ClearSession { session_id } => {
                match self.sessions.clear(&session_id).await {
                    Ok(()) => ServerResponse::SessionCleared { session_id },
                    Err(e) => ServerResponse::error(e.to_string()),
                }
            }
            ClientMessage::DeleteSession { session_id } => {
                match self.sessions.delete(&session_id).await {
                    Ok(()) => ServerResponse::SessionDeleted { session_id },
                    Err(e) => ServerResponse::error(e.to_string()),
                }
            }
            ClientMessage::ListSessions => ServerResponse::Sessions {
                sessions: self.sessions.list().await,
            },
            ClientMessage::CurrentSession => ServerResponse::CurrentSession {
                session_id: self.sessions.current().await,
            },
            ClientMessage::SetContext {
                function_id,
                data,
                session_id,
            } => {
                self.provider.cache_function(&function_id, data);
                if let Some(session_id) = session_id {
                    if let Err(e) = self
                        .sessions
                        .associate_function(&session_id, &function_id)
                        .await
                    {
                        return ServerResponse::error(e.to_string());
                    }
                }
                ServerResponse::ContextSet { function_id }
            }
            ClientMessage::GetContext { function_id } => match self.provider.summary(&function_id) {
                Some(summary) => ServerResponse::Context { summary },
                None => ServerResponse::error(format!("No context found for function {function_id}")),
            },
            ClientMessage::LoadBinary { path } => {
                let path = match self.resolve(&path) {
                    Ok(path) => path,
                    Err(e) => {
                        warn!(path = %path.display(), "rejected binary path");
                        return ServerResponse::error(e);
                    }
                };
                let provider = Arc::clone(&self.provider);
                let load_path = path.clone();
                let loaded =
                    tokio::task::spawn_blocking(move || provider.load_binary(&load_path)).await;
                match loaded {
                    Ok(Ok(functions)) => {
                        info!(path = %path.display(), functions, "binary loaded");
                        ServerResponse::BinaryLoaded { path, functions }
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "binary load failed");
                        ServerResponse::error(e.to_string())
                    }
                    Err(e) => {
                        warn!(error = %e, "binary load task failed");
                        ServerResponse::error("binary load failed")
                    }
                }
            }
            ClientMessage::Ping => ServerResponse::Pong,
        }
    }

    /// Extractor output is only read from inside the data directory.
    fn resolve(&self, path: &Path) -> Result<PathBuf, String> {
        let inside = path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !inside || path.as_os_str().is_empty() {
            return Err(format!(
                "binary path must be relative to the data directory: {}",
                path.display()
            ));
        }
        Ok(self.data_dir.join(path))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use aether_ai::context::FunctionData;
    use aether_ai::session::SessionError;
    use aether_ai::tools::register_analysis_tools;
    use aether_ai::{OpenAiClient, OpenAiConfig, RateLimiter, Role, ToolRegistry};
    use aether_common::SessionId;

    pub(crate) fn state(data_dir: &Path) -> AppState {
        let provider = Arc::new(InMemoryContextProvider::new(data_dir));
        let client = Arc::new(OpenAiClient::new(OpenAiConfig::default()).unwrap());
        let tools = Arc::new(ToolRegistry::new(provider.clone()));
        register_analysis_tools(&tools);
        let sessions = SessionStore::new(provider.clone());
        let orchestrator = Orchestrator::new(
            client,
            sessions.clone(),
            tools,
            Arc::new(RateLimiter::default()),
            provider.clone(),
        );
        AppState {
            orchestrator: Arc::new(orchestrator),
            sessions,
            provider,
            data_dir: data_dir.to_path_buf(),
            event_buffer: 16,
        }
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let ServerResponse::SessionCreated { session_id } =
            state.dispatch(ClientMessage::NewSession).await
        else {
            panic!("expected session_created");
        };
        let ServerResponse::CurrentSession { session_id: current } =
            state.dispatch(ClientMessage::CurrentSession).await
        else {
            panic!("expected current_session");
        };
        assert_eq!(current, Some(session_id.clone()));

        state
            .sessions
            .append_message(&session_id, Role::User, "find the decrypt routine")
            .await
            .unwrap();
        let ServerResponse::Sessions { sessions } = state.dispatch(ClientMessage::ListSessions).await
        else {
            panic!("expected sessions");
        };
        assert_eq!(sessions.len(), 1);

        assert!(matches!(
            state
                .dispatch(ClientMessage::DeleteSession {
                    session_id: session_id.clone()
                })
                .await,
            ServerResponse::SessionDeleted { .. }
        ));
        assert!(matches!(
            state.sessions.history(&session_id).await,
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            state
                .dispatch(ClientMessage::ClearSession { session_id })
                .await,
            ServerResponse::Error { .. }
        ));
    }

    #[tokio::test]
    async fn context_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let session_id = state.sessions.create().await;

        let response = state
            .dispatch(ClientMessage::SetContext {
                function_id: "0x401000".into(),
                data: FunctionData {
                    function_name: "main".into(),
                    address: "0x401000".into(),
                    pseudocode: "int main(void) { return 0; }".into(),
                    ..Default::default()
                },
                session_id: Some(session_id.clone()),
            })
            .await;
        assert!(matches!(response, ServerResponse::ContextSet { .. }));
        assert_eq!(state.provider.cursor(&session_id).as_deref(), Some("0x401000"));

        let ServerResponse::Context { summary } = state
            .dispatch(ClientMessage::GetContext {
                function_id: "0x401000".into(),
            })
            .await
        else {
            panic!("expected context");
        };
        assert_eq!(summary.function_name, "main");
        assert!(summary.available_data.has_pseudocode);

        assert!(matches!(
            state
                .dispatch(ClientMessage::GetContext {
                    function_id: "0xdead".into()
                })
                .await,
            ServerResponse::Error { .. }
        ));
        assert!(matches!(
            state
                .dispatch(ClientMessage::SetContext {
                    function_id: "0x1".into(),
                    data: FunctionData::default(),
                    session_id: Some(SessionId::from("missing")),
                })
                .await,
            ServerResponse::Error { .. }
        ));
    }

    #[tokio::test]
    async fn load_binary_relative_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("crackme_functions.json"),
            r#"{"functions":[{"name":"main","address":"0x1000"},{"name":"check","address":4096}]}"#,
        )
        .unwrap();
        let state = state(dir.path());

        let response = state
            .dispatch(ClientMessage::LoadBinary {
                path: "crackme_functions.json".into(),
            })
            .await;
        assert!(matches!(
            response,
            ServerResponse::BinaryLoaded { functions: 2, .. }
        ));

        assert!(matches!(
            state
                .dispatch(ClientMessage::LoadBinary {
                    path: "absent_functions.json".into()
                })
                .await,
            ServerResponse::Error { .. }
        ));
    }

    #[tokio::test]
    async fn load_binary_stays_inside_data_dir() {
        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("data");
        std::fs::create_dir(&data_dir).unwrap();
        let outside = root.path().join("outside_functions.json");
        std::fs::write(&outside, r#"[{"name":"main","address":"0x1000"}]"#).unwrap();
        let state = state(&data_dir);

        for path in [
            outside.clone(),
            PathBuf::from("../outside_functions.json"),
            PathBuf::from("sub/../../outside_functions.json"),
            PathBuf::new(),
        ] {
            let response = state.dispatch(ClientMessage::LoadBinary { path: path.clone() }).await;
            let ServerResponse::Error { message } = response else {
                panic!("{} should be rejected", path.display());
            };
            assert!(message.contains("data directory"), "{message}");
        }
    }
}
