//! Session store: owns every live conversation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aether_common::SessionId;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::context::ContextProvider;
use crate::{Message, Role};

use super::naming::{fallback_name, resolve_name, NameOutcome, SessionNamer};
use super::types::{Session, SessionError, SessionSummary};

/// Thread-safe session store. Cloning shares the same sessions.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    current: Arc<RwLock<Option<SessionId>>>,
    provider: Arc<dyn ContextProvider>,
    namer: Option<Arc<dyn SessionNamer>>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn ContextProvider>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            current: Arc::new(RwLock::new(None)),
            provider,
            namer: None,
        }
    }

    /// Upgrade fallback names in the background with `namer`.
    pub fn with_namer(mut self, namer: Arc<dyn SessionNamer>) -> Self {
        self.namer = Some(namer);
        self
    }

    /// Start an empty session and make it current.
    pub async fn create(&self) -> SessionId {
        let id = SessionId::new();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Session::new(id.clone()));
        *self.current.write().await = Some(id.clone());
        debug!(session = %id, "session created");
        id
    }

    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Resolve `id`, or start a new session under a new id when it is
    /// absent or unknown. Callers must adopt the returned session's id.
    pub async fn get_or_create(&self, id: Option<&SessionId>) -> Session {
        if let Some(id) = id {
            if let Some(session) = self.get(id).await {
                return session;
            }
            debug!(session = %id, "unknown session id, starting a new session");
        }
        let id = self.create().await;
        Session::new(id)
    }

    /// Append a message. The first user message of a session immediately
    /// gets a fallback name and, when a namer is configured and a runtime is
    /// available, spawns a task that may replace it with a generated title.
    pub async fn append_message(
        &self,
        id: &SessionId,
        role: Role,
        content: impl Into<String>,
    ) -> Result<Option<JoinHandle<NameOutcome>>, SessionError> {
        let content = content.into();
        let fallback = {
            let mut map = self.sessions.write().await;
            let session = map
                .get_mut(id)
                .ok_or_else(|| SessionError::NotFound(id.clone()))?;
            session.messages.push(Message::new(role, content.clone()));
            session.last_activity = Utc::now();

            if role == Role::User && !session.naming_started && session.user_message_count() == 1 {
                session.naming_started = true;
                let name = fallback_name(&content);
                session.name = Some(name.clone());
                Some(name)
            } else {
                None
            }
        };

        let Some(fallback) = fallback else {
            return Ok(None);
        };
        let Some(namer) = self.namer.clone() else {
            return Ok(None);
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Ok(None);
        };

        let function_name = self
            .provider
            .current_function(id)
            .map(|f| f.function_name.clone());
        let sessions = Arc::clone(&self.sessions);
        let id = id.clone();
        Ok(Some(runtime.spawn(async move {
            let outcome = resolve_name(namer.as_ref(), &content, function_name.as_deref()).await;
            if let NameOutcome::Generated(title) = &outcome {
                let mut map = sessions.write().await;
                // Leave the name alone if the session was cleared or renamed meanwhile.
                if let Some(session) = map.get_mut(&id) {
                    if session.name.as_deref() == Some(fallback.as_str()) {
                        session.name = Some(title.clone());
                    }
                }
            }
            outcome
        })))
    }

    pub async fn history(&self, id: &SessionId) -> Result<Vec<Message>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|s| s.messages.clone())
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Empty history and name; id and creation time are kept.
    pub async fn clear(&self, id: &SessionId) -> Result<(), SessionError> {
        let mut map = self.sessions.write().await;
        let session = map
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        session.messages.clear();
        session.name = None;
        session.naming_started = false;
        session.last_activity = Utc::now();
        Ok(())
    }

    pub async fn delete(&self, id: &SessionId) -> Result<(), SessionError> {
        if self.sessions.write().await.remove(id).is_none() {
            return Err(SessionError::NotFound(id.clone()));
        }
        self.provider.release(id);
        let mut current = self.current.write().await;
        if current.as_ref() == Some(id) {
            *current = None;
        }
        debug!(session = %id, "session deleted");
        Ok(())
    }

    /// Remove sessions idle for longer than `ttl`. Returns how many went.
    pub async fn evict_expired(&self, ttl: Duration) -> usize {
        self.evict_expired_at(Utc::now(), ttl).await
    }

    pub async fn evict_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let mut evicted = Vec::new();
        self.sessions.write().await.retain(|id, session| {
            let stale = now - session.last_activity > ttl;
            if stale {
                info!(session = %id, "evicting idle session");
                evicted.push(id.clone());
            }
            !stale
        });

        for id in &evicted {
            self.provider.release(id);
        }
        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|c| evicted.contains(c)) {
            *current = None;
        }
        evicted.len()
    }

    /// Sessions worth showing: at least one message and a name. Most
    /// recently active first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| !s.messages.is_empty() && s.name.is_some())
            .map(Session::summary)
            .collect();
        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        summaries
    }

    /// Record the function a session is about and point its cursor there.
    pub async fn associate_function(
        &self,
        id: &SessionId,
        function_id: &str,
    ) -> Result<(), SessionError> {
        {
            let mut map = self.sessions.write().await;
            let session = map
                .get_mut(id)
                .ok_or_else(|| SessionError::NotFound(id.clone()))?;
            session.function_id = Some(function_id.to_string());
        }
        self.provider.set_function(id, function_id);
        Ok(())
    }

    pub async fn current(&self) -> Option<SessionId> {
        self.current.read().await.clone()
    }

    pub async fn set_current(&self, id: &SessionId) {
        *self.current.write().await = Some(id.clone());
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
