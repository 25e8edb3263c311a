//! Application State

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agent_core::{LlmProvider, SessionId};
use chrono::Utc;
use industria::{InMemoryTicketSink, MaintenanceSession, SessionFactory};
use tokio::sync::{Mutex, RwLock};

/// One live conversation. The mutex keeps its turns strictly sequential.
pub type SharedSession = Arc<Mutex<MaintenanceSession>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Reasoning engine (Ollama, etc.)
    pub provider: Arc<dyn LlmProvider>,

    /// Builds sessions wired to the agent, policy and ticket sink
    pub factory: Arc<SessionFactory>,

    /// Where tickets land
    pub sink: Arc<InMemoryTicketSink>,

    sessions: Arc<RwLock<HashMap<SessionId, SharedSession>>>,

    /// Sessions quiet for this long are ended by [`AppState::sweep_idle`]
    idle_timeout: Duration,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        factory: SessionFactory,
        sink: Arc<InMemoryTicketSink>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            factory: Arc::new(factory),
            sink,
            sessions: Arc::default(),
            idle_timeout,
        }
    }

    /// Start a new conversation
    pub async fn open(&self) -> (SessionId, SharedSession) {
        let session = self.factory.session();
        let id = session.id().clone();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id.clone(), shared.clone());
        tracing::info!(session = %id, "Session opened");
        (id, shared)
    }

    pub async fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn close(&self, id: &SessionId) -> Option<SharedSession> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            tracing::info!(session = %id, "Session closed");
        }
        removed
    }

    /// End and drop every session idle for at least the timeout. A session
    /// in the middle of a turn is busy, not idle, and is left alone.
    pub async fn sweep_idle(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let expired: Vec<SessionId> = sessions
            .iter()
            .filter_map(|(id, shared)| {
                let session = shared.try_lock().ok()?;
                let idle = (now - session.session().updated_at).to_std().unwrap_or_default();
                (idle >= self.idle_timeout).then(|| id.clone())
            })
            .collect();

        for id in &expired {
            if let Some(shared) = sessions.remove(id) {
                if let Ok(mut session) = shared.try_lock() {
                    session.end();
                }
            }
        }

        if !expired.is_empty() {
            tracing::info!(expired = expired.len(), remaining = sessions.len(), "Swept idle sessions");
        }
        expired.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
