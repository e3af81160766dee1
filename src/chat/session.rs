//! In-memory chat sessions

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::service::ChatResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
            timestamp: Utc::now(),
        }
    }
}

/// One browser conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub messages: Vec<ChatMessage>,
    /// Questions answered in this session
    pub query_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Store-wide activity counter at the last exchange
    #[serde(skip)]
    last_active: u64,
}

impl Session {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            query_count: 0,
            created_at: now,
            updated_at: now,
            last_active: 0,
        }
    }
}

/// Sessions keyed by id; history is lost on restart.
///
/// Holds at most `max_sessions`; the least recently active one is dropped
/// to make room for a new session.
pub struct SessionStore {
    max_sessions: usize,
    inner: Mutex<Sessions>,
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<Uuid, Session>,
    ticks: u64,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions: max_sessions.max(1),
            inner: Mutex::new(Sessions::default()),
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Session> {
        self.inner.lock().await.by_id.get(&id).cloned()
    }

    /// Append an answered question to session `id` and return the session id
    /// with its new query count.
    ///
    /// Without an id a new session starts; an unknown id is adopted.
    pub async fn record_exchange(
        &self,
        id: Option<Uuid>,
        question: &str,
        response: &ChatResponse,
    ) -> (Uuid, usize) {
        let id = id.unwrap_or_else(Uuid::new_v4);
        let mut inner = self.inner.lock().await;
        inner.ticks += 1;
        let tick = inner.ticks;
        let sessions = &mut inner.by_id;

        if !sessions.contains_key(&id) {
            if sessions.len() >= self.max_sessions {
                let stale = sessions
                    .values()
                    .min_by_key(|s| s.last_active)
                    .map(|s| s.id);
                if let Some(stale) = stale {
                    sessions.remove(&stale);
                    tracing::debug!("Dropped idle session {}", stale);
                }
            }
            tracing::debug!("Started session {}", id);
        }

        let session = sessions.entry(id).or_insert_with(|| Session::new(id));
        session.messages.push(ChatMessage::user(question));
        session
            .messages
            .push(ChatMessage::assistant(&response.answer, response.sources.clone()));
        session.query_count += 1;
        session.updated_at = Utc::now();
        session.last_active = tick;
        (id, session.query_count)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.by_id.len()
    }
}
