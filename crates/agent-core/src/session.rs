//! Session Persistence
//!
//! The engine writes its messages through [`SessionStore`] after producing
//! them. It never depends on the store succeeding to answer the caller.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::plan::PlanItem;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session fields the engine updates after a run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<PlanItem>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionUpdate {
    pub fn touched() -> Self {
        Self {
            updated_at: Some(Utc::now()),
            ..Default::default()
        }
    }
}

/// Session title from the first user message
pub fn title_for(messages: &[Message]) -> Option<String> {
    messages.iter().find(|m| m.role == Role::User).map(|m| {
        let preview: String = m.content.chars().take(50).collect();
        if m.content.chars().count() > 50 {
            format!("{preview}...")
        } else {
            preview
        }
    })
}

/// Persistence boundary (consumed, not owned, by the engine)
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append one message to a session's trace
    async fn append(&self, session_id: &SessionId, message: &Message) -> Result<()>;

    /// Update session metadata
    async fn update_session(&self, session_id: &SessionId, update: SessionUpdate) -> Result<()>;

    /// Persisted messages in append order
    async fn messages(&self, session_id: &SessionId) -> Result<Vec<Message>>;
}

/// A persisted session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: SessionId,
    pub messages: Vec<Message>,
    pub title: Option<String>,
    pub plan: Vec<PlanItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredSession {
    fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            title: None,
            plan: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// In-memory session store (for development/testing)
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one session
    pub fn session(&self, id: &SessionId) -> Result<Option<StoredSession>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions.get(id).cloned())
    }

    /// Sessions sorted by most recent activity
    pub fn list(&self, limit: usize) -> Result<Vec<StoredSession>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        let mut result: Vec<_> = sessions.values().cloned().collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);
        Ok(result)
    }
}

fn poisoned() -> AgentError {
    AgentError::Session("session store lock poisoned".into())
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn append(&self, session_id: &SessionId, message: &Message) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions
            .entry(session_id.clone())
            .or_insert_with(|| StoredSession::new(session_id.clone()))
            .messages
            .push(message.clone());
        Ok(())
    }

    async fn update_session(&self, session_id: &SessionId, update: SessionUpdate) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let session = sessions
            .entry(session_id.clone())
            .or_insert_with(|| StoredSession::new(session_id.clone()));

        if let Some(title) = update.title {
            session.title.get_or_insert(title);
        }
        if let Some(plan) = update.plan {
            session.plan = plan;
        }
        session.updated_at = update.updated_at.unwrap_or_else(Utc::now);
        Ok(())
    }

    async fn messages(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions
            .get(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default())
    }
}
