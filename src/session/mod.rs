//! Session state: per-session exchange history and scratch space
//!
//! Stores make single operations atomic but do not serialize whole requests;
//! the coordinator holds a per-session lock around each request.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteSessionStore;

use crate::core::SharedState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Outcome recorded with an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeStatus {
    Success,
    Error,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Success => "success",
            ExchangeStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => ExchangeStatus::Success,
            _ => ExchangeStatus::Error,
        }
    }
}

/// One request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub request: String,
    pub response: String,
    pub status: ExchangeStatus,
    pub at: DateTime<Utc>,
}

impl Exchange {
    pub fn success(request: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            response: response.into(),
            status: ExchangeStatus::Success,
            at: Utc::now(),
        }
    }

    /// Failed request; `message` is stored as the response
    pub fn error(request: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: ExchangeStatus::Error,
            ..Self::success(request, message)
        }
    }
}

/// Snapshot of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub exchanges: Vec<Exchange>,
    pub scratch: SharedState,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            exchanges: Vec::new(),
            scratch: SharedState::new(),
        }
    }

    /// The last `window` exchanges as a transcript for the model
    pub fn context_text(&self, window: usize) -> String {
        let skip = self.exchanges.len().saturating_sub(window);
        self.exchanges
            .iter()
            .skip(skip)
            .map(|ex| match ex.status {
                ExchangeStatus::Success => format!("user: {}\nassistant: {}", ex.request, ex.response),
                ExchangeStatus::Error => format!("user: {}\nassistant (failed): {}", ex.request, ex.response),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Trait for session backends
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, creating an empty one on first use
    async fn get_or_create(&self, session_id: &str) -> Result<Session>;

    /// Append to the session's history, creating the session if needed
    async fn append_exchange(&self, session_id: &str, exchange: Exchange) -> Result<()>;

    async fn read_scratch(&self, session_id: &str, key: &str) -> Result<Option<Value>>;

    async fn write_scratch(&self, session_id: &str, key: &str, value: Value) -> Result<()>;

    /// Known session ids
    async fn list_sessions(&self) -> Result<Vec<String>>;
}

/// In-memory sessions, lost when the process exits
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id))
            .clone())
    }

    async fn append_exchange(&self, session_id: &str, exchange: Exchange) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id))
            .exchanges
            .push(exchange);
        Ok(())
    }

    async fn read_scratch(&self, session_id: &str, key: &str) -> Result<Option<Value>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .and_then(|s| s.scratch.get(key))
            .cloned())
    }

    async fn write_scratch(&self, session_id: &str, key: &str, value: Value) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id))
            .scratch
            .insert(key, value);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
