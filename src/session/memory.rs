//! In-memory session store
//!
//! Keeps every session in a process-local map. Suitable for tests and
//! single-process deployments; data is lost on drop.

use super::SessionStore;
use crate::error::{backend_error, BackendResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type SessionData = HashMap<String, Value>;

/// In-memory `SessionStore`
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether a session is open
    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Copy of a session's data
    pub async fn snapshot(&self, session_id: &str) -> Option<SessionData> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

fn not_started(session_id: &str) -> crate::error::BackendError {
    backend_error(format!("Session not started: {}", session_id))
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn start(&self, session_id: &str) -> BackendResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.to_string()).or_default();
        Ok(())
    }

    async fn get(&self, session_id: &str, key: &str) -> BackendResult<Option<Value>> {
        let sessions = self.sessions.read().await;
        let data = sessions.get(session_id).ok_or_else(|| not_started(session_id))?;
        Ok(data.get(key).cloned())
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> BackendResult<()> {
        let mut sessions = self.sessions.write().await;
        let data = sessions
            .get_mut(session_id)
            .ok_or_else(|| not_started(session_id))?;
        data.insert(key.to_string(), value);
        Ok(())
    }

    async fn end(&self, session_id: &str) -> BackendResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let store = MemorySessionStore::new();
        store.start("a").await.unwrap();
        store.set("a", "k", Value::from(1)).await.unwrap();
        store.start("a").await.unwrap();

        assert_eq!(store.get("a", "k").await.unwrap(), Some(Value::from(1)));
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = MemorySessionStore::new();
        store.start("a").await.unwrap();
        store.start("b").await.unwrap();
        store.set("a", "secret", Value::from("x")).await.unwrap();

        assert_eq!(store.get("a", "secret").await.unwrap(), Some(Value::from("x")));
        assert_eq!(store.get("b", "secret").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_end_removes_data() {
        let store = MemorySessionStore::new();
        store.start("a").await.unwrap();
        store.set("a", "k", Value::from(true)).await.unwrap();
        store.end("a").await.unwrap();

        assert!(!store.contains("a").await);
        assert!(store.snapshot("a").await.is_none());
    }

    #[tokio::test]
    async fn test_unstarted_session_fails() {
        let store = MemorySessionStore::new();
        let err = store.get("ghost", "k").await.unwrap_err();
        assert!(err.to_string().contains("ghost"));
        assert!(store.set("ghost", "k", Value::Null).await.is_err());
    }
}
