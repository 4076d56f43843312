//! Session storage: the canonical async interface for session backends
//!
//! All backends (in-memory, Redis, SQL, callback adapters, etc.) implement
//! `SessionStore`. The menu wraps a store in a [`Session`] bound to one
//! session id, which reports every backend failure on the menu's error
//! channel before returning it to the caller.

use crate::error::{backend_error, BackendResult, MenuError, Result, SessionOp};
use crate::sink::ErrorSink;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

pub mod callback;
pub mod memory;

/// Core trait for session backends
///
/// Values are stored as JSON. Implementations own their concurrency
/// discipline; the menu never serializes access per session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Open (or resume) the session
    async fn start(&self, session_id: &str) -> BackendResult<()>;

    /// Read a key, `None` if unset
    async fn get(&self, session_id: &str, key: &str) -> BackendResult<Option<Value>>;

    /// Write a key
    async fn set(&self, session_id: &str, key: &str, value: Value) -> BackendResult<()>;

    /// Close the session and release its data
    async fn end(&self, session_id: &str) -> BackendResult<()>;

    /// Backend name (e.g., "memory", "callback")
    fn name(&self) -> &str {
        "custom"
    }
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn start(&self, session_id: &str) -> BackendResult<()> {
        (**self).start(session_id).await
    }

    async fn get(&self, session_id: &str, key: &str) -> BackendResult<Option<Value>> {
        (**self).get(session_id, key).await
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> BackendResult<()> {
        (**self).set(session_id, key, value).await
    }

    async fn end(&self, session_id: &str) -> BackendResult<()> {
        (**self).end(session_id).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Session store handle bound to one session id
///
/// Every operation returns a future; the `*_with` variants also invoke a
/// completion callback. Failures, including panics inside the backend, are
/// emitted on the error channel exactly once.
#[derive(Clone)]
pub struct Session {
    id: String,
    store: Arc<dyn SessionStore>,
    sink: ErrorSink,
}

impl Session {
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>, sink: ErrorSink) -> Self {
        Self {
            id: id.into(),
            store,
            sink,
        }
    }

    /// Session identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn start(&self) -> Result<()> {
        self.call(SessionOp::Start, || self.store.start(&self.id))
            .await
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.call(SessionOp::Get, || self.store.get(&self.id, key))
            .await
    }

    /// Read a key and deserialize it
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Write any serializable value
    pub async fn set(&self, key: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.call(SessionOp::Set, || self.store.set(&self.id, key, value))
            .await
    }

    pub async fn end(&self) -> Result<()> {
        self.call(SessionOp::End, || self.store.end(&self.id))
            .await
    }

    /// `start`, also reporting the outcome to `callback`
    pub async fn start_with<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<()>),
    {
        let result = self.start().await;
        callback(result.clone());
        result
    }

    /// `get`, also reporting the outcome to `callback`
    pub async fn get_with<F>(&self, key: &str, callback: F) -> Result<Option<Value>>
    where
        F: FnOnce(Result<Option<Value>>),
    {
        let result = self.get(key).await;
        callback(result.clone());
        result
    }

    /// `set`, also reporting the outcome to `callback`
    pub async fn set_with<F>(&self, key: &str, value: impl Serialize, callback: F) -> Result<()>
    where
        F: FnOnce(Result<()>),
    {
        let result = self.set(key, value).await;
        callback(result.clone());
        result
    }

    /// `end`, also reporting the outcome to `callback`
    pub async fn end_with<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<()>),
    {
        let result = self.end().await;
        callback(result.clone());
        result
    }

    async fn call<'f, T, F>(&self, op: SessionOp, make: F) -> Result<T>
    where
        F: FnOnce() -> BoxFuture<'f, BackendResult<T>>,
    {
        tracing::debug!(session = %self.id, op = %op, store = %self.store.name(), "Session operation");

        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(make)) {
            Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(backend_error(panic_message(panic))),
            },
            Err(panic) => Err(backend_error(panic_message(panic))),
        };

        outcome.map_err(|source| {
            let err = MenuError::Session { op, source };
            self.sink.emit(err.clone());
            err
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("store", &self.store.name())
            .finish()
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "session backend panicked".to_string()
    }
}
