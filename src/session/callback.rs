//! Callback-style session backends
//!
//! Adapts backends written against error-first completion callbacks into a
//! `SessionStore`. Each operation hands the backend a [`Completion`]; the
//! first result it delivers settles the operation.

use super::SessionStore;
use crate::completion::Completion;
use crate::error::{backend_error, BackendResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

type StartFn = Arc<dyn Fn(&str, Completion<()>) + Send + Sync>;
type GetFn = Arc<dyn Fn(&str, &str, Completion<Option<Value>>) + Send + Sync>;
type SetFn = Arc<dyn Fn(&str, &str, Value, Completion<()>) + Send + Sync>;
type EndFn = Arc<dyn Fn(&str, Completion<()>) + Send + Sync>;

/// `SessionStore` built from callback-style closures
///
/// Operations without a closure fail with a backend error when called.
#[derive(Clone, Default)]
pub struct CallbackStore {
    start: Option<StartFn>,
    get: Option<GetFn>,
    set: Option<SetFn>,
    end: Option<EndFn>,
}

impl CallbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Completion<()>) + Send + Sync + 'static,
    {
        self.start = Some(Arc::new(f));
        self
    }

    pub fn on_get<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, Completion<Option<Value>>) + Send + Sync + 'static,
    {
        self.get = Some(Arc::new(f));
        self
    }

    pub fn on_set<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, Value, Completion<()>) + Send + Sync + 'static,
    {
        self.set = Some(Arc::new(f));
        self
    }

    pub fn on_end<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Completion<()>) + Send + Sync + 'static,
    {
        self.end = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for CallbackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackStore")
            .field("start", &self.start.is_some())
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .field("end", &self.end.is_some())
            .finish()
    }
}

fn not_configured(op: &str) -> crate::error::BackendError {
    backend_error(format!("Session {} handler not configured", op))
}

#[async_trait]
impl SessionStore for CallbackStore {
    async fn start(&self, session_id: &str) -> BackendResult<()> {
        let f = self.start.as_ref().ok_or_else(|| not_configured("start"))?;
        let (done, pending) = Completion::channel();
        f(session_id, done);
        pending.wait().await
    }

    async fn get(&self, session_id: &str, key: &str) -> BackendResult<Option<Value>> {
        let f = self.get.as_ref().ok_or_else(|| not_configured("get"))?;
        let (done, pending) = Completion::channel();
        f(session_id, key, done);
        pending.wait().await
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> BackendResult<()> {
        let f = self.set.as_ref().ok_or_else(|| not_configured("set"))?;
        let (done, pending) = Completion::channel();
        f(session_id, key, value, done);
        pending.wait().await
    }

    async fn end(&self, session_id: &str) -> BackendResult<()> {
        let f = self.end.as_ref().ok_or_else(|| not_configured("end"))?;
        let (done, pending) = Completion::channel();
        f(session_id, done);
        pending.wait().await
    }

    fn name(&self) -> &str {
        "callback"
    }
}
