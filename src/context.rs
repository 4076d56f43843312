//! Handler-facing run context
//!
//! Every `run` call builds one `RunScope` holding the request, the entry
//! value and the response slot. Handlers see it through a [`StateContext`],
//! which is cheap to clone and may be moved into spawned tasks.

use crate::error::{MenuError, Result};
use crate::gateway::ResponseFormatter;
use crate::session::Session;
use crate::sink::ErrorSink;
use crate::state::{State, StateRegistry, START_STATE};
use crate::types::{Response, ResponseKind, UssdRequest};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Result of a state handler
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Code run when a state is entered
///
/// Implemented for every `Fn(StateContext) -> impl Future<Output = HandlerResult>`.
/// A handler is expected to call [`StateContext::con`] or [`StateContext::end`]
/// exactly once, possibly from a task it spawns, or to navigate elsewhere.
#[async_trait]
pub trait StateHandler: Send + Sync {
    async fn run(&self, ctx: StateContext) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> StateHandler for F
where
    F: Fn(StateContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn run(&self, ctx: StateContext) -> HandlerResult {
        (self)(ctx).await
    }
}

/// Callback invoked with the response of one run
pub(crate) type ResultCallback = Box<dyn FnOnce(&Response) + Send>;

/// Callback invoked with the response of every run
pub(crate) type SharedCallback = Arc<dyn Fn(&Response) + Send + Sync>;

/// First error reported during a run, shared with the caller of `run`
pub(crate) type FirstError = Arc<Mutex<Option<MenuError>>>;

/// Response produced by a handler
#[derive(Debug)]
pub(crate) struct Reply {
    pub kind: ResponseKind,
    pub response: Response,
}

/// State shared by every context of a single run
pub(crate) struct RunScope {
    registry: Arc<StateRegistry>,
    args: Arc<UssdRequest>,
    session: Option<Session>,
    val: String,
    formatter: Arc<dyn ResponseFormatter>,
    sink: ErrorSink,
    on_result: Option<SharedCallback>,
    callback: Mutex<Option<ResultCallback>>,
    reply: Mutex<Option<oneshot::Sender<Reply>>>,
    reported: FirstError,
}

/// Inputs for a run scope
pub(crate) struct ScopeParts {
    pub registry: Arc<StateRegistry>,
    pub args: Arc<UssdRequest>,
    pub session: Option<Session>,
    pub val: String,
    pub formatter: Arc<dyn ResponseFormatter>,
    pub sink: ErrorSink,
    pub on_result: Option<SharedCallback>,
    pub callback: Option<ResultCallback>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunScope {
    pub(crate) fn new(parts: ScopeParts) -> (Arc<Self>, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        let scope = Self {
            registry: parts.registry,
            args: parts.args,
            session: parts.session,
            val: parts.val,
            formatter: parts.formatter,
            sink: parts.sink,
            on_result: parts.on_result,
            callback: Mutex::new(parts.callback),
            reply: Mutex::new(Some(tx)),
            reported: FirstError::default(),
        };
        (Arc::new(scope), rx)
    }

    /// Run a state's handler
    pub(crate) fn execute(self: &Arc<Self>, state: Arc<State>) -> BoxFuture<'static, Result<()>> {
        let scope = Arc::clone(self);
        Box::pin(async move {
            let Some(handler) = state.handler().cloned() else {
                let err = MenuError::HandlerMissing {
                    state: state.name().to_string(),
                };
                scope.report(err.clone());
                return Err(err);
            };

            tracing::debug!(state = %state.name(), val = %scope.val, "Running state");
            let ctx = StateContext {
                scope: Arc::clone(&scope),
                state: Arc::clone(&state),
            };

            handler.run(ctx).await.map_err(|e| {
                let err = match e.downcast::<MenuError>() {
                    Ok(err) => *err,
                    Err(other) => MenuError::Handler {
                        state: state.name().to_string(),
                        source: Arc::from(other),
                    },
                };
                scope.report(err.clone());
                err
            })
        })
    }

    /// Slot holding the first error reported by this run
    pub(crate) fn first_error(&self) -> FirstError {
        Arc::clone(&self.reported)
    }

    /// Record the first error of this run and emit it
    ///
    /// Session errors are recorded but emitted by the session handle itself.
    fn report(&self, err: MenuError) {
        {
            let mut first = lock(&self.reported);
            if first.is_some() {
                tracing::debug!(error = %err, "Run already reported an error");
                return;
            }
            *first = Some(err.clone());
        }
        if !err.is_session() {
            self.sink.emit(err);
        }
    }

    fn respond(&self, kind: ResponseKind, text: String) {
        let Some(tx) = lock(&self.reply).take() else {
            tracing::warn!(kind = ?kind, "Response already sent, ignoring");
            return;
        };

        let response = self.formatter.format(kind, &text);
        if let Some(on_result) = &self.on_result {
            on_result(&response);
        }
        let callback = lock(&self.callback).take();
        if let Some(callback) = callback {
            callback(&response);
        }
        // The run may have been dropped by its caller
        let _ = tx.send(Reply { kind, response });
    }

    fn responded(&self) -> bool {
        lock(&self.reply).is_none()
    }
}

/// Context handed to a state handler
#[derive(Clone)]
pub struct StateContext {
    scope: Arc<RunScope>,
    state: Arc<State>,
}

impl StateContext {
    /// Input value the state was entered with
    ///
    /// Navigation keeps the value of the state that navigated.
    pub fn val(&self) -> &str {
        &self.scope.val
    }

    /// Name of the running state
    pub fn state_name(&self) -> &str {
        self.state.name()
    }

    /// The request being served
    pub fn args(&self) -> &UssdRequest {
        &self.scope.args
    }

    /// Session bound to the request, if a store is configured
    pub fn session(&self) -> Option<&Session> {
        self.scope.session.as_ref()
    }

    /// Respond and keep the session open for more input
    pub fn con(&self, text: impl Into<String>) -> HandlerResult {
        self.scope.respond(ResponseKind::Continue, text.into());
        Ok(())
    }

    /// Respond and terminate the session
    pub fn end(&self, text: impl Into<String>) -> HandlerResult {
        self.scope.respond(ResponseKind::End, text.into());
        Ok(())
    }

    /// Whether a response was already sent for this run
    pub fn responded(&self) -> bool {
        self.scope.responded()
    }

    /// Run the named state's handler without resolving a route
    pub fn go(&self, name: &str) -> BoxFuture<'static, HandlerResult> {
        let scope = Arc::clone(&self.scope);
        let name = name.to_string();
        Box::pin(async move {
            let state = match scope.registry.require(&name) {
                Ok(state) => state,
                Err(err) => {
                    scope.report(err.clone());
                    return Err(err.into());
                }
            };
            tracing::debug!(to = %name, "Navigating");
            scope.execute(state).await.map_err(Into::into)
        })
    }

    /// Run the start state's handler
    pub fn go_start(&self) -> BoxFuture<'static, HandlerResult> {
        self.go(START_STATE)
    }
}

impl std::fmt::Debug for StateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateContext")
            .field("state", &self.state.name())
            .field("val", &self.scope.val)
            .field("session", &self.scope.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::PrefixFormatter;
    use crate::state::StateOptions;

    fn scope_with(registry: StateRegistry, val: &str) -> (Arc<RunScope>, oneshot::Receiver<Reply>, ErrorSink) {
        let sink = ErrorSink::default();
        let (scope, rx) = RunScope::new(ScopeParts {
            registry: Arc::new(registry),
            args: Arc::new(UssdRequest::new("s1", val)),
            session: None,
            val: val.to_string(),
            formatter: Arc::new(PrefixFormatter::default()),
            sink: sink.clone(),
            on_result: None,
            callback: None,
        });
        (scope, rx, sink)
    }

    #[tokio::test]
    async fn test_first_response_wins() {
        let mut registry = StateRegistry::new();
        registry.declare(
            "a",
            StateOptions::new().run(|ctx: StateContext| async move {
                ctx.con("first")?;
                assert!(ctx.responded());
                ctx.end("second")
            }),
        );

        let (scope, rx, _sink) = scope_with(registry, "1");
        let state = scope.registry.require("a").unwrap();
        scope.execute(state).await.unwrap();

        let reply = rx.await.unwrap();
        assert_eq!(reply.kind, ResponseKind::Continue);
        assert_eq!(reply.response, Response::Text("CON first".to_string()));
    }

    #[tokio::test]
    async fn test_go_carries_value() {
        let mut registry = StateRegistry::new();
        registry.declare(
            "a",
            StateOptions::new().run(|ctx: StateContext| async move { ctx.go("b").await }),
        );
        registry.declare(
            "b",
            StateOptions::new().run(|ctx: StateContext| async move {
                let text = format!("{} got {}", ctx.state_name(), ctx.val());
                ctx.end(text)
            }),
        );

        let (scope, rx, _sink) = scope_with(registry, "7");
        let state = scope.registry.require("a").unwrap();
        scope.execute(state).await.unwrap();

        assert_eq!(rx.await.unwrap().response, Response::Text("END b got 7".to_string()));
    }

    #[tokio::test]
    async fn test_missing_handler_reported_once() {
        let mut registry = StateRegistry::new();
        registry.declare(
            "a",
            StateOptions::new().run(|ctx: StateContext| async move { ctx.go("empty").await }),
        );
        registry.declare("empty", StateOptions::new());

        let (scope, _rx, sink) = scope_with(registry, "");
        let mut errors = sink.subscribe();
        let state = scope.registry.require("a").unwrap();
        let err = scope.execute(state).await.unwrap_err();

        assert!(matches!(err, MenuError::HandlerMissing { ref state } if state == "empty"));
        assert!(matches!(errors.recv().await.unwrap(), MenuError::HandlerMissing { .. }));
        assert!(errors.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handler_error_wrapped() {
        let mut registry = StateRegistry::new();
        registry.declare(
            "a",
            StateOptions::new().run(|_ctx: StateContext| async move {
                let result: HandlerResult = Err(std::io::Error::other("balance service down").into());
                result
            }),
        );

        let (scope, _rx, sink) = scope_with(registry, "");
        let mut errors = sink.subscribe();
        let state = scope.registry.require("a").unwrap();
        let err = scope.execute(state).await.unwrap_err();

        assert!(matches!(err, MenuError::Handler { ref state, .. } if state == "a"));
        assert_eq!(errors.recv().await.unwrap().cause().as_deref(), Some("balance service down"));
    }
}
