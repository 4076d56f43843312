//! Menu engine
//!
//! `Menu` owns the state registry, the optional session store and the error
//! channel. Each `run` call starts the session, works out the route, resolves
//! it to a state and runs that state's handler until it responds.

use crate::config::MenuConfig;
use crate::context::{ResultCallback, RunScope, ScopeParts, SharedCallback};
use crate::error::{MenuError, Result};
use crate::gateway::{Provider, ResponseFormatter, RouteMode};
use crate::resolver::{Resolution, Resolver, ROUTE_DELIMITER};
use crate::session::{Session, SessionStore};
use crate::sink::ErrorSink;
use crate::state::{StateOptions, StateRegistry, START_STATE};
use crate::types::{Response, ResponseKind, UssdRequest};
use std::sync::{Arc, PoisonError};
use tokio::sync::broadcast;

/// USSD menu backed by a declared state graph
///
/// Declare states first, then call [`Menu::run`] once per gateway request.
/// Every run works on its own context, so one menu can serve concurrent
/// requests.
pub struct Menu {
    config: MenuConfig,
    states: Arc<StateRegistry>,
    store: Option<Arc<dyn SessionStore>>,
    formatter: Arc<dyn ResponseFormatter>,
    on_result: Option<SharedCallback>,
    sink: ErrorSink,
}

impl Menu {
    /// Create a menu with the default configuration
    pub fn new() -> Self {
        Self::build(MenuConfig::default())
    }

    /// Create a menu from a configuration
    pub fn with_config(config: MenuConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create a menu for a provider name (e.g., "hubtel")
    pub fn for_provider(name: &str) -> Result<Self> {
        let provider: Provider = name.parse()?;
        Ok(Self::build(MenuConfig::for_provider(provider)))
    }

    fn build(config: MenuConfig) -> Self {
        Self {
            formatter: config.provider.formatter(),
            sink: ErrorSink::new(config.error_capacity),
            states: Arc::new(StateRegistry::new()),
            store: None,
            on_result: None,
            config,
        }
    }

    pub fn config(&self) -> &MenuConfig {
        &self.config
    }

    /// Declare a state
    pub fn state(&mut self, name: impl Into<String>, options: StateOptions) -> &mut Self {
        Arc::make_mut(&mut self.states).declare(name, options);
        self
    }

    /// Declare the start state
    pub fn start_state(&mut self, options: StateOptions) -> &mut Self {
        self.state(START_STATE, options)
    }

    pub fn states(&self) -> &StateRegistry {
        &self.states
    }

    /// Configure session storage
    pub fn session_config(&mut self, store: impl SessionStore + 'static) -> &mut Self {
        tracing::debug!(store = %store.name(), "Session store configured");
        self.store = Some(Arc::new(store));
        self
    }

    /// Replace the provider's response formatter
    pub fn formatter(&mut self, formatter: impl ResponseFormatter + 'static) -> &mut Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Register a callback invoked with every response
    pub fn on_result(&mut self, callback: impl Fn(&Response) + Send + Sync + 'static) -> &mut Self {
        self.on_result = Some(Arc::new(callback));
        self
    }

    /// Subscribe to errors raised while serving requests
    pub fn subscribe_errors(&self) -> broadcast::Receiver<MenuError> {
        self.sink.subscribe()
    }

    /// The menu's error channel
    pub fn errors(&self) -> &ErrorSink {
        &self.sink
    }

    /// Session handle for a session id, if a store is configured
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.store
            .as_ref()
            .map(|store| Session::new(session_id, Arc::clone(store), self.sink.clone()))
    }

    /// Serve a request
    ///
    /// Resolves with the formatted response. Failures are emitted on the error
    /// channel and returned as `Err`.
    pub async fn run(&self, request: impl Into<UssdRequest>) -> Result<Response> {
        self.serve(request.into(), None).await
    }

    /// Serve a request, also passing the response to `on_result`
    pub async fn run_with<F>(&self, request: impl Into<UssdRequest>, on_result: F) -> Result<Response>
    where
        F: FnOnce(&Response) + Send + 'static,
    {
        self.serve(request.into(), Some(Box::new(on_result))).await
    }

    /// Serve a provider-native request body
    pub async fn run_raw(&self, raw: serde_json::Value) -> Result<Response> {
        let request = self
            .config
            .provider
            .parse_request(raw)
            .map_err(|e| self.fail(e))?;
        self.serve(request, None).await
    }

    /// Resolve a route without running any handler
    pub async fn resolve_route(&self, request: &UssdRequest, route: &str) -> Result<Resolution> {
        Resolver::new(&self.states, Arc::new(request.clone()))
            .with_session(self.session(&request.session_id))
            .strict(self.config.strict_links)
            .resolve(route)
            .await
    }

    async fn serve(&self, request: UssdRequest, callback: Option<ResultCallback>) -> Result<Response> {
        let args = Arc::new(request);
        let session = self.session(&args.session_id);
        tracing::debug!(
            session = %args.session_id,
            text = %args.text,
            provider = %self.config.provider.as_str(),
            "Menu run"
        );

        if let Some(session) = &session {
            session.start().await?;
        }

        let route = self.route(&args, session.as_ref()).await?;
        let resolution = Resolver::new(&self.states, Arc::clone(&args))
            .with_session(session.clone())
            .strict(self.config.strict_links)
            .resolve(&route)
            .await
            .map_err(|e| self.fail(e))?;

        let state_name = resolution.state.name().to_string();
        let (scope, reply) = RunScope::new(ScopeParts {
            registry: Arc::clone(&self.states),
            args,
            session: session.clone(),
            val: resolution.val,
            formatter: Arc::clone(&self.formatter),
            sink: self.sink.clone(),
            on_result: self.on_result.clone(),
            callback,
        });
        let first_error = scope.first_error();
        let outcome = scope.execute(resolution.state).await;
        // Contexts moved into spawned tasks keep the reply slot alive
        drop(scope);
        outcome?;

        let reply = match reply.await {
            Ok(reply) => reply,
            Err(_) => {
                let reported = first_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                // An error the handler swallowed was already emitted
                return Err(match reported {
                    Some(err) => err,
                    None => self.fail(MenuError::NoResponse { state: state_name }),
                });
            }
        };

        if reply.kind == ResponseKind::End {
            if let Some(session) = &session {
                if let Err(e) = session.end().await {
                    tracing::warn!(session = %session.id(), error = %e, "Session teardown failed");
                }
            }
        }

        Ok(reply.response)
    }

    /// Route text to resolve for this request
    async fn route(&self, args: &UssdRequest, session: Option<&Session>) -> Result<String> {
        if self.config.provider.route_mode() == RouteMode::Direct {
            return Ok(args.text.clone());
        }

        let session = session.ok_or_else(|| {
            self.fail(MenuError::Config(format!(
                "Session config required for {} provider",
                self.config.provider
            )))
        })?;
        let key = self.config.route_key.as_str();

        if args.initiation {
            session.set(key, "").await?;
            return Ok(String::new());
        }

        let previous: Option<String> = session.get_as(key).await.map_err(|e| self.fail(e))?;
        let route = match previous.as_deref() {
            None | Some("") => args.text.clone(),
            Some(prev) => format!("{}{}{}", prev, ROUTE_DELIMITER, args.text),
        };
        session.set(key, &route).await?;

        tracing::debug!(session = %session.id(), route = %route, "Route accumulated");
        Ok(route)
    }

    /// Emit an error unless the session handle already did
    fn fail(&self, err: MenuError) -> MenuError {
        if !err.is_session() {
            self.sink.emit(err.clone());
        }
        err
    }
}

impl Default for Menu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Menu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Menu")
            .field("config", &self.config)
            .field("states", &self.states.len())
            .field("store", &self.store.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}
