//! Route resolution
//!
//! Walks a tokenized route through the state graph, starting at the start
//! state. For each token the current state's links are tested in declaration
//! order; the first match decides the next state. Unmatched tokens fall back
//! to the state's default target.
//!
//! ## Start state
//!
//! - A start state without links resolves straight to its default target,
//!   ignoring the route.
//! - A start state with a literal `""` link gets an empty token prepended, so
//!   that link can match before any real input.

use crate::error::{MenuError, Result};
use crate::session::Session;
use crate::state::{State, StateRegistry, START_STATE};
use crate::types::UssdRequest;
use std::collections::VecDeque;
use std::sync::Arc;

/// Separator between route tokens
pub const ROUTE_DELIMITER: char = '*';

/// Split a route into tokens; the empty route has none
pub fn tokenize(route: &str) -> VecDeque<String> {
    if route.is_empty() {
        return VecDeque::new();
    }
    route.split(ROUTE_DELIMITER).map(str::to_string).collect()
}

/// Context handed to link target functions
#[derive(Debug, Clone)]
pub struct TargetContext {
    args: Arc<UssdRequest>,
    state: String,
    val: String,
    session: Option<Session>,
}

impl TargetContext {
    /// Request being resolved
    pub fn args(&self) -> &UssdRequest {
        &self.args
    }

    /// State whose link matched
    pub fn state_name(&self) -> &str {
        &self.state
    }

    /// Token that matched the link
    pub fn val(&self) -> &str {
        &self.val
    }

    /// Session bound to the request, if a store is configured
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

/// Resolved state and the token it was entered with
#[derive(Debug, Clone)]
pub struct Resolution {
    pub state: Arc<State>,
    pub val: String,
}

/// Route walk parameters
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    registry: &'a StateRegistry,
    args: Arc<UssdRequest>,
    session: Option<Session>,
    strict: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a StateRegistry, args: Arc<UssdRequest>) -> Self {
        Self {
            registry,
            args,
            session: None,
            strict: false,
        }
    }

    /// Session exposed to target functions
    pub fn with_session(mut self, session: Option<Session>) -> Self {
        self.session = session;
        self
    }

    /// Fail on unmatched tokens when no default is declared
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Resolve `route` from the start state
    pub async fn resolve(&self, route: &str) -> Result<Resolution> {
        self.resolve_from(START_STATE, route).await
    }

    /// Resolve `route` from the named state
    pub async fn resolve_from(&self, start: &str, route: &str) -> Result<Resolution> {
        let mut tokens = tokenize(route);
        let mut state = self.registry.require(start)?;

        if state.links().is_empty() {
            let target = self.registry.require(state.fallback())?;
            tracing::debug!(
                from = %state.name(),
                to = %target.name(),
                "Start state has no links, using fallback"
            );
            return Ok(Resolution {
                state: target,
                val: String::new(),
            });
        }

        if state.has_empty_rule() {
            tokens.push_front(String::new());
        }

        let mut val = String::new();
        while let Some(token) = tokens.pop_front() {
            state = self.step(&state, &token).await?;
            val = token;
        }

        tracing::debug!(route = %route, state = %state.name(), val = %val, "Route resolved");
        Ok(Resolution { state, val })
    }

    /// Consume one token from `state`
    async fn step(&self, state: &Arc<State>, token: &str) -> Result<Arc<State>> {
        for link in state.links() {
            if !link.rule.matches(token)? {
                continue;
            }

            let ctx = TargetContext {
                args: Arc::clone(&self.args),
                state: state.name().to_string(),
                val: token.to_string(),
                session: self.session.clone(),
            };
            let name = link
                .target
                .transition(ctx)
                .settle()
                .await
                .map_err(|source| MenuError::Target {
                    state: state.name().to_string(),
                    token: token.to_string(),
                    source,
                })?;

            tracing::debug!(
                from = %state.name(),
                to = %name,
                token = %token,
                rule = %link.rule.as_declared(),
                "Link matched"
            );
            return self.registry.require(&name);
        }

        match state.default_next() {
            Some(name) => {
                tracing::debug!(from = %state.name(), to = %name, token = %token, "No link matched, using default");
                self.registry.require(name)
            }
            None if self.strict => Err(MenuError::NoMatch {
                state: state.name().to_string(),
                token: token.to_string(),
            }),
            None => Ok(Arc::clone(state)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{StateOptions, Transition};

    fn args() -> Arc<UssdRequest> {
        Arc::new(UssdRequest::new("session-1", ""))
    }

    async fn resolve(registry: &StateRegistry, route: &str) -> Result<Resolution> {
        Resolver::new(registry, args()).resolve(route).await
    }

    fn simple_menu() -> StateRegistry {
        let mut registry = StateRegistry::new();
        registry.declare(
            START_STATE,
            StateOptions::new().next("1", "state1").next("2", "state2"),
        );
        registry.declare(
            "state1",
            StateOptions::new()
                .next("1", "state1.1")
                .next("2", "state1.2")
                .default_next("state1.default"),
        );
        registry.declare("state2", StateOptions::new());
        registry.declare("state1.1", StateOptions::new());
        registry.declare("state1.2", StateOptions::new());
        registry.declare("state1.default", StateOptions::new());
        registry
    }

    #[test]
    fn test_tokenize() {
        assert!(tokenize("").is_empty());
        assert_eq!(tokenize("1"), vec!["1"]);
        assert_eq!(tokenize("1*2*7"), vec!["1", "2", "7"]);
        assert_eq!(tokenize("1**2"), vec!["1", "", "2"]);
    }

    #[tokio::test]
    async fn test_empty_route_resolves_start() {
        let registry = simple_menu();
        let res = resolve(&registry, "").await.unwrap();
        assert_eq!(res.state.name(), START_STATE);
        assert_eq!(res.val, "");
    }

    #[tokio::test]
    async fn test_literal_walk() {
        let registry = simple_menu();
        let res = resolve(&registry, "1*2").await.unwrap();
        assert_eq!(res.state.name(), "state1.2");
        assert_eq!(res.val, "2");
    }

    #[tokio::test]
    async fn test_default_keeps_unmatched_token() {
        let registry = simple_menu();
        let res = resolve(&registry, "1*invalid").await.unwrap();
        assert_eq!(res.state.name(), "state1.default");
        assert_eq!(res.val, "invalid");
    }

    #[tokio::test]
    async fn test_no_default_stays_on_state() {
        let registry = simple_menu();
        let res = resolve(&registry, "2*9").await.unwrap();
        assert_eq!(res.state.name(), "state2");
        assert_eq!(res.val, "9");
    }

    #[tokio::test]
    async fn test_strict_no_match_fails() {
        let registry = simple_menu();
        let err = Resolver::new(&registry, args())
            .strict(true)
            .resolve("2*9")
            .await
            .unwrap_err();
        assert!(matches!(err, MenuError::NoMatch { ref state, ref token } if state == "state2" && token == "9"));
    }

    #[tokio::test]
    async fn test_empty_rule_followed() {
        let mut registry = StateRegistry::new();
        registry.declare(
            START_STATE,
            StateOptions::new().next("", "welcome").next("1", "direct"),
        );
        registry.declare("welcome", StateOptions::new().next("1", "menu1"));
        registry.declare("direct", StateOptions::new());
        registry.declare("menu1", StateOptions::new());

        let res = resolve(&registry, "").await.unwrap();
        assert_eq!(res.state.name(), "welcome");
        assert_eq!(res.val, "");

        let res = resolve(&registry, "1").await.unwrap();
        assert_eq!(res.state.name(), "menu1");
    }

    #[tokio::test]
    async fn test_start_without_links_short_circuits() {
        let mut registry = StateRegistry::new();
        registry.declare(START_STATE, StateOptions::new().default_next("menu"));
        registry.declare("menu", StateOptions::new().next("1", "never"));

        for route in ["", "1", "1*2*3"] {
            let res = resolve(&registry, route).await.unwrap();
            assert_eq!(res.state.name(), "menu", "route {:?}", route);
            assert_eq!(res.val, "");
        }
    }

    #[tokio::test]
    async fn test_declaration_order_is_priority() {
        let mut regex_first = StateRegistry::new();
        regex_first.declare(
            START_STATE,
            StateOptions::new().next("*\\d+", "regex").next("1", "literal"),
        );
        regex_first.declare("regex", StateOptions::new());
        regex_first.declare("literal", StateOptions::new());
        assert_eq!(resolve(&regex_first, "1").await.unwrap().state.name(), "regex");

        let mut literal_first = StateRegistry::new();
        literal_first.declare(
            START_STATE,
            StateOptions::new().next("1", "literal").next("*\\d+", "regex"),
        );
        literal_first.declare("regex", StateOptions::new());
        literal_first.declare("literal", StateOptions::new());
        assert_eq!(resolve(&literal_first, "1").await.unwrap().state.name(), "literal");
        assert_eq!(resolve(&literal_first, "5").await.unwrap().state.name(), "regex");
    }

    #[tokio::test]
    async fn test_dangling_target() {
        let mut registry = StateRegistry::new();
        registry.declare(START_STATE, StateOptions::new().next("1", "doesNotExist"));

        let err = resolve(&registry, "1").await.unwrap_err();
        assert!(err.is_resolution());
        assert!(matches!(err, MenuError::UnknownState { ref name } if name == "doesNotExist"));
    }

    #[tokio::test]
    async fn test_dangling_default() {
        let mut registry = StateRegistry::new();
        registry.declare(
            START_STATE,
            StateOptions::new().next("1", "a").default_next("missing"),
        );
        registry.declare("a", StateOptions::new());

        let err = resolve(&registry, "x").await.unwrap_err();
        assert!(matches!(err, MenuError::UnknownState { ref name } if name == "missing"));
    }

    #[tokio::test]
    async fn test_function_targets() {
        let mut registry = StateRegistry::new();
        registry.declare(
            START_STATE,
            StateOptions::new()
                .next_with("1", |_| Transition::to("sync"))
                .next_with("2", |_| {
                    Transition::callback(|done| {
                        tokio::spawn(async move {
                            done.ok("callback".to_string());
                        });
                    })
                })
                .next_with("3", |ctx| {
                    let val = ctx.val().to_string();
                    Transition::deferred(async move { Ok(format!("deferred{}", val)) })
                }),
        );
        registry.declare("sync", StateOptions::new());
        registry.declare("callback", StateOptions::new());
        registry.declare("deferred3", StateOptions::new());

        assert_eq!(resolve(&registry, "1").await.unwrap().state.name(), "sync");
        assert_eq!(resolve(&registry, "2").await.unwrap().state.name(), "callback");
        let res = resolve(&registry, "3").await.unwrap();
        assert_eq!(res.state.name(), "deferred3");
        assert_eq!(res.val, "3");
    }

    #[tokio::test]
    async fn test_function_target_error() {
        let mut registry = StateRegistry::new();
        registry.declare(
            START_STATE,
            StateOptions::new().next_with("1", |_| {
                Transition::deferred(async { Err(crate::error::backend_error("lookup failed")) })
            }),
        );

        let err = resolve(&registry, "1").await.unwrap_err();
        assert!(matches!(err, MenuError::Target { .. }));
        assert_eq!(err.cause().as_deref(), Some("lookup failed"));
    }

    #[tokio::test]
    async fn test_only_first_match_evaluated() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = StateRegistry::new();
        registry.declare(
            START_STATE,
            StateOptions::new().next("1", "first").next_with("*.*", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Transition::to("second")
            }),
        );
        registry.declare("first", StateOptions::new());
        registry.declare("second", StateOptions::new());

        assert_eq!(resolve(&registry, "1").await.unwrap().state.name(), "first");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_start_state() {
        let registry = StateRegistry::new();
        let err = resolve(&registry, "").await.unwrap_err();
        assert!(matches!(err, MenuError::UnknownState { ref name } if name == START_STATE));
    }
}
