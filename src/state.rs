//! State registry
//!
//! States are declared once, before any route is resolved, and are immutable
//! afterwards. Each state carries an optional run handler, an ordered list of
//! link rules and an optional default target.

use crate::completion::Completion;
use crate::context::{HandlerResult, StateContext, StateHandler};
use crate::error::{BackendResult, MenuError, Result};
use crate::resolver::TargetContext;
use crate::rule::Rule;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Reserved name of the entry-point state
pub const START_STATE: &str = "__start__";

/// Function computing a link target at resolution time
pub type TargetFn = Arc<dyn Fn(TargetContext) -> Transition + Send + Sync>;

/// Where a matched link leads
#[derive(Clone)]
pub enum Target {
    /// A state name
    State(String),
    /// A function producing the state name
    Resolve(TargetFn),
}

impl Target {
    /// Target computed by a function
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn(TargetContext) -> Transition + Send + Sync + 'static,
    {
        Self::Resolve(Arc::new(f))
    }

    /// Produce the transition for this target
    pub(crate) fn transition(&self, ctx: TargetContext) -> Transition {
        match self {
            Self::State(name) => Transition::Immediate(name.clone()),
            Self::Resolve(f) => f(ctx),
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::State(name) => f.debug_tuple("State").field(name).finish(),
            Self::Resolve(_) => f.write_str("Resolve(..)"),
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::State(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self::State(name)
    }
}

/// Outcome of a target function
///
/// `Immediate` names the state right away; `Deferred` settles later, either
/// from a future or from an error-first callback (see [`Transition::callback`]).
pub enum Transition {
    Immediate(String),
    Deferred(BoxFuture<'static, BackendResult<String>>),
}

impl Transition {
    /// Transition known synchronously
    pub fn to(name: impl Into<String>) -> Self {
        Self::Immediate(name.into())
    }

    /// Transition settled by a future
    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future<Output = BackendResult<String>> + Send + 'static,
    {
        Self::Deferred(Box::pin(fut))
    }

    /// Transition settled through a completion callback
    ///
    /// `f` runs immediately and may invoke the completion now or later, from
    /// any task. Only the first invocation counts.
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(Completion<String>),
    {
        let (done, pending) = Completion::channel();
        f(done);
        Self::Deferred(Box::pin(pending.wait()))
    }

    /// Wait for the target state name
    pub(crate) async fn settle(self) -> BackendResult<String> {
        match self {
            Self::Immediate(name) => Ok(name),
            Self::Deferred(fut) => fut.await,
        }
    }
}

impl From<&str> for Transition {
    fn from(name: &str) -> Self {
        Self::to(name)
    }
}

impl From<String> for Transition {
    fn from(name: String) -> Self {
        Self::Immediate(name)
    }
}

/// A link rule and the target it leads to
#[derive(Debug, Clone)]
pub struct Link {
    pub rule: Rule,
    pub target: Target,
}

/// Declaration options for a state
#[derive(Default)]
pub struct StateOptions {
    run: Option<Arc<dyn StateHandler>>,
    next: Vec<Link>,
    default_next: Option<String>,
}

impl StateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handler invoked when the state is entered
    pub fn run<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(StateContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.run = Some(Arc::new(handler));
        self
    }

    /// Set a handler implementing `StateHandler` directly
    pub fn handler(mut self, handler: impl StateHandler + 'static) -> Self {
        self.run = Some(Arc::new(handler));
        self
    }

    /// Append a link; declaration order is match priority
    pub fn next(mut self, rule: impl Into<Rule>, target: impl Into<Target>) -> Self {
        self.next.push(Link {
            rule: rule.into(),
            target: target.into(),
        });
        self
    }

    /// Append a link whose target is computed by `f`
    pub fn next_with<F>(self, rule: impl Into<Rule>, f: F) -> Self
    where
        F: Fn(TargetContext) -> Transition + Send + Sync + 'static,
    {
        self.next(rule, Target::resolver(f))
    }

    /// State to enter when no link matches
    pub fn default_next(mut self, name: impl Into<String>) -> Self {
        self.default_next = Some(name.into());
        self
    }
}

/// A declared state
pub struct State {
    name: String,
    run: Option<Arc<dyn StateHandler>>,
    links: Vec<Link>,
    default_next: Option<String>,
}

impl State {
    pub(crate) fn new(name: impl Into<String>, options: StateOptions) -> Self {
        Self {
            name: name.into(),
            run: options.run,
            links: options.next,
            default_next: options.default_next,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Links in declaration order
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Explicitly declared default target
    pub fn default_next(&self) -> Option<&str> {
        self.default_next.as_deref()
    }

    /// Default target, falling back to the state itself
    pub fn fallback(&self) -> &str {
        self.default_next.as_deref().unwrap_or(&self.name)
    }

    pub fn handler(&self) -> Option<&Arc<dyn StateHandler>> {
        self.run.as_ref()
    }

    /// Whether the state declares a literal rule for the empty token
    pub fn has_empty_rule(&self) -> bool {
        self.links.iter().any(|link| link.rule.is_empty_literal())
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("run", &self.run.is_some())
            .field("links", &self.links)
            .field("default_next", &self.default_next)
            .finish()
    }
}

/// Mapping from state name to state definition
#[derive(Debug, Clone, Default)]
pub struct StateRegistry {
    states: HashMap<String, Arc<State>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a state, replacing any previous declaration under the same name
    pub fn declare(&mut self, name: impl Into<String>, options: StateOptions) {
        let name = name.into();
        tracing::debug!(state = %name, links = options.next.len(), "State declared");
        self.states
            .insert(name.clone(), Arc::new(State::new(name, options)));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<State>> {
        self.states.get(name)
    }

    /// Look up a state, failing for undeclared names
    pub fn require(&self, name: &str) -> Result<Arc<State>> {
        self.states
            .get(name)
            .cloned()
            .ok_or_else(|| MenuError::UnknownState {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Declared state names, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }
}
