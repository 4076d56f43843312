//! Error types for ussd-menu

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by user code: session backends, link resolvers and handlers
///
/// Held behind an `Arc` so errors can be broadcast and returned at the same time.
pub type BackendError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type for session backends and link resolvers
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Build a `BackendError` from anything that converts into a boxed error
///
/// Accepts string messages as well as concrete error types.
pub fn backend_error(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> BackendError {
    Arc::from(err.into())
}

/// Session operation that produced a `MenuError::Session`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    Start,
    Get,
    Set,
    End,
}

impl fmt::Display for SessionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Get => "get",
            Self::Set => "set",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while building or running a menu
#[derive(Debug, Clone, Error)]
pub enum MenuError {
    /// A link, default or navigation call names a state that was never declared
    #[error("Declared state does not exist: {name}")]
    UnknownState { name: String },

    /// No link rule matched and the state declares no default (strict links only)
    #[error("No link from state '{state}' matches input '{token}'")]
    NoMatch { state: String, token: String },

    /// A `*`-prefixed rule does not compile as a regular expression
    #[error("Invalid link pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A link resolver function failed to produce a target
    #[error("Link resolver on state '{state}' failed for input '{token}': {source}")]
    Target {
        state: String,
        token: String,
        #[source]
        source: BackendError,
    },

    /// The reached state has no run handler
    #[error("State run function not defined: {state}")]
    HandlerMissing { state: String },

    /// The state handler returned an error
    #[error("State '{state}' handler failed: {source}")]
    Handler {
        state: String,
        #[source]
        source: BackendError,
    },

    /// The handler finished without calling con or end
    #[error("State '{state}' completed without a response")]
    NoResponse { state: String },

    /// Session backend failure
    #[error("Session {op} failed: {source}")]
    Session {
        op: SessionOp,
        #[source]
        source: BackendError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(Arc<serde_json::Error>),
}

impl From<serde_json::Error> for MenuError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(err))
    }
}

impl MenuError {
    /// Whether this error came from walking the state graph
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::UnknownState { .. }
                | Self::NoMatch { .. }
                | Self::InvalidPattern { .. }
                | Self::Target { .. }
        )
    }

    /// Whether this error was surfaced by the session backend
    pub fn is_session(&self) -> bool {
        matches!(self, Self::Session { .. })
    }

    /// Whether this error is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Original message of the backend failure, if any
    pub fn cause(&self) -> Option<String> {
        match self {
            Self::Target { source, .. }
            | Self::Handler { source, .. }
            | Self::Session { source, .. } => Some(source.to_string()),
            Self::InvalidPattern { source, .. } => Some(source.to_string()),
            _ => None,
        }
    }
}

/// Result type alias for menu operations
pub type Result<T> = std::result::Result<T, MenuError>;
