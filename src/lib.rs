//! # ussd-menu
//!
//! State-graph menu engine for USSD gateways with pluggable session storage.
//!
//! ## Overview
//!
//! A caller sends successive input fragments (`1`, `1*2`, `1*2*7`). The menu
//! walks the accumulated route through a graph of declared states, matching
//! each token against the current state's link rules, and runs the handler of
//! the state it lands on. The handler answers with `con` (prompt for more
//! input) or `end` (terminate the session).
//!
//! ## Quick Start
//!
//! ```rust
//! use ussd_menu::{Menu, StateContext, StateOptions, UssdRequest};
//!
//! # async fn example() -> ussd_menu::Result<()> {
//! let mut menu = Menu::new();
//!
//! menu.start_state(
//!     StateOptions::new()
//!         .run(|ctx: StateContext| async move {
//!             ctx.con("Welcome. Choose option:\n1. Show Balance\n2. Buy Airtime")
//!         })
//!         .next("1", "showBalance")
//!         .next("2", "buyAirtime"),
//! )
//! .state(
//!     "showBalance",
//!     StateOptions::new().run(|ctx: StateContext| async move {
//!         ctx.end("Your balance is KES 100")
//!     }),
//! )
//! .state(
//!     "buyAirtime",
//!     StateOptions::new()
//!         .run(|ctx: StateContext| async move { ctx.con("Enter amount:") })
//!         .next("*\\d+", "buyAirtime.amount"),
//! )
//! .state(
//!     "buyAirtime.amount",
//!     StateOptions::new().run(|ctx: StateContext| async move {
//!         let amount = ctx.val().to_string();
//!         ctx.end(format!("Bought airtime worth {}", amount))
//!     }),
//! );
//!
//! let response = menu.run(UssdRequest::new("session-1", "2*100")).await?;
//! assert_eq!(response.as_text(), Some("END Bought airtime worth 100"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Link rules
//!
//! - Literal rules match a token exactly; `*`-prefixed rules are regular
//!   expressions searched anywhere in the token.
//! - Rules are tested in declaration order and the first match wins.
//! - A target is a state name or a function returning a [`Transition`]:
//!   immediate, future-backed or callback-backed.
//!
//! ## Sessions
//!
//! - **SessionStore** trait: canonical async backend interface
//! - **MemorySessionStore**: in-process store for tests and single-process use
//! - **CallbackStore**: adapter for error-first callback backends
//!
//! ## Errors
//!
//! Each menu owns an error channel ([`Menu::subscribe_errors`]). Failures
//! while serving a request are emitted there once and also returned from
//! [`Menu::run`].

pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod menu;
pub mod resolver;
pub mod rule;
pub mod session;
pub mod sink;
pub mod state;
pub mod types;

// Re-export core types
pub use completion::Completion;
pub use config::MenuConfig;
pub use context::{HandlerResult, StateContext, StateHandler};
pub use error::{backend_error, BackendError, BackendResult, MenuError, Result, SessionOp};
pub use gateway::{HubtelFormatter, PrefixFormatter, Provider, ResponseFormatter, RouteMode};
pub use menu::Menu;
pub use resolver::{Resolution, Resolver, TargetContext, ROUTE_DELIMITER};
pub use rule::Rule;
pub use session::{Session, SessionStore};
pub use sink::ErrorSink;
pub use state::{State, StateOptions, StateRegistry, Target, Transition, START_STATE};
pub use types::{HubtelRequest, Response, ResponseKind, ResponseRecord, UssdRequest};

// Re-export stores for convenience
pub use session::callback::CallbackStore;
pub use session::memory::MemorySessionStore;
