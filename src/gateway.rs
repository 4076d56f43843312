//! Gateway providers
//!
//! A provider decides how the route reaches the menu (full route per request,
//! or one fragment per request accumulated in the session) and how responses
//! are formatted on the wire. Formatting is injectable through
//! [`ResponseFormatter`].

use crate::error::{MenuError, Result};
use crate::types::{HubtelRequest, Response, ResponseKind, ResponseRecord, UssdRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// How the gateway delivers the route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    /// Every request carries the full accumulated route
    Direct,
    /// Every request carries only the latest fragment
    Accumulate,
}

/// Supported USSD gateway providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provider {
    #[default]
    AfricasTalking,
    Hubtel,
}

impl Provider {
    /// Configuration name (e.g., "africasTalking", "hubtel")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AfricasTalking => "africasTalking",
            Self::Hubtel => "hubtel",
        }
    }

    pub fn route_mode(&self) -> RouteMode {
        match self {
            Self::AfricasTalking => RouteMode::Direct,
            Self::Hubtel => RouteMode::Accumulate,
        }
    }

    /// Default response formatter
    pub fn formatter(&self) -> Arc<dyn ResponseFormatter> {
        match self {
            Self::AfricasTalking => Arc::new(PrefixFormatter::default()),
            Self::Hubtel => Arc::new(HubtelFormatter),
        }
    }

    /// Parse a provider-native request body
    pub fn parse_request(&self, raw: serde_json::Value) -> Result<UssdRequest> {
        match self {
            Self::AfricasTalking => Ok(serde_json::from_value(raw)?),
            Self::Hubtel => {
                let req: HubtelRequest = serde_json::from_value(raw)?;
                Ok(req.into())
            }
        }
    }
}

impl FromStr for Provider {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "africasTalking" => Ok(Self::AfricasTalking),
            "hubtel" => Ok(Self::Hubtel),
            other => Err(MenuError::Config(format!("Unsupported provider: {}", other))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AfricasTalking => f.write_str("Africa's Talking"),
            Self::Hubtel => f.write_str("Hubtel"),
        }
    }
}

/// Turns handler text into the gateway response body
pub trait ResponseFormatter: Send + Sync {
    fn format(&self, kind: ResponseKind, message: &str) -> Response;
}

/// Plain text responses prefixed with `CON` / `END`
#[derive(Debug, Clone)]
pub struct PrefixFormatter {
    pub continue_prefix: String,
    pub end_prefix: String,
}

impl Default for PrefixFormatter {
    fn default() -> Self {
        Self {
            continue_prefix: "CON".to_string(),
            end_prefix: "END".to_string(),
        }
    }
}

impl ResponseFormatter for PrefixFormatter {
    fn format(&self, kind: ResponseKind, message: &str) -> Response {
        let prefix = match kind {
            ResponseKind::Continue => &self.continue_prefix,
            ResponseKind::End => &self.end_prefix,
        };
        Response::Text(format!("{} {}", prefix, message))
    }
}

/// Hubtel `{"Type": "Response" | "Release", "Message": ...}` records
#[derive(Debug, Clone, Copy, Default)]
pub struct HubtelFormatter;

impl ResponseFormatter for HubtelFormatter {
    fn format(&self, kind: ResponseKind, message: &str) -> Response {
        let kind = match kind {
            ResponseKind::Continue => "Response",
            ResponseKind::End => "Release",
        };
        Response::Record(ResponseRecord {
            kind: kind.to_string(),
            message: message.to_string(),
        })
    }
}
