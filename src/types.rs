//! Request and response types for ussd-menu
//!
//! Gateway-native records keep the field names their providers use on the wire.

use serde::{Deserialize, Serialize};

/// Normalized gateway request
///
/// Direct-route gateways (Africa's Talking and compatible) post this shape
/// as-is: `text` carries the full accumulated route (e.g. `1*2*7`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UssdRequest {
    /// Route text, or the latest fragment for accumulate-style gateways
    #[serde(default)]
    pub text: String,

    /// Gateway session identifier
    pub session_id: String,

    /// Caller phone number in international format
    #[serde(default)]
    pub phone_number: String,

    /// Dialled service code (e.g. `*111#`)
    #[serde(default)]
    pub service_code: String,

    /// Set when the gateway signals the opening request of a session
    ///
    /// The route accumulator is reset and the request resolves as empty input.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub initiation: bool,
}

impl UssdRequest {
    /// Create a request for the given session and route text
    pub fn new(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    /// Set the caller phone number
    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = phone_number.into();
        self
    }

    /// Set the service code
    pub fn with_service_code(mut self, service_code: impl Into<String>) -> Self {
        self.service_code = service_code.into();
        self
    }
}

/// Hubtel request body
///
/// Hubtel delivers only the latest fragment per request, so routes are
/// accumulated in the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HubtelRequest {
    /// Caller number without the leading `+`
    pub mobile: String,

    pub session_id: String,

    pub service_code: String,

    /// `Initiation`, `Response`, `Release` or `Timeout`
    #[serde(rename = "Type")]
    pub kind: String,

    /// Latest input fragment
    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
}

/// Hubtel request type opening a session
pub const HUBTEL_INITIATION: &str = "Initiation";

impl HubtelRequest {
    /// Whether this request opens a new session
    pub fn is_initiation(&self) -> bool {
        self.kind == HUBTEL_INITIATION
    }
}

impl From<HubtelRequest> for UssdRequest {
    fn from(req: HubtelRequest) -> Self {
        let initiation = req.is_initiation();
        Self {
            // The initiation message is the dialled code, not menu input
            text: if initiation { String::new() } else { req.message },
            session_id: req.session_id,
            phone_number: format!("+{}", req.mobile),
            service_code: req.service_code,
            initiation,
        }
    }
}

/// Kind of response emitted by a state handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseKind {
    /// More input expected, session stays open
    Continue,
    /// Session terminates
    End,
}

/// Formatted response returned to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Plain text body (e.g. `CON Choose option`)
    Text(String),
    /// Structured body (e.g. Hubtel `{"Type": "Response", "Message": ...}`)
    Record(ResponseRecord),
}

impl Response {
    /// Text body, if this is a plain text response
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Record(_) => None,
        }
    }

    /// Structured body, if this is a record response
    pub fn as_record(&self) -> Option<&ResponseRecord> {
        match self {
            Self::Text(_) => None,
            Self::Record(record) => Some(record),
        }
    }
}

/// Structured response record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseRecord {
    #[serde(rename = "Type")]
    pub kind: String,

    pub message: String,
}
