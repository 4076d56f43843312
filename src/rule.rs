//! Link rule matching
//!
//! A rule is either a literal compared for equality against an input token,
//! or a pattern: a rule string starting with `*` whose remainder is a regular
//! expression searched anywhere in the token.

use crate::error::{MenuError, Result};
use regex::Regex;

/// Prefix marking a rule as a regular expression
pub const PATTERN_SENTINEL: char = '*';

/// A single link rule declared on a state
#[derive(Debug, Clone)]
pub enum Rule {
    /// Exact match against the token
    Literal(String),
    /// Regular expression search against the token
    Pattern {
        /// Expression text, without the sentinel
        source: String,
        /// Compiled expression; compile errors surface when the rule is evaluated
        regex: std::result::Result<Regex, regex::Error>,
    },
}

impl Rule {
    /// Parse a rule string, treating a leading `*` as a pattern marker
    pub fn new(rule: impl Into<String>) -> Self {
        let rule = rule.into();
        match rule.strip_prefix(PATTERN_SENTINEL) {
            Some(source) => Self::Pattern {
                regex: Regex::new(source),
                source: source.to_string(),
            },
            None => Self::Literal(rule),
        }
    }

    /// Whether `token` satisfies this rule
    pub fn matches(&self, token: &str) -> Result<bool> {
        match self {
            Self::Literal(literal) => Ok(literal == token),
            Self::Pattern { source, regex } => match regex {
                Ok(re) => Ok(re.is_match(token)),
                Err(e) => Err(MenuError::InvalidPattern {
                    pattern: source.clone(),
                    source: e.clone(),
                }),
            },
        }
    }

    /// Whether this is the literal empty-string rule
    pub fn is_empty_literal(&self) -> bool {
        matches!(self, Self::Literal(literal) if literal.is_empty())
    }

    /// Rule text as declared
    pub fn as_declared(&self) -> String {
        match self {
            Self::Literal(literal) => literal.clone(),
            Self::Pattern { source, .. } => format!("{}{}", PATTERN_SENTINEL, source),
        }
    }
}

impl From<&str> for Rule {
    fn from(rule: &str) -> Self {
        Self::new(rule)
    }
}

impl From<String> for Rule {
    fn from(rule: String) -> Self {
        Self::new(rule)
    }
}

// Numeric literals compare equal to their decimal form
macro_rules! impl_rule_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Rule {
                fn from(rule: $t) -> Self {
                    Self::Literal(rule.to_string())
                }
            }
        )*
    };
}

impl_rule_from_int!(i32, i64, u8, u16, u32, u64, usize);
