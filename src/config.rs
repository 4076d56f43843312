//! Menu configuration

use crate::error::{MenuError, Result};
use crate::gateway::Provider;
use crate::sink::DEFAULT_ERROR_CAPACITY;
use serde::{Deserialize, Serialize};

/// Session key holding the accumulated route for fragment-style gateways
pub const DEFAULT_ROUTE_KEY: &str = "route";

/// Menu configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuConfig {
    /// Gateway provider (default: `africasTalking`)
    #[serde(default)]
    pub provider: Provider,

    /// Session key used to accumulate routes
    #[serde(default = "default_route_key")]
    pub route_key: String,

    /// Fail on unmatched input when a state declares no default
    ///
    /// When false, unmatched input keeps the walk on the current state.
    #[serde(default)]
    pub strict_links: bool,

    /// Errors buffered per error-channel subscriber
    #[serde(default = "default_error_capacity")]
    pub error_capacity: usize,
}

fn default_route_key() -> String {
    DEFAULT_ROUTE_KEY.to_string()
}

fn default_error_capacity() -> usize {
    DEFAULT_ERROR_CAPACITY
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            route_key: default_route_key(),
            strict_links: false,
            error_capacity: default_error_capacity(),
        }
    }
}

impl MenuConfig {
    /// Default configuration for a provider
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MenuError::Config(format!("Invalid menu config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check option values
    pub fn validate(&self) -> Result<()> {
        if self.route_key.is_empty() {
            return Err(MenuError::Config("routeKey must not be empty".to_string()));
        }
        if self.error_capacity == 0 {
            return Err(MenuError::Config(
                "errorCapacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MenuConfig::default();
        assert_eq!(config.provider, Provider::AfricasTalking);
        assert_eq!(config.route_key, "route");
        assert!(!config.strict_links);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config = MenuConfig::from_json(r#"{"provider": "hubtel", "strictLinks": true}"#).unwrap();
        assert_eq!(config.provider, Provider::Hubtel);
        assert!(config.strict_links);
        assert_eq!(config.route_key, "route");
        assert_eq!(config.error_capacity, DEFAULT_ERROR_CAPACITY);
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let err = MenuConfig::from_json(r#"{"provider": "otherTelco"}"#).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_invalid_values() {
        assert!(MenuConfig::from_json(r#"{"routeKey": ""}"#).is_err());
        assert!(MenuConfig::from_json(r#"{"errorCapacity": 0}"#).is_err());
    }
}
