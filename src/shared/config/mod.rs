//! Application configuration module
//!
//! Provides configuration types for the panel client. Values come from a
//! builder, an optional TOML file, or both.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the panel API
    pub api_base_url: Option<String>,
    /// Preview deployment bypass secret, sent on every request
    pub bypass_token: Option<String>,
    /// Where the password-reset email should send the user
    pub password_reset_redirect: Option<String>,
    /// Directory holding the durable session file
    pub data_dir: Option<PathBuf>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.api_base_url {
            validate_base_url(url)?;
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue("timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Overlay every value set in `other` on top of `self`.
    pub fn merge(mut self, other: AppConfig) -> Self {
        if other.api_base_url.is_some() {
            self.api_base_url = other.api_base_url;
        }
        if other.bypass_token.is_some() {
            self.bypass_token = other.bypass_token;
        }
        if other.password_reset_redirect.is_some() {
            self.password_reset_redirect = other.password_reset_redirect;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        self
    }
}

fn validate_base_url(url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::InvalidUrl(url.to_string())),
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the API base URL
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = Some(url.into());
        self
    }

    pub fn bypass_token(mut self, token: impl Into<String>) -> Self {
        self.config.bypass_token = Some(token.into());
        self
    }

    pub fn password_reset_redirect(mut self, url: impl Into<String>) -> Self {
        self.config.password_reset_redirect = Some(url.into());
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(dir.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = Some(secs);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accepts_http_urls() {
        let config = AppConfig::builder()
            .api_base_url("https://api.example.com")
            .timeout_secs(5)
            .build()
            .unwrap();
        assert_eq!(config.api_base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_builder_rejects_non_http_scheme() {
        let result = AppConfig::builder().api_base_url("ftp://example.com").build();
        assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let result = AppConfig::builder().timeout_secs(0).build();
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            api_base_url = "http://localhost:4000"
            password_reset_redirect = "http://localhost:5173/auth/reset"
            "#,
        )
        .unwrap();
        assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:4000"));
        assert!(config.bypass_token.is_none());
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_merge_prefers_set_values() {
        let base = AppConfig::builder()
            .api_base_url("http://a.example")
            .bypass_token("secret")
            .build()
            .unwrap();
        let overlay = AppConfig::builder().api_base_url("http://b.example").build().unwrap();
        let merged = base.merge(overlay);
        assert_eq!(merged.api_base_url.as_deref(), Some("http://b.example"));
        assert_eq!(merged.bypass_token.as_deref(), Some("secret"));
    }
}
