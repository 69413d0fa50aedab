//! Shared Module
//!
//! Types that are independent of the client runtime: the error taxonomy
//! returned by API calls and form flows, and the application configuration.

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use error::{AuthError, DuplicateField};
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
