//! Shared Error Types
//!
//! This module defines the error taxonomy surfaced by the panel's API client
//! and form flows.
//!
//! # Error Categories
//!
//! - `Credentials` - Bad identifier/password or expired recovery token
//! - `RateLimited` - Too many attempts; carries a cooldown in seconds
//! - `Duplicate` - Email/username already registered
//! - `Validation` - Client-side or server-side field validation
//! - `Unauthorized` - The session was rejected (401)
//! - `Api` - Any other non-success response
//! - `Network` - Transport failures
//! - `Serialization` - Malformed payloads
//!
//! "No session" is never an error: accessors return `None` instead.
//!
//! # Usage
//!
//! ```rust
//! use panel_session::shared::error::AuthError;
//!
//! let error = AuthError::validation("email", "Enter a valid email address.");
//! assert_eq!(error.user_message(), "Enter a valid email address.");
//! ```
use std::fmt;

use thiserror::Error;

/// Field a duplicate-resource error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Email,
    Username,
    AuthUser,
    Profile,
}

impl fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateField::Email => write!(f, "email"),
            DuplicateField::Username => write!(f, "username"),
            DuplicateField::AuthUser => write!(f, "auth_user"),
            DuplicateField::Profile => write!(f, "profile"),
        }
    }
}

/// Errors returned by the auth API client and the form flows.
#[derive(Debug, Error, Clone)]
pub enum AuthError {
    /// Rejected credentials or recovery token
    #[error("Credential error: {message}")]
    Credentials {
        /// Human-readable error message
        message: String,
    },

    /// Too many requests; the action is disabled for `retry_after_secs`
    #[error("Rate limited for {retry_after_secs}s: {message}")]
    RateLimited {
        /// Cooldown before the action may be retried
        retry_after_secs: u64,
        /// Human-readable error message
        message: String,
    },

    /// The resource already exists
    #[error("Duplicate {field}: {message}")]
    Duplicate {
        /// The conflicting field
        field: DuplicateField,
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// The server rejected the current session
    #[error("Session is no longer valid")]
    Unauthorized,

    /// Any other unsuccessful API response
    #[error("API error {status} ({code}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Application error code from the response envelope
        code: String,
        /// Human-readable error message
        message: String,
    },

    /// Transport-level failure
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },
}

impl AuthError {
    pub fn credentials(message: impl Into<String>) -> Self {
        Self::Credentials {
            message: message.into(),
        }
    }

    pub fn rate_limited(retry_after_secs: u64, message: impl Into<String>) -> Self {
        Self::RateLimited {
            retry_after_secs,
            message: message.into(),
        }
    }

    pub fn duplicate(field: DuplicateField, message: impl Into<String>) -> Self {
        Self::Duplicate {
            field,
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Message suitable for an inline form error.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Credentials { message }
            | AuthError::Duplicate { message, .. }
            | AuthError::Validation { message, .. }
            | AuthError::RateLimited { message, .. }
            | AuthError::Api { message, .. } => message.clone(),
            AuthError::Unauthorized => "Your session has expired. Please sign in again.".to_string(),
            AuthError::Network { .. } => "Could not reach the server. Try again later.".to_string(),
            AuthError::Serialization { .. } => "Unexpected response from the server.".to_string(),
        }
    }

    /// Cooldown carried by a rate-limit error.
    pub fn cooldown_secs(&self) -> Option<u64> {
        match self {
            AuthError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Field a validation or duplicate error is attached to, if any.
    pub fn field(&self) -> Option<String> {
        match self {
            AuthError::Validation { field, .. } => Some(field.clone()),
            AuthError::Duplicate { field, .. } => Some(field.to_string()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::Unauthorized)
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::serialization(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}
