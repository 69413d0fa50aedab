/**
 * Shared Types Module
 *
 * Defines the session record, request bodies and response payloads exchanged
 * with the panel API, and the in-memory user derived from the identity lookup.
 */

use serde::{Deserialize, Serialize};

pub const DEFAULT_TOKEN_TYPE: &str = "bearer";

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// Persisted session record.
///
/// `expires_in` is seconds-to-live when saving and seconds remaining when
/// read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usuario_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: None,
            usuario_id: None,
            email: None,
        }
    }

    pub fn with_expires_in(mut self, secs: i64) -> Self {
        self.expires_in = Some(secs);
        self
    }

    pub fn with_identity(mut self, usuario_id: Option<String>, email: Option<String>) -> Self {
        self.usuario_id = usuario_id;
        self.email = email;
        self
    }
}

/// Metadata blob stored next to the token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub usuario_id: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Authenticated user held in memory by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<Profile> for AuthUser {
    fn from(profile: Profile) -> Self {
        let name = profile.display_name();
        Self {
            id: profile.id,
            email: profile.email,
            name,
        }
    }
}

/// Identity lookup response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(alias = "usuarioId", alias = "usuario_id")]
    pub id: String,
    #[serde(default, alias = "correo")]
    pub email: Option<String>,
    #[serde(default)]
    pub nombres: Option<String>,
    #[serde(default)]
    pub apellidos: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Profile {
    /// Composed name, then a provided name or username, then the email
    /// local-part.
    pub fn display_name(&self) -> Option<String> {
        let composed = format!(
            "{} {}",
            self.nombres.as_deref().unwrap_or("").trim(),
            self.apellidos.as_deref().unwrap_or("").trim()
        );
        let composed = composed.trim();
        if !composed.is_empty() {
            return Some(composed.to_string());
        }
        non_blank(self.nombre.as_deref())
            .or_else(|| non_blank(self.username.as_deref()))
            .or_else(|| self.email.as_deref().and_then(email_local_part))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

pub(crate) fn email_local_part(email: &str) -> Option<String> {
    email
        .split('@')
        .next()
        .map(str::trim)
        .filter(|local| !local.is_empty())
        .map(str::to_string)
}

/// Session-shaped payload returned by login, register and rehydration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(default, alias = "access_token")]
    pub access_token: Option<String>,
    #[serde(default, alias = "token_type")]
    pub token_type: Option<String>,
    #[serde(default, alias = "expires_in")]
    pub expires_in: Option<i64>,
    #[serde(default, alias = "usuario_id", alias = "userId")]
    pub usuario_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl AuthPayload {
    /// The session carried by this payload, if it holds a usable token.
    pub fn session(&self) -> Option<Session> {
        let token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        Some(Session {
            access_token: token.to_string(),
            token_type: self
                .token_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(default_token_type),
            expires_in: self.expires_in,
            usuario_id: self.usuario_id.clone(),
            email: self.email.clone(),
        })
    }

    /// Name used in the welcome message after signing in.
    pub fn welcome_name(&self) -> String {
        non_blank(self.nombre.as_deref())
            .or_else(|| non_blank(self.username.as_deref()))
            .or_else(|| self.email.as_deref().and_then(email_local_part))
            .unwrap_or_else(|| "Usuario".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub identifier: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub nombres: Option<String>,
    pub apellidos: Option<String>,
}

/// Result of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The API issued a session right away
    SignedIn(AuthPayload),
    /// The account must be confirmed (e.g. by email) before signing in
    ConfirmationRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
    #[serde(rename = "redirectTo", skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub access_token: String,
    pub refresh_token: String,
    pub password: String,
}

/// Unlock pattern as sent to the API: cell indices joined with `-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRequest {
    pub pattern: String,
}

/// Reset-password confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetConfirmation {
    #[serde(default, alias = "usuario_id", alias = "userId")]
    pub usuario_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
