/**
 * Auth API Client
 *
 * HTTP client for the panel's authentication endpoints. Every request carries
 * the configured preview-bypass header; authenticated requests carry the
 * bearer token. A 401 on an authenticated request clears the stored session
 * if it still holds the rejected token and notifies the registered listener.
 * The error is still returned to the caller.
 */

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::config::Config;
use crate::client::cooldown::{parse_cooldown_secs, DEFAULT_COOLDOWN_SECS};
use crate::client::session_store::SessionStore;
use crate::client::types::{
    AuthPayload, ForgotPasswordRequest, LoginRequest, PatternRequest, Profile, RegisterOutcome,
    RegisterRequest, ResetConfirmation, ResetPasswordRequest,
};
use crate::shared::error::{AuthError, DuplicateField};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const FORGOT_PASSWORD_PATH: &str = "/api/auth/forgot-password";
pub const RESET_PASSWORD_PATH: &str = "/api/auth/reset-password";
pub const ME_PATH: &str = "/api/auth/me";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const PATTERN_PATH: &str = "/api/auth/pattern";

pub const BYPASS_HEADER: &str = "x-vercel-protection-bypass";

/// Call contract of the remote auth API.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, AuthError>;

    async fn register(&self, request: &RegisterRequest) -> Result<RegisterOutcome, AuthError>;

    async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<(), AuthError>;

    async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<ResetConfirmation, AuthError>;

    /// Identity lookup for `token`.
    async fn me(&self, token: &str) -> Result<Profile, AuthError>;

    async fn logout(&self, token: &str) -> Result<(), AuthError>;

    /// Save the account's unlock pattern.
    async fn set_pattern(&self, token: &str, request: &PatternRequest) -> Result<(), AuthError>;

    /// Recover a session from the server-held persistent credential.
    /// `Ok(None)` means there was nothing to recover.
    async fn rehydrate(&self) -> Result<Option<AuthPayload>, AuthError>;
}

/// Notified whenever the server rejects a bearer token with a 401.
pub trait UnauthorizedListener: Send + Sync {
    /// `token` is the bearer token the rejected request carried.
    fn session_rejected(&self, token: &str);
}

impl<F> UnauthorizedListener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn session_rejected(&self, token: &str) {
        self(token)
    }
}

/// Which endpoint produced an error, for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Login,
    Register,
    ResetPassword,
    Other,
}

/// reqwest-backed [`AuthApi`].
pub struct HttpAuthApi {
    client: Client,
    config: Config,
    store: SessionStore,
    listener: RwLock<Option<Arc<dyn UnauthorizedListener>>>,
}

impl HttpAuthApi {
    pub fn new(config: Config, store: SessionStore) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            config,
            store,
            listener: RwLock::new(None),
        })
    }

    pub fn set_unauthorized_listener(&self, listener: Arc<dyn UnauthorizedListener>) {
        *self.listener.write() = Some(listener);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// GET a panel endpoint with the stored bearer token.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        let token = self.store.get_token();
        let response = self
            .request(Method::GET, path, token.as_deref())
            .send()
            .await?;
        self.decode(response, Call::Other, token.as_deref()).await
    }

    /// POST a JSON body to a panel endpoint with the stored bearer token.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, AuthError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let token = self.store.get_token();
        let response = self
            .request(Method::POST, path, token.as_deref())
            .json(body)
            .send()
            .await?;
        self.decode(response, Call::Other, token.as_deref()).await
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let mut builder = self.client.request(method, self.config.api_url(path));
        if let Some(bypass) = self.config.bypass_token() {
            builder = builder.header(BYPASS_HEADER, bypass);
        }
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: Response,
        call: Call,
        bearer: Option<&str>,
    ) -> Result<T, AuthError> {
        let value = self.read_body(response, call, bearer).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Read a response, unwrap a success envelope, and classify failures.
    /// `bearer` is the token the request carried, if any.
    async fn read_body(
        &self,
        response: Response,
        call: Call,
        bearer: Option<&str>,
    ) -> Result<Value, AuthError> {
        let status = response.status();
        let retry_after = retry_after_secs(response.headers());
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if status == StatusCode::UNAUTHORIZED {
            if let Some(token) = bearer {
                self.reject_session(token);
            }
        }

        if !status.is_success() {
            return Err(classify_error(status, retry_after, &body, call));
        }

        match unwrap_envelope(body) {
            Ok(value) => Ok(value),
            Err(body) => Err(classify_error(status, retry_after, &body, call)),
        }
    }

    async fn expect_success(
        &self,
        response: Response,
        call: Call,
        bearer: Option<&str>,
    ) -> Result<(), AuthError> {
        self.read_body(response, call, bearer).await.map(|_| ())
    }

    /// Clear the stored session if it still holds `token`, then notify the
    /// listener, which applies the same check to the in-memory state.
    fn reject_session(&self, token: &str) {
        if self.store.get_token().as_deref() == Some(token) {
            debug!("Server rejected the session, clearing local state");
            self.store.clear();
        } else {
            debug!("Server rejected a superseded token, keeping the stored session");
        }
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.session_rejected(token);
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, AuthError> {
        let response = self
            .request(Method::POST, LOGIN_PATH, None)
            .json(request)
            .send()
            .await?;
        self.decode(response, Call::Login, None).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<RegisterOutcome, AuthError> {
        let response = self
            .request(Method::POST, REGISTER_PATH, None)
            .json(request)
            .send()
            .await?;
        let value = self.read_body(response, Call::Register, None).await?;
        let payload: AuthPayload = if value.is_object() {
            serde_json::from_value(value)?
        } else {
            AuthPayload::default()
        };
        Ok(match payload.session() {
            Some(_) => RegisterOutcome::SignedIn(payload),
            None => RegisterOutcome::ConfirmationRequired,
        })
    }

    async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<(), AuthError> {
        let response = self
            .request(Method::POST, FORGOT_PASSWORD_PATH, None)
            .json(request)
            .send()
            .await?;
        self.expect_success(response, Call::Other, None).await
    }

    async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<ResetConfirmation, AuthError> {
        let response = self
            .request(Method::POST, RESET_PASSWORD_PATH, None)
            .json(request)
            .send()
            .await?;
        let value = self.read_body(response, Call::ResetPassword, None).await?;
        if value.is_null() {
            return Ok(ResetConfirmation::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn me(&self, token: &str) -> Result<Profile, AuthError> {
        let response = self.request(Method::GET, ME_PATH, Some(token)).send().await?;
        self.decode(response, Call::Other, Some(token)).await
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let response = self
            .request(Method::POST, LOGOUT_PATH, Some(token))
            .send()
            .await?;
        self.expect_success(response, Call::Other, Some(token)).await
    }

    async fn set_pattern(&self, token: &str, request: &PatternRequest) -> Result<(), AuthError> {
        let response = self
            .request(Method::POST, PATTERN_PATH, Some(token))
            .json(request)
            .send()
            .await?;
        self.expect_success(response, Call::Other, Some(token)).await
    }

    async fn rehydrate(&self) -> Result<Option<AuthPayload>, AuthError> {
        let response = self.request(Method::POST, REFRESH_PATH, None).send().await?;
        let value = self.read_body(response, Call::Other, None).await?;
        if !value.is_object() {
            return Ok(None);
        }
        let payload: AuthPayload = serde_json::from_value(value)?;
        Ok(payload.session().is_some().then_some(payload))
    }
}

/// `{status, code, message, data}` envelopes: success yields `data[0]`
/// (or `data` itself when it is not an array); anything else is returned as
/// the error body. Non-envelope bodies pass through unchanged.
fn unwrap_envelope(body: Value) -> Result<Value, Value> {
    let is_envelope = body
        .as_object()
        .map(|obj| obj.get("status").is_some_and(Value::is_string) && obj.contains_key("data"))
        .unwrap_or(false);
    if !is_envelope {
        return Ok(body);
    }
    if body.get("status").and_then(Value::as_str) != Some("success") {
        return Err(body);
    }
    match body.get("data") {
        Some(Value::Array(items)) => Ok(items.first().cloned().unwrap_or(Value::Null)),
        Some(other) => Ok(other.clone()),
        None => Ok(Value::Null),
    }
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.max(1))
}

fn body_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Text to search for a cooldown: the envelope data plus the message.
fn cooldown_text(body: &Value) -> String {
    let mut parts: Vec<String> = Vec::new();
    match body.get("data") {
        Some(Value::Array(items)) => parts.extend(items.iter().map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        Some(Value::String(s)) => parts.push(s.clone()),
        _ => {}
    }
    if let Some(message) = body_str(body, "message").or_else(|| body_str(body, "error")) {
        parts.push(message.to_string());
    }
    if let Value::String(s) = body {
        parts.push(s.clone());
    }
    parts.join(" ")
}

fn classify_error(
    status: StatusCode,
    retry_after: Option<u64>,
    body: &Value,
    call: Call,
) -> AuthError {
    let code = body_str(body, "code").unwrap_or("");
    let message = body_str(body, "error")
        .or_else(|| body_str(body, "message"))
        .or_else(|| body.as_str().filter(|s| !s.trim().is_empty()))
        .map(str::to_string);

    if let Some(field) = duplicate_field(code) {
        return AuthError::duplicate(field, duplicate_message(field));
    }

    if code == "AUTH.RATE_LIMITED" || status == StatusCode::TOO_MANY_REQUESTS {
        let secs = retry_after
            .unwrap_or_else(|| parse_cooldown_secs(&cooldown_text(body), DEFAULT_COOLDOWN_SECS));
        return AuthError::rate_limited(
            secs,
            "Too many requests. Try again later.",
        );
    }

    if code == "VALIDATION.BAD_REQUEST" {
        let field = body_str(body, "field").unwrap_or("form");
        return AuthError::validation(
            field,
            message.unwrap_or_else(|| "The request is invalid.".to_string()),
        );
    }

    match (call, status) {
        (Call::Login, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
            AuthError::credentials(message.unwrap_or_else(|| "Invalid credentials".to_string()))
        }
        (Call::ResetPassword, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
            AuthError::credentials(
                message.unwrap_or_else(|| "The recovery link is invalid or has expired.".to_string()),
            )
        }
        (_, StatusCode::UNAUTHORIZED) => AuthError::Unauthorized,
        _ => {
            if call == Call::Register {
                warn!(status = status.as_u16(), code, "Registration failed");
            }
            AuthError::Api {
                status: status.as_u16(),
                code: if code.is_empty() { "UNKNOWN".to_string() } else { code.to_string() },
                message: message.unwrap_or_else(|| default_message(call).to_string()),
            }
        }
    }
}

fn duplicate_field(code: &str) -> Option<DuplicateField> {
    match code {
        "DB.DUPLICATE.EMAIL" => Some(DuplicateField::Email),
        "DB.DUPLICATE.USERNAME" => Some(DuplicateField::Username),
        "DB.DUPLICATE.AUTH_USER" => Some(DuplicateField::AuthUser),
        "DB.DUPLICATE" => Some(DuplicateField::Profile),
        _ => None,
    }
}

fn duplicate_message(field: DuplicateField) -> &'static str {
    match field {
        DuplicateField::Email => "This email is already registered.",
        DuplicateField::Username => "This username is already taken.",
        DuplicateField::AuthUser => "This account already has a profile.",
        DuplicateField::Profile => "Duplicate profile.",
    }
}

fn default_message(call: Call) -> &'static str {
    match call {
        Call::Login => "Could not sign in.",
        Call::Register => "Could not register.",
        Call::ResetPassword => "Could not update the password.",
        Call::Other => "Unknown error",
    }
}
