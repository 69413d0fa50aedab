//! Form Flows
//!
//! Login, registration, password recovery and unlock-pattern setup as plain
//! state holders. A failed submission keeps every input and records an inline
//! message; a rate-limited one also starts a local cooldown that blocks
//! resubmission.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, info};

use crate::client::api::AuthApi;
use crate::client::clock::{Clock, SystemClock};
use crate::client::controller::AuthController;
use crate::client::cooldown::Cooldown;
use crate::client::guard::{post_login_target, Location};
use crate::client::types::{
    ForgotPasswordRequest, LoginRequest, PatternRequest, RegisterOutcome, RegisterRequest,
    ResetConfirmation, ResetPasswordRequest,
};
use crate::shared::error::AuthError;

const MIN_PASSWORD_LEN: usize = 6;
const MIN_IDENTIFIER_LEN: usize = 3;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"))
}

fn username_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[a-z0-9._-]+$").expect("valid regex"))
}

/// Inline message shown next to a field or the whole form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMessage {
    pub field: Option<String>,
    pub message: String,
}

impl From<&AuthError> for FormMessage {
    fn from(error: &AuthError) -> Self {
        Self {
            field: error.field(),
            message: error.user_message(),
        }
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::validation("email", "Email is required."));
    }
    if !email_pattern().is_match(email) {
        return Err(AuthError::validation("email", "Enter a valid email address."));
    }
    Ok(())
}

fn validate_password(field: &str, password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(
            field,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    Ok(())
}

fn cooldown_error(cooldown: &Cooldown) -> Option<AuthError> {
    cooldown.is_active().then(|| {
        let secs = cooldown.remaining_secs();
        AuthError::rate_limited(secs, format!("Try again in {secs}s."))
    })
}

/// Split a full name into `(nombres, apellidos)`: the last two words are the
/// family names when there are three or more.
pub fn split_full_name(full: &str) -> (String, String) {
    let words: Vec<&str> = full.split_whitespace().collect();
    match words.len() {
        0 => (String::new(), String::new()),
        1 => (words[0].to_string(), String::new()),
        2 => (words[0].to_string(), words[1].to_string()),
        n => (words[..n - 2].join(" "), words[n - 2..].join(" ")),
    }
}

/// Successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    /// Post-login navigation target
    pub redirect_to: String,
    /// Name for the welcome message
    pub welcome: String,
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    /// Username or email
    pub identifier: String,
    pub password: String,
    pub remember: bool,
    pub error: Option<FormMessage>,
    cooldown: Cooldown,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl LoginForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            identifier: String::new(),
            password: String::new(),
            remember: false,
            error: None,
            cooldown: Cooldown::new(clock),
        }
    }

    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    pub fn can_submit(&self) -> bool {
        !self.cooldown.is_active()
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.identifier.trim().chars().count() < MIN_IDENTIFIER_LEN {
            return Err(AuthError::validation(
                "identifier",
                "Enter your username or email.",
            ));
        }
        validate_password("password", &self.password)
    }

    /// Sign in, persist the session with the chosen remember flag, and hand
    /// the token to the controller. `login_location` is the login page URL,
    /// whose `redirect` parameter selects the post-login target.
    pub async fn submit(
        &mut self,
        controller: &AuthController,
        login_location: &str,
    ) -> Result<LoginSuccess, AuthError> {
        self.error = None;
        let result = self.try_submit(controller, login_location).await;
        if let Err(e) = &result {
            if let Some(secs) = e.cooldown_secs() {
                self.cooldown.start(secs);
            }
            self.error = Some(FormMessage::from(e));
        }
        result
    }

    async fn try_submit(
        &mut self,
        controller: &AuthController,
        login_location: &str,
    ) -> Result<LoginSuccess, AuthError> {
        if let Some(e) = cooldown_error(&self.cooldown) {
            return Err(e);
        }
        self.validate()?;

        let request = LoginRequest {
            identifier: self.identifier.trim().to_string(),
            password: self.password.clone(),
            remember: self.remember,
        };
        let payload = controller.api().login(&request).await?;
        let session = payload
            .session()
            .ok_or_else(|| AuthError::credentials("Could not sign in."))?;

        let store = controller.store();
        store.save(&session, self.remember);
        store.set_remember(self.remember);
        controller.set_token(Some(&session.access_token));

        self.password.clear();
        info!(remember = self.remember, "Signed in");
        Ok(LoginSuccess {
            redirect_to: post_login_target(login_location),
            welcome: payload.welcome_name(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RegisterForm {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub error: Option<FormMessage>,
    cooldown: Cooldown,
}

impl RegisterForm {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            full_name: String::new(),
            email: String::new(),
            username: String::new(),
            password: String::new(),
            error: None,
            cooldown: Cooldown::new(clock),
        }
    }

    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    /// Submit is disabled while a rate-limit cooldown runs.
    pub fn can_submit(&self) -> bool {
        !self.cooldown.is_active()
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        let name = self.full_name.trim();
        if name.is_empty() {
            return Err(AuthError::validation("full_name", "Enter your full name."));
        }
        if name.split_whitespace().count() < 2 {
            return Err(AuthError::validation("full_name", "Enter your last names."));
        }

        validate_email(&self.email)?;

        let username = self.username.trim();
        if !USERNAME_LEN.contains(&username.chars().count()) {
            return Err(AuthError::validation(
                "username",
                "Username must be 3 to 32 characters.",
            ));
        }
        if !username_pattern().is_match(username) {
            return Err(AuthError::validation(
                "username",
                "Only letters, numbers and . _ - are allowed.",
            ));
        }

        validate_password("password", &self.password)
    }

    pub async fn submit(&mut self, api: &dyn AuthApi) -> Result<RegisterOutcome, AuthError> {
        self.error = None;
        let result = self.try_submit(api).await;
        match &result {
            Ok(_) => self.reset(),
            Err(e) => {
                if let Some(secs) = e.cooldown_secs() {
                    self.cooldown.start(secs);
                }
                self.error = Some(FormMessage::from(e));
            }
        }
        result
    }

    async fn try_submit(&self, api: &dyn AuthApi) -> Result<RegisterOutcome, AuthError> {
        if let Some(e) = cooldown_error(&self.cooldown) {
            return Err(e);
        }
        self.validate()?;

        let (nombres, apellidos) = split_full_name(&self.full_name);
        let request = RegisterRequest {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            nombres: Some(nombres),
            apellidos: Some(apellidos),
        };
        let outcome = api.register(&request).await?;
        debug!(?outcome, "Registration accepted");
        Ok(outcome)
    }

    fn reset(&mut self) {
        self.full_name.clear();
        self.email.clear();
        self.username.clear();
        self.password.clear();
    }
}

#[derive(Debug, Clone)]
pub struct ForgotPasswordForm {
    pub email: String,
    pub error: Option<FormMessage>,
    cooldown: Cooldown,
}

impl ForgotPasswordForm {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            email: String::new(),
            error: None,
            cooldown: Cooldown::new(clock),
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.cooldown.is_active()
    }

    /// Request a recovery email that links back to `redirect_to`.
    pub async fn submit(
        &mut self,
        api: &dyn AuthApi,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        self.error = None;
        let result = match cooldown_error(&self.cooldown) {
            Some(e) => Err(e),
            None => match validate_email(&self.email) {
                Ok(()) => {
                    let request = ForgotPasswordRequest {
                        email: self.email.trim().to_string(),
                        redirect_to: redirect_to.map(str::to_string),
                    };
                    api.forgot_password(&request).await
                }
                Err(e) => Err(e),
            },
        };
        match &result {
            Ok(()) => self.email.clear(),
            Err(e) => {
                if let Some(secs) = e.cooldown_secs() {
                    self.cooldown.start(secs);
                }
                self.error = Some(FormMessage::from(e));
            }
        }
        result
    }
}

/// Recovery credentials carried by a password-reset link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl RecoveryTokens {
    /// Read `access_token` and `refresh_token` from the query string, falling
    /// back to the fragment. Both must be present.
    pub fn from_url(url: &str) -> Option<Self> {
        let location = Location::parse(url);
        let read = |name: &str| {
            location
                .query_param(name)
                .or_else(|| location.fragment_param(name))
        };
        Some(Self {
            access_token: read("access_token")?,
            refresh_token: read("refresh_token")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResetPasswordForm {
    pub password: String,
    pub confirm: String,
    pub tokens: Option<RecoveryTokens>,
    pub error: Option<FormMessage>,
}

impl ResetPasswordForm {
    pub fn from_url(url: &str) -> Self {
        Self {
            tokens: RecoveryTokens::from_url(url),
            ..Self::default()
        }
    }

    pub fn tokens_missing(&self) -> bool {
        self.tokens.is_none()
    }

    pub fn validate(&self) -> Result<&RecoveryTokens, AuthError> {
        let tokens = self.tokens.as_ref().ok_or_else(|| {
            AuthError::validation("tokens", "Recovery tokens are missing from the link.")
        })?;
        validate_password("password", &self.password)?;
        if self.confirm != self.password {
            return Err(AuthError::validation("confirm", "Passwords do not match."));
        }
        Ok(tokens)
    }

    pub async fn submit(&mut self, api: &dyn AuthApi) -> Result<ResetConfirmation, AuthError> {
        self.error = None;
        let result = match self.validate() {
            Ok(tokens) => {
                let request = ResetPasswordRequest {
                    access_token: tokens.access_token.clone(),
                    refresh_token: tokens.refresh_token.clone(),
                    password: self.password.clone(),
                };
                api.reset_password(&request).await
            }
            Err(e) => Err(e),
        };
        match &result {
            Ok(_) => {
                self.password.clear();
                self.confirm.clear();
            }
            Err(e) => self.error = Some(FormMessage::from(e)),
        }
        result
    }
}

/// Cells on the 3x3 unlock grid, numbered row by row.
pub const PATTERN_CELLS: u8 = 9;
const MIN_PATTERN_POINTS: usize = 3;

/// Unlock pattern capture for a signed-in user.
#[derive(Debug, Clone, Default)]
pub struct PatternForm {
    points: Vec<u8>,
    pub error: Option<FormMessage>,
}

impl PatternForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `cell` to the pattern. Cells off the grid or already visited
    /// are ignored and return `false`.
    pub fn push(&mut self, cell: u8) -> bool {
        if cell >= PATTERN_CELLS || self.points.contains(&cell) {
            return false;
        }
        self.points.push(cell);
        true
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.error = None;
    }

    pub fn points(&self) -> &[u8] {
        &self.points
    }

    /// Wire form of the pattern, e.g. `0-4-8`.
    pub fn serialize(&self) -> String {
        self.points
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join("-")
    }

    pub fn can_submit(&self) -> bool {
        self.points.len() >= MIN_PATTERN_POINTS
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if !self.can_submit() {
            return Err(AuthError::validation(
                "pattern",
                format!("Connect at least {MIN_PATTERN_POINTS} points."),
            ));
        }
        Ok(())
    }

    /// Save the pattern for the signed-in user. The points are cleared once
    /// the API accepts it.
    pub async fn submit(&mut self, controller: &AuthController) -> Result<(), AuthError> {
        self.error = None;
        let result = self.try_submit(controller).await;
        match &result {
            Ok(()) => self.points.clear(),
            Err(e) => self.error = Some(FormMessage::from(e)),
        }
        result
    }

    async fn try_submit(&self, controller: &AuthController) -> Result<(), AuthError> {
        self.validate()?;
        let token = controller.token().ok_or(AuthError::Unauthorized)?;
        let request = PatternRequest {
            pattern: self.serialize(),
        };
        controller.api().set_pattern(&token, &request).await?;
        info!(points = self.points.len(), "Unlock pattern saved");
        Ok(())
    }
}
