//! Scriptable auth API
//!
//! Records calls and returns canned results. Identity lookups and logouts
//! can be held open with [`MockApi::hold_identity`] and
//! [`MockApi::hold_logout`] to test responses that arrive late.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use panel_session::client::types::{
    AuthPayload, ForgotPasswordRequest, LoginRequest, PatternRequest, Profile, RegisterOutcome,
    RegisterRequest, ResetConfirmation, ResetPasswordRequest,
};
use panel_session::client::AuthApi;
use panel_session::shared::AuthError;

use super::fixtures::ana_profile;

#[derive(Default)]
pub struct MockApi {
    pub login_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub forgot_calls: AtomicUsize,
    pub reset_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub rehydrate_calls: AtomicUsize,
    pub pattern_calls: AtomicUsize,
    login: Mutex<Option<Result<AuthPayload, AuthError>>>,
    register: Mutex<Option<Result<RegisterOutcome, AuthError>>>,
    forgot: Mutex<Option<AuthError>>,
    profile: Mutex<Option<Result<Profile, AuthError>>>,
    rehydrate: Mutex<Option<AuthPayload>>,
    last_login: Mutex<Option<LoginRequest>>,
    last_register: Mutex<Option<RegisterRequest>>,
    last_forgot: Mutex<Option<ForgotPasswordRequest>>,
    last_reset: Mutex<Option<ResetPasswordRequest>>,
    last_pattern: Mutex<Option<(String, PatternRequest)>>,
    identity_gate: Mutex<Option<Arc<Notify>>>,
    identity_started: Notify,
    logout_gate: Mutex<Option<Arc<Notify>>>,
    logout_started: Notify,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_login(self, result: Result<AuthPayload, AuthError>) -> Self {
        *self.login.lock() = Some(result);
        self
    }

    pub fn with_register(self, result: Result<RegisterOutcome, AuthError>) -> Self {
        *self.register.lock() = Some(result);
        self
    }

    pub fn with_forgot_error(self, error: AuthError) -> Self {
        *self.forgot.lock() = Some(error);
        self
    }

    pub fn with_profile(self, result: Result<Profile, AuthError>) -> Self {
        *self.profile.lock() = Some(result);
        self
    }

    pub fn with_rehydrate(self, payload: AuthPayload) -> Self {
        *self.rehydrate.lock() = Some(payload);
        self
    }

    /// Make identity lookups wait until the returned handle is notified.
    pub fn hold_identity(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.identity_gate.lock() = Some(gate.clone());
        gate
    }

    /// Resolves once an identity lookup has started.
    pub async fn identity_started(&self) {
        self.identity_started.notified().await;
    }

    /// Make logouts wait until the returned handle is notified.
    pub fn hold_logout(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.logout_gate.lock() = Some(gate.clone());
        gate
    }

    pub async fn logout_started(&self) {
        self.logout_started.notified().await;
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn last_login(&self) -> Option<LoginRequest> {
        self.last_login.lock().clone()
    }

    pub fn last_register(&self) -> Option<RegisterRequest> {
        self.last_register.lock().clone()
    }

    pub fn last_forgot(&self) -> Option<ForgotPasswordRequest> {
        self.last_forgot.lock().clone()
    }

    pub fn last_reset(&self) -> Option<ResetPasswordRequest> {
        self.last_reset.lock().clone()
    }

    /// Token and body of the last pattern update.
    pub fn last_pattern(&self) -> Option<(String, PatternRequest)> {
        self.last_pattern.lock().clone()
    }
}

#[async_trait]
impl AuthApi for MockApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_login.lock() = Some(request.clone());
        self.login
            .lock()
            .clone()
            .unwrap_or_else(|| Err(AuthError::credentials("Invalid credentials")))
    }

    async fn register(&self, request: &RegisterRequest) -> Result<RegisterOutcome, AuthError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_register.lock() = Some(request.clone());
        self.register
            .lock()
            .clone()
            .unwrap_or(Ok(RegisterOutcome::ConfirmationRequired))
    }

    async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<(), AuthError> {
        self.forgot_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_forgot.lock() = Some(request.clone());
        match self.forgot.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<ResetConfirmation, AuthError> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_reset.lock() = Some(request.clone());
        Ok(ResetConfirmation {
            usuario_id: Some("u-1".to_string()),
            message: Some("Password updated".to_string()),
        })
    }

    async fn me(&self, _token: &str) -> Result<Profile, AuthError> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        self.identity_started.notify_one();
        let gate = self.identity_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.profile.lock().clone().unwrap_or_else(|| Ok(ana_profile()))
    }

    async fn logout(&self, _token: &str) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_started.notify_one();
        let gate = self.logout_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(())
    }

    async fn set_pattern(&self, token: &str, request: &PatternRequest) -> Result<(), AuthError> {
        self.pattern_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_pattern.lock() = Some((token.to_string(), request.clone()));
        Ok(())
    }

    async fn rehydrate(&self) -> Result<Option<AuthPayload>, AuthError> {
        self.rehydrate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rehydrate.lock().clone())
    }
}
