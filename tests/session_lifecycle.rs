//! Session lifecycle tests
//!
//! Controller, store and guard working together against a scripted API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use common::{login_payload, test_store, MockApi};
use panel_session::client::types::Session;
use panel_session::client::{
    AuthController, AuthPhase, BackendKind, GuardDecision, LoginForm, PatternForm, RouteGuard,
    UnauthorizedListener,
};
use panel_session::shared::AuthError;

#[tokio::test]
async fn test_no_rehydration_without_remember() {
    let ts = test_store();
    let api = Arc::new(MockApi::new().with_rehydrate(login_payload("tok-r", 600)));

    let controller = AuthController::start(ts.store.clone(), api.clone(), "/dashboard").await;

    assert_eq!(MockApi::count(&api.rehydrate_calls), 0);
    assert_eq!(controller.phase(), AuthPhase::Unauthenticated);
    assert_eq!(ts.store.get_token(), None);
}

#[tokio::test]
async fn test_no_rehydration_on_auth_route() {
    let ts = test_store();
    ts.store.set_remember(true);
    let api = Arc::new(MockApi::new().with_rehydrate(login_payload("tok-r", 600)));

    AuthController::start(ts.store.clone(), api.clone(), "/auth/reset#access_token=x").await;

    assert_eq!(MockApi::count(&api.rehydrate_calls), 0);
}

#[tokio::test]
async fn test_rehydration_with_remember() {
    let ts = test_store();
    ts.store.set_remember(true);
    let api = Arc::new(MockApi::new().with_rehydrate(login_payload("tok-r", 600)));

    let controller = AuthController::start(ts.store.clone(), api.clone(), "/inventario").await;
    let snapshot = controller.settled().await;

    assert_eq!(MockApi::count(&api.rehydrate_calls), 1);
    assert_eq!(snapshot.phase, AuthPhase::Authenticated);
    assert_eq!(snapshot.token.as_deref(), Some("tok-r"));
    assert_eq!(ts.store.token_in(BackendKind::Durable).as_deref(), Some("tok-r"));
}

#[tokio::test]
async fn test_stored_token_adopted_before_any_network_call() {
    let ts = test_store();
    ts.store
        .save(&Session::new("tok-1").with_expires_in(3600), true);
    let api = Arc::new(MockApi::new());

    let controller = AuthController::new(ts.store.clone(), api.clone());

    assert_eq!(controller.token().as_deref(), Some("tok-1"));
    assert_eq!(controller.phase(), AuthPhase::TokenPresentNoIdentity);
    assert_eq!(MockApi::count(&api.me_calls), 0);

    controller.bootstrap("/dashboard").await;
    let snapshot = controller.settled().await;
    assert_eq!(snapshot.phase, AuthPhase::Authenticated);
    assert_eq!(MockApi::count(&api.rehydrate_calls), 0);
}

#[tokio::test]
async fn test_expired_stored_token_is_discarded() {
    let ts = test_store();
    ts.store.save(&Session::new("old").with_expires_in(10), true);
    ts.clock.advance_secs(11);

    let controller = AuthController::new(ts.store.clone(), Arc::new(MockApi::new()));

    assert_eq!(controller.phase(), AuthPhase::Unauthenticated);
    assert_eq!(ts.store.get_token(), None);
}

#[tokio::test]
async fn test_failed_identity_lookup_clears_store_and_state() {
    let ts = test_store();
    ts.store.save(&Session::new("tok-bad"), false);
    let api = Arc::new(MockApi::new().with_profile(Err(AuthError::Unauthorized)));

    let controller = AuthController::start(ts.store.clone(), api.clone(), "/dashboard").await;
    let snapshot = controller.settled().await;

    assert_eq!(snapshot.phase, AuthPhase::Unauthenticated);
    assert_eq!(snapshot.token, None);
    assert_eq!(snapshot.user, None);
    assert_eq!(ts.store.get_token(), None);
    assert_eq!(ts.store.token_in(BackendKind::Transient), None);
}

#[tokio::test]
async fn test_identity_requested_once_per_token() {
    let ts = test_store();
    let api = Arc::new(MockApi::new());
    let controller = AuthController::new(ts.store.clone(), api.clone());

    ts.store.save(&Session::new("tok-1"), false);
    controller.set_token(Some("tok-1"));
    controller.set_token(Some("tok-1"));
    controller.settled().await;
    controller.set_token(Some("tok-1"));
    controller.settled().await;

    assert_eq!(MockApi::count(&api.me_calls), 1);
}

#[tokio::test]
async fn test_switching_back_reuses_pending_lookup() {
    let ts = test_store();
    let api = Arc::new(MockApi::new());
    let gate = api.hold_identity();
    let controller = AuthController::new(ts.store.clone(), api.clone());

    ts.store.save(&Session::new("tok-A"), false);
    controller.set_token(Some("tok-A"));
    api.identity_started().await;
    ts.store.save(&Session::new("tok-B"), false);
    controller.set_token(Some("tok-B"));
    api.identity_started().await;
    ts.store.save(&Session::new("tok-A"), false);
    controller.set_token(Some("tok-A"));

    assert_eq!(MockApi::count(&api.me_calls), 2);

    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.notify_waiters();
    let snapshot = controller.settled().await;

    assert_eq!(snapshot.phase, AuthPhase::Authenticated);
    assert_eq!(snapshot.token.as_deref(), Some("tok-A"));
    assert!(snapshot.user.is_some());
    assert_eq!(MockApi::count(&api.me_calls), 2);
}

#[tokio::test]
async fn test_login_end_to_end() {
    let ts = test_store();
    let api = Arc::new(MockApi::new().with_login(Ok(login_payload("tok-123", 3600))));
    let login_location = "/auth/login?redirect=%2Finventario%3Fpage%3D2";
    let controller = AuthController::start(ts.store.clone(), api.clone(), login_location).await;
    assert_eq!(MockApi::count(&api.rehydrate_calls), 0);

    let mut form = LoginForm::new();
    form.identifier = "  ana@example.com ".to_string();
    form.password = "secret1".to_string();
    form.remember = true;
    let success = form.submit(&controller, login_location).await.unwrap();

    assert_eq!(success.redirect_to, "/inventario?page=2");
    assert_eq!(success.welcome, "Ana");
    assert_eq!(api.last_login().unwrap().identifier, "ana@example.com");
    assert!(form.password.is_empty());

    assert_eq!(ts.store.token_in(BackendKind::Durable).as_deref(), Some("tok-123"));
    assert_eq!(ts.store.token_in(BackendKind::Transient), None);
    assert_eq!(ts.store.get_session().unwrap().expires_in, Some(3600));
    assert!(ts.store.remember());

    let snapshot = controller.settled().await;
    assert_eq!(snapshot.phase, AuthPhase::Authenticated);
    let user = snapshot.user.unwrap();
    assert_eq!(user.id, "u-1");
    assert_eq!(user.name.as_deref(), Some("Ana Lopez"));
    assert_eq!(MockApi::count(&api.me_calls), 1);

    let guard = RouteGuard::new(ts.store.clone());
    assert_eq!(guard.check("/inventario"), GuardDecision::Allow);

    ts.clock.advance_secs(3601);
    assert!(!ts.store.is_logged_in());
    assert_eq!(
        guard.check("/inventario"),
        GuardDecision::Redirect {
            to: "/auth/login?redirect=%2Finventario".to_string()
        }
    );
}

#[tokio::test]
async fn test_login_without_remember_uses_transient_backend() {
    let ts = test_store();
    let api = Arc::new(MockApi::new().with_login(Ok(login_payload("tok-t", 3600))));
    let controller = AuthController::new(ts.store.clone(), api.clone());

    let mut form = LoginForm::new();
    form.identifier = "ana".to_string();
    form.password = "secret1".to_string();
    form.submit(&controller, "/auth/login").await.unwrap();

    assert_eq!(ts.store.token_in(BackendKind::Transient).as_deref(), Some("tok-t"));
    assert_eq!(ts.store.token_in(BackendKind::Durable), None);
    assert!(!ts.store.remember());
}

#[tokio::test]
async fn test_failed_login_keeps_inputs() {
    let ts = test_store();
    let api = Arc::new(
        MockApi::new().with_login(Err(AuthError::credentials("Invalid credentials"))),
    );
    let controller = AuthController::new(ts.store.clone(), api.clone());

    let mut form = LoginForm::new();
    form.identifier = "ana".to_string();
    form.password = "wrong-pass".to_string();
    let result = form.submit(&controller, "/auth/login").await;

    assert_matches!(result, Err(AuthError::Credentials { .. }));
    assert_eq!(form.identifier, "ana");
    assert_eq!(form.password, "wrong-pass");
    assert_eq!(form.error.unwrap().message, "Invalid credentials");
    assert_eq!(controller.phase(), AuthPhase::Unauthenticated);
}

#[tokio::test]
async fn test_invalid_login_makes_no_request() {
    let ts = test_store();
    let api = Arc::new(MockApi::new());
    let controller = AuthController::new(ts.store.clone(), api.clone());

    let mut form = LoginForm::new();
    form.identifier = "ana".to_string();
    form.password = "123".to_string();
    let result = form.submit(&controller, "/auth/login").await;

    assert_matches!(result, Err(AuthError::Validation { .. }));
    assert_eq!(MockApi::count(&api.login_calls), 0);
}

#[tokio::test]
async fn test_sign_out_during_identity_lookup_stays_signed_out() {
    let ts = test_store();
    let api = Arc::new(MockApi::new());
    let gate = api.hold_identity();
    let controller = AuthController::new(ts.store.clone(), api.clone());

    ts.store.save(&Session::new("tok-1"), true);
    ts.store.set_remember(true);
    controller.set_token(Some("tok-1"));
    api.identity_started().await;

    controller.sign_out().await;
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, AuthPhase::Unauthenticated);
    assert_eq!(snapshot.token, None);
    assert_eq!(snapshot.user, None);
    assert_eq!(ts.store.get_token(), None);
    assert!(!ts.store.remember());
    assert_eq!(MockApi::count(&api.logout_calls), 1);
}

#[tokio::test]
async fn test_token_set_during_sign_out_survives() {
    let ts = test_store();
    ts.store.save(&Session::new("tok-1"), true);
    ts.store.set_remember(true);
    let api = Arc::new(MockApi::new());
    let controller = AuthController::start(ts.store.clone(), api.clone(), "/dashboard").await;
    controller.settled().await;
    let gate = api.hold_logout();

    let relogin = async {
        api.logout_started().await;
        ts.store.save(&Session::new("tok-2"), true);
        controller.set_token(Some("tok-2"));
        gate.notify_one();
    };
    tokio::join!(controller.sign_out(), relogin);

    let snapshot = controller.settled().await;
    assert_eq!(snapshot.phase, AuthPhase::Authenticated);
    assert_eq!(snapshot.token.as_deref(), Some("tok-2"));
    assert_eq!(ts.store.get_token().as_deref(), Some("tok-2"));
    assert!(ts.store.remember());
    assert_eq!(MockApi::count(&api.logout_calls), 1);
}

#[tokio::test]
async fn test_rejected_session_clears_controller() {
    let ts = test_store();
    ts.store.save(&Session::new("tok-1"), false);
    let api = Arc::new(MockApi::new());
    let controller = AuthController::start(ts.store.clone(), api.clone(), "/dashboard").await;
    controller.settled().await;
    assert_eq!(controller.phase(), AuthPhase::Authenticated);

    controller.unauthorized_listener().session_rejected("tok-1");

    assert_eq!(controller.phase(), AuthPhase::Unauthenticated);
    assert_eq!(ts.store.get_token(), None);
    assert_matches!(
        RouteGuard::new(ts.store.clone()).check("/dashboard"),
        GuardDecision::Redirect { .. }
    );
}

#[tokio::test]
async fn test_subscribers_see_token_changes() {
    let ts = test_store();
    let controller = AuthController::new(ts.store.clone(), Arc::new(MockApi::new()));
    let mut changes = controller.subscribe();

    ts.store.save(&Session::new("tok-1"), false);
    controller.set_token(Some("tok-1"));

    changes.changed().await.unwrap();
    assert_eq!(changes.borrow().token.as_deref(), Some("tok-1"));

    controller.set_token(None);
    let snapshot = controller.settled().await;
    assert_eq!(snapshot.phase, AuthPhase::Unauthenticated);
    assert_eq!(ts.store.get_token(), None);
}

#[tokio::test]
async fn test_pattern_saved_for_signed_in_user() {
    let ts = test_store();
    ts.store.save(&Session::new("tok-1"), false);
    let api = Arc::new(MockApi::new());
    let controller = AuthController::start(ts.store.clone(), api.clone(), "/dashboard").await;
    controller.settled().await;

    let mut form = PatternForm::new();
    for cell in [6, 3, 0, 1, 2] {
        form.push(cell);
    }
    form.submit(&controller).await.unwrap();

    let (token, request) = api.last_pattern().unwrap();
    assert_eq!(token, "tok-1");
    assert_eq!(request.pattern, "6-3-0-1-2");
    assert!(form.points().is_empty());
}

#[tokio::test]
async fn test_pattern_requires_session_and_three_points() {
    let ts = test_store();
    let api = Arc::new(MockApi::new());
    let controller = AuthController::new(ts.store.clone(), api.clone());

    let mut form = PatternForm::new();
    form.push(0);
    form.push(1);
    assert_matches!(form.submit(&controller).await, Err(AuthError::Validation { .. }));

    form.push(2);
    assert_matches!(form.submit(&controller).await, Err(AuthError::Unauthorized));
    assert_eq!(form.points(), &[0, 1, 2]);
    assert_eq!(MockApi::count(&api.pattern_calls), 0);
}
