//! Auth Session Controller
//!
//! Single owner of the in-memory token and user. Consumers read snapshots
//! (or subscribe to changes); all mutation goes through [`AuthController::set_token`],
//! [`AuthController::sign_out`] and [`AuthController::invalidate`].
//!
//! ## Lifecycle
//!
//! ```text
//! Unauthenticated --set_token(Some)/rehydrate--> TokenPresentNoIdentity
//! TokenPresentNoIdentity --identity ok--> Authenticated
//! TokenPresentNoIdentity | Authenticated --identity error / set_token(None)--> Unauthenticated
//! Authenticated --sign_out--> Invalidating --> Unauthenticated
//! ```
//!
//! Every token change bumps an epoch. An identity response is applied only if
//! its lookup is still tied to the current epoch, so a lookup that resolves
//! after sign-out (or after a different token was set) is dropped. At most one
//! lookup per token value is in flight: setting a token whose lookup is still
//! pending re-targets that lookup at the new epoch instead of issuing another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::api::{AuthApi, UnauthorizedListener};
use crate::client::guard::is_auth_route;
use crate::client::session_store::SessionStore;
use crate::client::types::AuthUser;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    TokenPresentNoIdentity,
    Authenticated,
    Invalidating,
}

/// Read-only view of the controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub token: Option<String>,
    pub user: Option<AuthUser>,
    pub phase: AuthPhase,
}

impl AuthSnapshot {
    fn signed_out() -> Self {
        Self {
            token: None,
            user: None,
            phase: AuthPhase::Unauthenticated,
        }
    }
}

struct State {
    snapshot: AuthSnapshot,
    epoch: u64,
    /// Pending identity lookups: token -> epoch the result applies to
    in_flight: HashMap<String, u64>,
}

impl State {
    /// Tie the lookup for `token` to the current epoch. Returns `true` when a
    /// new lookup must be issued.
    fn track_lookup(&mut self, token: &str) -> bool {
        self.in_flight
            .insert(token.to_string(), self.epoch)
            .is_none()
    }
}

struct Inner {
    store: SessionStore,
    api: Arc<dyn AuthApi>,
    state: Mutex<State>,
    changes: watch::Sender<AuthSnapshot>,
    bootstrapped: AtomicBool,
}

impl Inner {
    fn publish(&self, state: &State) {
        self.changes.send_replace(state.snapshot.clone());
    }

    /// Drop token and user. Caller holds the state lock.
    fn reset(&self, state: &mut State) {
        state.epoch += 1;
        state.snapshot = AuthSnapshot::signed_out();
        self.publish(state);
    }

    fn invalidate(&self) {
        self.store.clear();
        let mut state = self.state.lock();
        if state.snapshot.token.is_some() || state.snapshot.user.is_some() {
            debug!("Invalidating in-memory session");
        }
        self.reset(&mut state);
    }

    /// The server rejected `token`. Only acts when it is still the current
    /// token (or none is held).
    fn reject(&self, token: &str) {
        let mut state = self.state.lock();
        if state
            .snapshot
            .token
            .as_deref()
            .is_some_and(|current| current != token)
        {
            debug!("Ignoring rejection of a superseded token");
            return;
        }
        if self.store.get_token().as_deref() == Some(token) {
            self.store.clear();
        }
        debug!("Invalidating rejected session");
        self.reset(&mut state);
    }
}

/// Shared handle to the application's auth state. Clones refer to the same
/// controller.
#[derive(Clone)]
pub struct AuthController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AuthController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthController")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl AuthController {
    /// Create the controller, adopting a live stored token without any
    /// network call. Call [`bootstrap`](Self::bootstrap) once afterwards.
    pub fn new(store: SessionStore, api: Arc<dyn AuthApi>) -> Self {
        let snapshot = if store.is_logged_in() {
            debug!("Adopting stored session");
            AuthSnapshot {
                token: store.get_token(),
                user: None,
                phase: AuthPhase::TokenPresentNoIdentity,
            }
        } else {
            if store.get_token().is_some() {
                debug!("Discarding expired stored session");
                store.clear();
            }
            AuthSnapshot::signed_out()
        };

        let (changes, _) = watch::channel(snapshot.clone());
        Self {
            inner: Arc::new(Inner {
                store,
                api,
                state: Mutex::new(State {
                    snapshot,
                    epoch: 0,
                    in_flight: HashMap::new(),
                }),
                changes,
                bootstrapped: AtomicBool::new(false),
            }),
        }
    }

    /// [`new`](Self::new) followed by [`bootstrap`](Self::bootstrap).
    pub async fn start(store: SessionStore, api: Arc<dyn AuthApi>, location: &str) -> Self {
        let controller = Self::new(store, api);
        controller.bootstrap(location).await;
        controller
    }

    /// One-time startup step. Resolves the identity of an adopted token, or
    /// tries to rehydrate a session from the server when the user asked to be
    /// remembered and `location` is not an auth-flow route. Later calls are
    /// no-ops.
    pub async fn bootstrap(&self, location: &str) {
        if self.inner.bootstrapped.swap(true, Ordering::SeqCst) {
            return;
        }

        let adopted = {
            let mut state = self.inner.state.lock();
            state.snapshot.token.clone().map(|token| {
                let issue = state.snapshot.user.is_none() && state.track_lookup(&token);
                (token, issue)
            })
        };
        if let Some((token, issue)) = adopted {
            if issue {
                self.spawn_identity_lookup(token);
            }
            return;
        }

        if is_auth_route(location) {
            debug!(location, "Skipping rehydration on auth route");
            return;
        }
        if !self.inner.store.remember() {
            debug!("Skipping rehydration, remember preference not set");
            return;
        }

        match self.inner.api.rehydrate().await {
            Ok(Some(payload)) => {
                let Some(session) = payload.session() else {
                    return;
                };
                if self.inner.state.lock().snapshot.token.is_some() {
                    debug!("Session set while rehydrating, keeping it");
                    return;
                }
                self.inner.store.save(&session, true);
                info!("Session rehydrated");
                self.set_token(Some(&session.access_token));
            }
            Ok(None) => debug!("No session to rehydrate"),
            Err(e) => debug!(error = %e, "Rehydration failed"),
        }
    }

    /// Replace the in-memory token.
    ///
    /// `None` also clears the session store. `Some` only touches memory:
    /// callers persist the session (with the chosen remember flag) first.
    /// Setting the current token again does nothing.
    pub fn set_token(&self, token: Option<&str>) {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            self.inner.store.clear();
            let mut state = self.inner.state.lock();
            self.inner.reset(&mut state);
            return;
        };

        let issue = {
            let mut state = self.inner.state.lock();
            if state.snapshot.token.as_deref() == Some(token) {
                return;
            }
            state.epoch += 1;
            state.snapshot = AuthSnapshot {
                token: Some(token.to_string()),
                user: None,
                phase: AuthPhase::TokenPresentNoIdentity,
            };
            self.inner.publish(&state);
            state.track_lookup(token)
        };

        if issue {
            self.spawn_identity_lookup(token.to_string());
        } else {
            debug!("Identity lookup for this token already in flight");
        }
    }

    /// Sign out: best-effort remote logout, then clear the store, the
    /// in-memory state and the remember preference.
    ///
    /// A token set while the remote logout is pending wins: the local session
    /// is then left alone.
    pub async fn sign_out(&self) {
        let (token, epoch) = {
            let mut state = self.inner.state.lock();
            state.epoch += 1;
            state.snapshot.phase = AuthPhase::Invalidating;
            self.inner.publish(&state);
            (state.snapshot.token.clone(), state.epoch)
        };

        if let Some(token) = token {
            if let Err(e) = self.inner.api.logout(&token).await {
                warn!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        }

        let mut state = self.inner.state.lock();
        if state.epoch != epoch {
            debug!("New session set during sign-out, keeping it");
            return;
        }
        self.inner.store.clear();
        self.inner.store.clear_remember();
        self.inner.reset(&mut state);
        info!("Signed out");
    }

    /// Clear the store and the in-memory state, as when the server rejects
    /// the session.
    pub fn invalidate(&self) {
        self.inner.invalidate();
    }

    /// Listener to register with the API client so 401 responses clear the
    /// in-memory state too. Rejections of a token other than the current one
    /// are ignored.
    pub fn unauthorized_listener(&self) -> Arc<dyn UnauthorizedListener> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move |token: &str| {
            if let Some(inner) = weak.upgrade() {
                inner.reject(token);
            }
        })
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.state.lock().snapshot.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.state.lock().snapshot.token.clone()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.inner.state.lock().snapshot.user.clone()
    }

    pub fn phase(&self) -> AuthPhase {
        self.inner.state.lock().snapshot.phase
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn api(&self) -> Arc<dyn AuthApi> {
        Arc::clone(&self.inner.api)
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.changes.subscribe()
    }

    /// Wait until no identity lookup or sign-out is pending.
    pub async fn settled(&self) -> AuthSnapshot {
        let mut changes = self.subscribe();
        let result = changes
            .wait_for(|s| {
                !matches!(
                    s.phase,
                    AuthPhase::TokenPresentNoIdentity | AuthPhase::Invalidating
                )
            })
            .await
            .map(|s| s.clone());
        result.unwrap_or_else(|_| self.snapshot())
    }

    fn spawn_identity_lookup(&self, token: String) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            debug!("Resolving identity");
            let result = inner.api.me(&token).await;

            let mut state = inner.state.lock();
            let target = state.in_flight.remove(&token);
            if target != Some(state.epoch) {
                debug!(?target, current = state.epoch, "Discarding stale identity response");
                return;
            }
            match result {
                Ok(profile) => {
                    state.snapshot.user = Some(AuthUser::from(profile));
                    state.snapshot.phase = AuthPhase::Authenticated;
                    inner.publish(&state);
                    debug!("Identity resolved");
                }
                Err(e) => {
                    debug!(error = %e, "Identity lookup failed, invalidating session");
                    if inner.store.get_token().as_deref() == Some(token.as_str()) {
                        inner.store.clear();
                    }
                    inner.reset(&mut state);
                }
            }
        });
    }
}
