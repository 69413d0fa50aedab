//! Session Store
//!
//! Persists the [`Session`] across a durable and a transient
//! [`StorageBackend`]. The backend is picked by the `remember` flag at save
//! time; nothing outside this module needs to know which one is active.
//!
//! Both backends use the same keys:
//!
//! | Key               | Value                                      |
//! |-------------------|--------------------------------------------|
//! | `accessToken`     | bearer token                               |
//! | `accessToken_exp` | absolute expiry, epoch milliseconds        |
//! | `session_meta`    | JSON `{email, usuarioId, tokenType}`       |
//!
//! The remember preference lives in the durable backend under `rememberMe`
//! as `"1"` / `"0"`.
//!
//! Persistence is best-effort: storage failures are logged and swallowed,
//! and "no session" is reported as `None`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::clock::{Clock, SystemClock};
use crate::client::storage::{MemoryStorage, StorageBackend};
use crate::client::types::{Session, SessionMeta, DEFAULT_TOKEN_TYPE};

pub const TOKEN_KEY: &str = "accessToken";
pub const EXPIRY_KEY: &str = "accessToken_exp";
pub const META_KEY: &str = "session_meta";
pub const REMEMBER_KEY: &str = "rememberMe";

const SESSION_KEYS: [&str; 3] = [TOKEN_KEY, EXPIRY_KEY, META_KEY];

/// Which backend holds a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Survives restarts
    Durable,
    /// Cleared when the process ends
    Transient,
}

impl BackendKind {
    pub fn for_remember(remember: bool) -> Self {
        if remember {
            BackendKind::Durable
        } else {
            BackendKind::Transient
        }
    }
}

/// Session persistence over two backends. Clones share the same backends.
#[derive(Clone)]
pub struct SessionStore {
    durable: Arc<dyn StorageBackend>,
    transient: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("active", &self.active_backend())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(durable: Arc<dyn StorageBackend>, transient: Arc<dyn StorageBackend>) -> Self {
        Self::with_clock(durable, transient, Arc::new(SystemClock))
    }

    pub fn with_clock(
        durable: Arc<dyn StorageBackend>,
        transient: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            durable,
            transient,
            clock,
        }
    }

    /// Store with two in-memory backends.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Replace any stored session with `session`, in the backend chosen by
    /// `remember`.
    pub fn save(&self, session: &Session, remember: bool) {
        self.clear();

        let kind = BackendKind::for_remember(remember);
        let backend = self.backend(kind);

        write(backend, TOKEN_KEY, &session.access_token);

        match session.expires_in {
            Some(secs) if secs > 0 => {
                let expires_at = self
                    .clock
                    .now_millis()
                    .saturating_add(secs.saturating_mul(1000));
                write(backend, EXPIRY_KEY, &expires_at.to_string());
            }
            Some(secs) => {
                warn!(expires_in = secs, "Ignoring non-positive session lifetime");
            }
            None => {}
        }

        let meta = SessionMeta {
            email: session.email.clone(),
            usuario_id: session.usuario_id.clone(),
            token_type: Some(session.token_type.clone()),
        };
        match serde_json::to_string(&meta) {
            Ok(blob) => write(backend, META_KEY, &blob),
            Err(e) => warn!(error = %e, "Failed to encode session metadata"),
        }

        debug!(backend = ?kind, "Session saved");
    }

    /// Current token, preferring the transient backend.
    pub fn get_token(&self) -> Option<String> {
        self.holder().map(|(_, token)| token)
    }

    /// Token present and not expired.
    pub fn is_logged_in(&self) -> bool {
        let Some((kind, _)) = self.holder() else {
            return false;
        };
        match self.expires_at(kind) {
            None => true,
            Some(expires_at) => self.clock.now_millis() < expires_at,
        }
    }

    /// Reconstruct the stored session. `expires_in` is the number of seconds
    /// remaining and may be zero or negative for an expired record.
    pub fn get_session(&self) -> Option<Session> {
        let (kind, token) = self.holder()?;
        let backend = self.backend(kind);

        let meta = read(backend, META_KEY)
            .and_then(|blob| match serde_json::from_str::<SessionMeta>(&blob) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    debug!(error = %e, "Ignoring malformed session metadata");
                    None
                }
            })
            .unwrap_or_default();

        let now = self.clock.now_millis();
        let expires_in = self
            .expires_at(kind)
            .map(|expires_at| remaining_secs(expires_at.saturating_sub(now)));

        Some(Session {
            access_token: token,
            token_type: meta
                .token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            expires_in,
            usuario_id: meta.usuario_id,
            email: meta.email,
        })
    }

    /// Remove every session key from both backends.
    pub fn clear(&self) {
        for backend in [&self.durable, &self.transient] {
            for key in SESSION_KEYS {
                remove(backend.as_ref(), key);
            }
        }
    }

    /// Backend currently holding a token.
    pub fn active_backend(&self) -> Option<BackendKind> {
        self.holder().map(|(kind, _)| kind)
    }

    /// Token stored in one specific backend.
    pub fn token_in(&self, kind: BackendKind) -> Option<String> {
        read(self.backend(kind), TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn remember(&self) -> bool {
        read(self.durable.as_ref(), REMEMBER_KEY).as_deref() == Some("1")
    }

    pub fn set_remember(&self, remember: bool) {
        write(self.durable.as_ref(), REMEMBER_KEY, if remember { "1" } else { "0" });
    }

    pub fn clear_remember(&self) {
        remove(self.durable.as_ref(), REMEMBER_KEY);
    }

    fn backend(&self, kind: BackendKind) -> &dyn StorageBackend {
        match kind {
            BackendKind::Durable => self.durable.as_ref(),
            BackendKind::Transient => self.transient.as_ref(),
        }
    }

    fn holder(&self) -> Option<(BackendKind, String)> {
        [BackendKind::Transient, BackendKind::Durable]
            .into_iter()
            .find_map(|kind| self.token_in(kind).map(|token| (kind, token)))
    }

    fn expires_at(&self, kind: BackendKind) -> Option<i64> {
        read(self.backend(kind), EXPIRY_KEY)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|ms| *ms != 0)
    }
}

/// Milliseconds to whole seconds, rounding up.
fn remaining_secs(millis: i64) -> i64 {
    millis.saturating_add(999).div_euclid(1000)
}

fn read(backend: &dyn StorageBackend, key: &str) -> Option<String> {
    match backend.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Session storage read failed");
            None
        }
    }
}

fn write(backend: &dyn StorageBackend, key: &str, value: &str) {
    if let Err(e) = backend.set(key, value) {
        warn!(key, error = %e, "Session storage write failed");
    }
}

fn remove(backend: &dyn StorageBackend, key: &str) {
    if let Err(e) = backend.remove(key) {
        warn!(key, error = %e, "Session storage remove failed");
    }
}
