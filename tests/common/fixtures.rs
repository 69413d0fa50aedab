//! Session and store fixtures

use std::sync::Arc;

use panel_session::client::types::{AuthPayload, Profile};
use panel_session::client::{ManualClock, MemoryStorage, SessionStore};

/// Fixed start instant for clock-driven tests
pub const T0_MILLIS: i64 = 1_700_000_000_000;

/// Store over two in-memory backends plus handles to all three parts.
pub struct TestStore {
    pub store: SessionStore,
    pub durable: Arc<MemoryStorage>,
    pub transient: Arc<MemoryStorage>,
    pub clock: ManualClock,
}

pub fn test_store() -> TestStore {
    let durable = Arc::new(MemoryStorage::new());
    let transient = Arc::new(MemoryStorage::new());
    let clock = ManualClock::new(T0_MILLIS);
    let store = SessionStore::with_clock(
        durable.clone(),
        transient.clone(),
        Arc::new(clock.clone()),
    );
    TestStore {
        store,
        durable,
        transient,
        clock,
    }
}

pub fn login_payload(token: &str, expires_in: i64) -> AuthPayload {
    AuthPayload {
        access_token: Some(token.to_string()),
        token_type: Some("bearer".to_string()),
        expires_in: Some(expires_in),
        usuario_id: Some("u-1".to_string()),
        email: Some("ana@example.com".to_string()),
        nombre: Some("Ana".to_string()),
        username: Some("ana".to_string()),
    }
}

pub fn ana_profile() -> Profile {
    Profile {
        id: "u-1".to_string(),
        email: Some("ana@example.com".to_string()),
        nombres: Some("Ana".to_string()),
        apellidos: Some("Lopez".to_string()),
        ..Profile::default()
    }
}
