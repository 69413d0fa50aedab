//! Client Module
//!
//! Everything a front end needs to keep a user signed in against the panel
//! API: token persistence, the auth controller, the route guard, the HTTP
//! client with 401 handling, and the login/registration/recovery and
//! unlock-pattern flows.
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs           - Module exports
//! ├── clock.rs         - Wall clock abstraction
//! ├── storage.rs       - Key-value storage backends
//! ├── session_store.rs - Token persistence with expiry
//! ├── config.rs        - Client configuration (file + environment)
//! ├── api.rs           - Auth API trait and reqwest client
//! ├── controller.rs    - Auth session controller
//! ├── guard.rs         - Route guard and redirect handling
//! ├── cooldown.rs      - Rate-limit cooldowns
//! ├── forms.rs         - Login, register, recovery and pattern flows
//! └── types.rs         - Wire and session types
//! ```
//!
//! `main.rs` in the same directory is the `panel` binary target (built with
//! the `cli` feature), not a module of this library.
//!
//! # Wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use panel_session::client::{AuthController, Config, HttpAuthApi, SessionStore};
//!
//! # async fn example() -> Result<(), panel_session::shared::AuthError> {
//! let store = SessionStore::in_memory();
//! let api = Arc::new(HttpAuthApi::new(Config::new(), store.clone())?);
//! let controller = AuthController::start(store, api.clone(), "/dashboard").await;
//! api.set_unauthorized_listener(controller.unauthorized_listener());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod controller;
pub mod cooldown;
pub mod forms;
pub mod guard;
pub mod session_store;
pub mod storage;
pub mod types;

pub use api::{AuthApi, HttpAuthApi, UnauthorizedListener};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use controller::{AuthController, AuthPhase, AuthSnapshot};
pub use cooldown::{parse_cooldown_secs, Cooldown};
pub use forms::{
    split_full_name, ForgotPasswordForm, FormMessage, LoginForm, LoginSuccess, PatternForm,
    RecoveryTokens, RegisterForm, ResetPasswordForm,
};
pub use guard::{GuardDecision, Location, RouteGuard};
pub use session_store::{BackendKind, SessionStore};
pub use storage::{FileStorage, MemoryStorage, StorageBackend, StorageError};
pub use types::{AuthPayload, AuthUser, Profile, Session};
