//! Panel Session - Client Auth Library
//!
//! Client-side session management for the admin panel: persisting the access
//! token, resolving the signed-in user, guarding protected views, and
//! invalidating the session when the API rejects it.
//!
//! # Module Structure
//!
//! - **`shared`** - Runtime-independent types
//!   - Error taxonomy for API calls and form flows
//!   - Application configuration
//!
//! - **`client`** - Session runtime
//!   - Session store over durable and per-process storage
//!   - Auth controller with identity lookup and rehydration
//!   - Route guard with login redirects
//!   - reqwest API client with bearer and bypass headers
//!   - Login, registration and password recovery flows
//!
//! # Feature Flags
//!
//! - **`cli`** (default) - builds the `panel` binary (clap, tracing-subscriber)
//!
//! # Thread Safety
//!
//! [`client::AuthController`] and [`client::SessionStore`] are cheap to clone
//! and share their state. Identity lookups run on the tokio runtime; state
//! changes are published on a `tokio::sync::watch` channel.
//!
//! # Error Handling
//!
//! API and form operations return [`shared::AuthError`]. Storage failures are
//! logged and treated as "no session" rather than surfaced.

pub mod client;
pub mod shared;
