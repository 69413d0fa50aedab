//! Common test utilities and helpers
//!
//! - A scriptable in-process [`AuthApi`](panel_session::client::AuthApi)
//! - Session and store fixtures

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_api;

pub use fixtures::*;
pub use mock_api::*;
