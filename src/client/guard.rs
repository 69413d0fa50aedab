//! Route Guard
//!
//! Decides, on every navigation, whether a protected view may be shown.
//! The check is a synchronous storage read; tokens that are accepted here
//! but rejected by the server are caught by the API client's 401 handling.

use std::fmt;

use crate::client::session_store::SessionStore;

pub const LOGIN_ROUTE: &str = "/auth/login";
pub const DEFAULT_AFTER_LOGIN: &str = "/dashboard";

const AUTH_PREFIX: &str = "/auth/";

/// Whether `path` belongs to the login/register/recovery flows.
pub fn is_auth_route(path: &str) -> bool {
    let path = Location::parse(path).path;
    path == "/auth" || path.starts_with(AUTH_PREFIX)
}

/// A navigation target split into path, query and fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl Location {
    pub fn parse(target: &str) -> Self {
        let (rest, fragment) = match target.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (target, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (rest, None),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self {
            path: path.to_string(),
            query,
            fragment,
        }
    }

    /// First value of query parameter `name`, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.as_deref().and_then(|query| find_param(query, name))
    }

    /// First value of fragment parameter `name`, percent-decoded.
    pub fn fragment_param(&self, name: &str) -> Option<String> {
        self.fragment.as_deref().and_then(|fragment| find_param(fragment, name))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

/// Parse an `a=1&b=2` list and return the decoded value of `name`.
pub(crate) fn find_param(pairs: &str, name: &str) -> Option<String> {
    pairs
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key) == name).then(|| decode_component(value))
        })
        .find(|value| !value.is_empty())
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the requested view unchanged
    Allow,
    /// Navigate to `to` instead, replacing the current history entry
    Redirect { to: String },
}

/// Gate for protected views.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    store: SessionStore,
    login_route: String,
}

impl RouteGuard {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            login_route: LOGIN_ROUTE.to_string(),
        }
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Check a protected navigation target (path, query and fragment).
    pub fn check(&self, target: &str) -> GuardDecision {
        if self.store.is_logged_in() {
            return GuardDecision::Allow;
        }
        GuardDecision::Redirect {
            to: login_redirect(&self.login_route, target),
        }
    }

    /// Like [`check`](Self::check), but public auth-flow routes always pass.
    pub fn navigate(&self, target: &str) -> GuardDecision {
        if is_auth_route(target) {
            return GuardDecision::Allow;
        }
        self.check(target)
    }
}

/// Login URL carrying `target` as the url-encoded `redirect` parameter.
pub fn login_redirect(login_route: &str, target: &str) -> String {
    format!("{}?redirect={}", login_route, urlencoding::encode(target))
}

/// Where to go after a successful login, given the login page's location.
/// Only same-origin relative paths are honoured.
pub fn post_login_target(login_location: &str) -> String {
    Location::parse(login_location)
        .query_param("redirect")
        .filter(|target| is_safe_redirect(target))
        .unwrap_or_else(|| DEFAULT_AFTER_LOGIN.to_string())
}

fn is_safe_redirect(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.starts_with("/\\")
        && !is_auth_route(target)
}
