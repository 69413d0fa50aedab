//! Rate-limit cooldowns.
//!
//! The server stays the authority; this only disables a submit action
//! locally until the advertised cooldown has elapsed.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::client::clock::Clock;

/// Cooldown used when the server gives no usable duration.
pub const DEFAULT_COOLDOWN_SECS: u64 = 30;

fn after_seconds() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)after\s+(\d+)\s*seconds?").expect("valid regex"))
}

fn bare_seconds() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*s(ec(onds)?)?").expect("valid regex"))
}

/// Extract a cooldown from text such as `"retry after 27 seconds"` or
/// `"wait 10s"`. Never returns less than one second.
pub fn parse_cooldown_secs(text: &str, fallback: u64) -> u64 {
    after_seconds()
        .captures(text)
        .or_else(|| bare_seconds().captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|secs| secs.max(1))
        .unwrap_or(fallback)
}

/// Local deadline before an action may be retried.
#[derive(Clone)]
pub struct Cooldown {
    clock: Arc<dyn Clock>,
    until_millis: Option<i64>,
}

impl std::fmt::Debug for Cooldown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cooldown")
            .field("until_millis", &self.until_millis)
            .finish()
    }
}

impl Cooldown {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            until_millis: None,
        }
    }

    pub fn start(&mut self, secs: u64) {
        let millis = i64::try_from(secs).unwrap_or(i64::MAX / 1000) * 1000;
        self.until_millis = Some(self.clock.now_millis().saturating_add(millis));
    }

    /// Whole seconds left, zero once elapsed.
    pub fn remaining_secs(&self) -> u64 {
        let Some(until) = self.until_millis else {
            return 0;
        };
        let left = until - self.clock.now_millis();
        if left <= 0 {
            0
        } else {
            u64::try_from((left + 999) / 1000).unwrap_or(0)
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining_secs() > 0
    }
}
