use crate::timestamp::Timestamp;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

pub const HEADER_RATE_LIMIT: &str = "RateLimit-Limit";
pub const HEADER_RATE_REMAINING: &str = "RateLimit-Remaining";
pub const HEADER_RATE_RESET: &str = "RateLimit-Reset";

/// Server-declared request quota, as reported by response headers.
///
/// The zero value means "no rate information observed yet" and never
/// triggers throttling: an unobserved `reset` is the epoch, which is
/// always in the past.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// Requests permitted per window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// When the current window resets.
    pub reset: Timestamp,
}

impl Rate {
    /// Rate parsed from the three `RateLimit-*` headers. Absent or
    /// unparseable headers leave the corresponding field at zero.
    pub fn from_headers(headers: &HeaderMap) -> Rate {
        let mut rate = Rate::default();
        rate.reconcile(headers);
        rate
    }

    // Fold response headers into an existing value: every header that is
    // present and parses overwrites its field, absent headers leave the
    // prior value untouched.
    pub(crate) fn reconcile(&mut self, headers: &HeaderMap) {
        if let Some(limit) = header_u64(headers, HEADER_RATE_LIMIT) {
            self.limit = limit;
        }
        if let Some(remaining) = header_u64(headers, HEADER_RATE_REMAINING) {
            self.remaining = remaining;
        }
        if let Some(reset) = header_i64(headers, HEADER_RATE_RESET).and_then(Timestamp::from_unix)
        {
            self.reset = reset;
        }
    }

    /// True while the window has no calls left and has not reset yet.
    pub fn is_exhausted(&self, now: Timestamp) -> bool {
        self.remaining == 0 && now < self.reset
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}
