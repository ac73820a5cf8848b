//! Time source for expiry decisions
//!
//! Every expiry comparison in the engine goes through a [`Clock`] so tests can pin
//! "now" to an exact second.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{AuthError, AuthResult};

/// Source of the current time as unix seconds
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current unix time in seconds
    fn now(&self) -> i64;
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `now`
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs` seconds
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// `now + ttl`, rejecting a TTL that does not fit the timestamp range
pub(crate) fn expires_after(now: i64, ttl: i64) -> AuthResult<i64> {
    now.checked_add(ttl)
        .ok_or_else(|| AuthError::Configuration(format!("ttl {ttl} overflows the expiry time")))
}
