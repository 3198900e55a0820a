//! Per-address throttling of pairing attempts
//!
//! Fixed windows: the first attempt from an address opens a window, every
//! attempt inside it counts, and the window only resets once it has passed.
//! Stale windows are dropped by the cleanup sweep, not by [`RateLimiter::check_and_consume`].

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;

/// Attempts seen from one address in the current window
#[derive(Debug, Clone)]
struct RateLimitWindow {
    attempts: u32,
    reset_at: DateTime<Utc>,
}

/// Throttles pairing initiation per origin address
#[derive(Debug)]
pub struct RateLimiter {
    max_attempts: u32,
    window: Duration,
    windows: Mutex<HashMap<String, RateLimitWindow>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_attempts` per `window_secs`
    pub fn new(max_attempts: u32, window_secs: u64) -> Self {
        Self {
            max_attempts,
            window: Duration::seconds(window_secs as i64),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt from `origin` and report whether it is allowed
    pub async fn check_and_consume(&self, origin: &str) -> bool {
        self.check_and_consume_at(origin, Utc::now()).await
    }

    pub(crate) async fn check_and_consume_at(&self, origin: &str, now: DateTime<Utc>) -> bool {
        let mut windows = self.windows.lock().await;

        match windows.get_mut(origin) {
            Some(window) if now <= window.reset_at => {
                window.attempts = window.attempts.saturating_add(1);
                let allowed = window.attempts <= self.max_attempts;
                if !allowed {
                    warn!(
                        origin,
                        attempts = window.attempts,
                        "Pairing attempt rate limited"
                    );
                }
                allowed
            }
            _ => {
                windows.insert(
                    origin.to_string(),
                    RateLimitWindow {
                        attempts: 1,
                        reset_at: now + self.window,
                    },
                );
                true
            }
        }
    }

    /// Drop every window whose reset time has passed
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| w.reset_at >= now);
        before - windows.len()
    }

    /// Number of tracked addresses
    pub async fn tracked(&self) -> usize {
        self.windows.lock().await.len()
    }
}
