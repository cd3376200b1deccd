//! Fixed-window request throttling per client identity.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::api::{ChatEnvelope, RateLimitInfo};

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
pub const RATE_LIMITED_STATUS: u16 = 429;

const DEFAULT_MAX_REQUESTS: u32 = 100;
const DEFAULT_WINDOW_MS: u64 = 900_000;
const LOCAL_CLIENT_KEY: &str = "localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub info: RateLimitInfo,
}

impl RateLimitDecision {
    /// Body of the 429 answer sent when the request is refused.
    pub fn rejection(&self) -> ChatEnvelope {
        ChatEnvelope::failure(RATE_LIMIT_MESSAGE)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Count one request from `key` at `now_ms` (epoch milliseconds).
    ///
    /// A window opens on the first request and lasts for the policy window;
    /// once `max_requests` have been counted, further requests are refused
    /// until it expires.
    pub fn check(&self, key: &str, now_ms: u64) -> RateLimitDecision {
        let limit = self.policy.max_requests;
        let window_ms = u64::try_from(self.policy.window.as_millis()).unwrap_or(u64::MAX);
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at_ms: 0,
        });
        if window.count == 0 || now_ms > window.reset_at_ms {
            *window = Window {
                count: 0,
                reset_at_ms: now_ms.saturating_add(window_ms),
            };
        }

        if window.count >= limit {
            debug!(key, "rate limit reached");
            return RateLimitDecision {
                allowed: false,
                info: RateLimitInfo {
                    limit,
                    remaining: 0,
                    reset: window.reset_at_ms,
                },
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            info: RateLimitInfo {
                limit,
                remaining: limit - window.count,
                reset: window.reset_at_ms,
            },
        }
    }

    /// Forget windows that have expired by `now_ms`.
    pub fn purge_expired(&self, now_ms: u64) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, window| now_ms <= window.reset_at_ms);
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Client identity: the first `X-Forwarded-For` entry, or `localhost`.
pub fn client_key(forwarded_for: Option<&str>) -> String {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .unwrap_or(LOCAL_CLIENT_KEY)
        .to_string()
}
