use std::collections::HashMap;
use std::env;
use std::sync::Mutex;
use std::time::Instant;

use rocket::Request;
use rocket::http::Header;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;

/// Configurable rate limit values, read from environment variables.
///
/// - `RATE_LIMIT_MESSAGES` — Max inbound messages per minute per tenant (default: 60)
/// - `RATE_LIMIT_APPROVALS` — Max task resolutions per minute per tenant (default: 120)
pub struct RateLimitConfig {
    pub messages_max: usize,
    pub messages_window_secs: u64,
    pub approvals_max: usize,
    pub approvals_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            messages_max: 60,
            messages_window_secs: 60,
            approvals_max: 120,
            approvals_window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = env::var("RATE_LIMIT_MESSAGES")
            && let Ok(n) = val.parse::<usize>()
        {
            config.messages_max = n;
        }
        if let Ok(val) = env::var("RATE_LIMIT_APPROVALS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.approvals_max = n;
        }
        config
    }
}

pub struct RateLimiter {
    limits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about rate limit status for a given key.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    /// Seconds until the oldest request in the window expires. 0 if there's
    /// remaining capacity.
    pub retry_after_secs: u64,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            limits: Mutex::new(HashMap::new()),
        }
    }

    /// Check rate limit and return detailed info for response headers.
    /// `key` is typically "action:tenant".
    pub fn check_with_info(&self, key: &str, max: usize, window_secs: u64) -> RateLimitInfo {
        let mut limits = self.limits.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let window = std::time::Duration::from_secs(window_secs);

        let entries = limits.entry(key.to_string()).or_default();
        entries.retain(|t| now.duration_since(*t) < window);

        if entries.len() >= max {
            let retry_after = entries
                .iter()
                .min()
                .map(|oldest| {
                    let elapsed = now.duration_since(*oldest);
                    if elapsed < window {
                        (window - elapsed).as_secs() + 1
                    } else {
                        1
                    }
                })
                .unwrap_or(1);
            return RateLimitInfo {
                allowed: false,
                limit: max,
                remaining: 0,
                retry_after_secs: retry_after,
            };
        }

        entries.push(now);
        RateLimitInfo {
            allowed: true,
            limit: max,
            remaining: max - entries.len(),
            retry_after_secs: 0,
        }
    }
}

/// Wrapper that adds standard rate limit headers to any JSON response.
pub struct RateLimited<T> {
    pub inner: Json<T>,
    pub info: RateLimitInfo,
}

impl<T> RateLimited<T> {
    pub fn new(inner: Json<T>, info: RateLimitInfo) -> Self {
        Self { inner, info }
    }
}

impl<'r, 'o: 'r, T: serde::Serialize + 'o> Responder<'r, 'o> for RateLimited<T> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let mut response = Response::build_from(self.inner.respond_to(req)?)
            .header(Header::new("X-RateLimit-Limit", self.info.limit.to_string()))
            .header(Header::new(
                "X-RateLimit-Remaining",
                self.info.remaining.to_string(),
            ))
            .header(Header::new(
                "X-RateLimit-Reset",
                self.info.retry_after_secs.to_string(),
            ))
            .finalize();

        if !self.info.allowed {
            response.set_header(Header::new(
                "Retry-After",
                self.info.retry_after_secs.to_string(),
            ));
        }

        Ok(response)
    }
}
