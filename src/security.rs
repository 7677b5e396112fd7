/// Request throttling and response hardening
///
/// - Token-bucket throttling for account-recovery requests
/// - Default security headers on every response

use actix_web::middleware::DefaultHeaders;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::configuration::AuthSettings;
use crate::error::AppError;

/// Configuration for a throttled operation
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Burst size: requests allowed back to back
    pub max_requests: u32,
    /// Time for an empty bucket to refill completely
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn forgot_password(settings: &AuthSettings) -> Self {
        Self {
            max_requests: settings.forgot_password_max_requests,
            window: Duration::from_secs(settings.forgot_password_window),
        }
    }
}

/// Simple token bucket rate limiter implementation
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    fn new(config: RateLimitConfig) -> Self {
        let capacity = config.max_requests as f64;
        let window = config.window.as_secs_f64().max(1.0);
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
            capacity,
            refill_rate: capacity / window,
        }
    }

    fn try_take_token(&mut self, now: Instant) -> bool {
        let elapsed_secs = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed_secs * self.refill_rate).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn is_full(&self, now: Instant) -> bool {
        let elapsed_secs = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens + elapsed_secs * self.refill_rate >= self.capacity
    }
}

const DEFAULT_MAX_KEYS: usize = 10_000;

/// Per-key limiter (keys are normalised emails)
///
/// At most `max_keys` buckets are tracked. When a new key arrives at the cap,
/// refilled buckets are dropped first, then the least recently used ones,
/// down to three quarters of the cap.
pub struct RateLimiter {
    config: RateLimitConfig,
    max_keys: usize,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            max_keys: DEFAULT_MAX_KEYS,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.max(1);
        self
    }

    /// Take one token for `key`, failing with `RateLimited` when the bucket
    /// is empty.
    pub fn check(&self, key: &str) -> Result<(), AppError> {
        let now = Instant::now();
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if buckets.len() >= self.max_keys && !buckets.contains_key(key) {
            evict(&mut buckets, now, self.max_keys * 3 / 4);
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.config));

        if bucket.try_take_token(now) {
            Ok(())
        } else {
            Err(AppError::RateLimited(
                "Too many requests, try again later".to_string(),
            ))
        }
    }
}

fn evict(buckets: &mut HashMap<String, TokenBucket>, now: Instant, target: usize) {
    buckets.retain(|_, bucket| !bucket.is_full(now));
    if buckets.len() <= target {
        return;
    }

    let mut by_age: Vec<(Instant, String)> = buckets
        .iter()
        .map(|(key, bucket)| (bucket.last_refill, key.clone()))
        .collect();
    by_age.sort_unstable();
    let excess = buckets.len() - target;
    for (_, key) in by_age.into_iter().take(excess) {
        buckets.remove(&key);
    }
    tracing::warn!(tracked = buckets.len(), "Rate limiter evicted active buckets");
}

/// Security headers for HTTP responses
pub fn default_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
        .add(("Cache-Control", "no-store"))
}
