//! Fixed-window rate limiting.
//!
//! # Responsibilities
//! - Count requests per key within fixed windows
//! - Derive keys from the presented token (hashed) or the client IP
//! - Opportunistically evict stale buckets
//!
//! # Design Decisions
//! - Consume-then-decide: a denied request still counts
//! - One bucket per key; read and write ceilings share it
//! - Sweeps run every `SWEEP_INTERVAL` checks instead of on a timer

use axum::http::HeaderMap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::observability::metrics;
use crate::security::authorizer::extract_token;

/// Number of checks between stale-bucket sweeps.
pub const SWEEP_INTERVAL: u64 = 256;

/// Counter for a single key's current window.
#[derive(Debug, Clone, Copy)]
struct RateLimitBucket {
    window_start_ms: i64,
    window_ms: i64,
    count: u32,
}

impl RateLimitBucket {
    fn fresh(now_ms: i64, window_ms: i64) -> Self {
        Self {
            window_start_ms: now_ms,
            window_ms,
            count: 1,
        }
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms - self.window_start_ms >= self.window_ms
    }

    /// The window ended more than two window lengths ago.
    fn is_stale(&self, now_ms: i64) -> bool {
        let window_end = self.window_start_ms.saturating_add(self.window_ms);
        now_ms - window_end > self.window_ms.saturating_mul(2)
    }
}

/// Result of a single limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_ms: i64,
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    /// Reset time as whole epoch seconds, for `X-RateLimit-Reset`.
    pub fn reset_at_secs(&self) -> i64 {
        (self.reset_at_ms + 999).div_euclid(1000)
    }
}

/// Keyed fixed-window counter store.
#[derive(Debug, Default)]
pub struct FixedWindowLimiter {
    buckets: DashMap<String, RateLimitBucket>,
    checks: AtomicU64,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request against `key` and decide whether it may proceed.
    pub fn check(
        &self,
        key: &str,
        max_requests: u32,
        window_ms: u64,
        now_ms: i64,
    ) -> RateLimitDecision {
        let window_ms = i64::try_from(window_ms).unwrap_or(i64::MAX).max(1);

        let bucket = match self.buckets.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let bucket = occupied.get_mut();
                if bucket.is_expired(now_ms) {
                    *bucket = RateLimitBucket::fresh(now_ms, window_ms);
                } else {
                    bucket.count = bucket.count.saturating_add(1);
                }
                *bucket
            }
            Entry::Vacant(vacant) => *vacant.insert(RateLimitBucket::fresh(now_ms, window_ms)),
        };

        // The shard guard is released above; retain() would deadlock otherwise.
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep(now_ms);
        }

        let reset_at_ms = bucket.window_start_ms.saturating_add(bucket.window_ms);
        let millis_left = (reset_at_ms - now_ms).max(0) as u64;

        RateLimitDecision {
            allowed: bucket.count <= max_requests,
            limit: max_requests,
            remaining: max_requests.saturating_sub(bucket.count),
            reset_at_ms,
            retry_after_secs: millis_left.div_ceil(1000).max(1),
        }
    }

    /// Remove buckets whose window ended long ago.
    pub fn sweep(&self, now_ms: i64) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_stale(now_ms));
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            tracing::debug!(
                removed,
                remaining = self.buckets.len(),
                "Swept stale rate-limit buckets"
            );
        }
        metrics::record_bucket_count(self.buckets.len());
        removed
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Derive the bucket key for a request.
///
/// Tokens are hashed so the key is safe to log or inspect.
pub fn build_rate_limit_key(headers: &HeaderMap, client_ip: IpAddr) -> String {
    match extract_token(headers) {
        Some(token) => {
            let digest = Sha256::digest(token.as_bytes());
            let hex = hex::encode(digest);
            format!("token:{}", &hex[..16])
        }
        None => format!("ip:{}", client_ip),
    }
}
