//! Fixed-window request throttling keyed by client address.
//!
//! State lives in the serving process and is lost on restart — acceptable,
//! since the limiter dampens abuse rather than guaranteeing correctness.
//! The check-and-increment runs entirely under one mutex acquisition, with
//! no await point between read and write.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Bucket table size that triggers an opportunistic sweep of expired entries.
const EVICTION_THRESHOLD: usize = 2000;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub limited: bool,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

pub struct RateLimiter {
    max: u32,
    window: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request from `key` and decide whether it exceeds the limit.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if buckets.len() > EVICTION_THRESHOLD {
            let window = self.window;
            buckets.retain(|_, b| now.duration_since(b.window_start) < window);
        }

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            window_start: now,
            count: 0,
        });
        if now.duration_since(bucket.window_start) >= self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.count += 1;

        let limited = bucket.count > self.max;
        let remaining = self.max.saturating_sub(bucket.count);
        let retry_after_secs = if limited {
            let window_end = bucket.window_start + self.window;
            let left = window_end.saturating_duration_since(now);
            // Ceil to whole seconds so the client never retries early.
            left.as_secs() + u64::from(left.subsec_nanos() > 0)
        } else {
            0
        };

        RateDecision {
            limited,
            remaining,
            retry_after_secs,
        }
    }
}
