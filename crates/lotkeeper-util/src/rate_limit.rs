//! Per-client request throttling for the IPC surface

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::ClientId;

/// Token bucket keyed by caller.
///
/// Each key starts with `capacity` tokens. A full bucket's worth of tokens is
/// restored every `window`, never exceeding `capacity`.
#[derive(Debug)]
pub struct RateLimiter<K = ClientId> {
    capacity: u32,
    window: Duration,
    buckets: HashMap<K, Bucket>,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    remaining: u32,
    window_start: Instant,
}

impl<K: Hash + Eq + Clone> RateLimiter<K> {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            buckets: HashMap::new(),
        }
    }

    /// Take one token for `key`. Returns `false` if the caller is throttled.
    pub fn check(&mut self, key: &K) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &K, now: Instant) -> bool {
        let capacity = self.capacity;
        let window = self.window;
        let bucket = self.buckets.entry(key.clone()).or_insert(Bucket {
            remaining: capacity,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) >= window {
            bucket.remaining = capacity;
            bucket.window_start = now;
        }

        match bucket.remaining.checked_sub(1) {
            Some(left) => {
                bucket.remaining = left;
                true
            }
            None => false,
        }
    }

    /// Forget a caller (on disconnect)
    pub fn remove(&mut self, key: &K) {
        self.buckets.remove(key);
    }

    /// Drop buckets that have been idle for longer than `idle`
    pub fn prune(&mut self, idle: Duration) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.window_start) < idle);
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}
