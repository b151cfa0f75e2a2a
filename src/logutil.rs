//! A tiny log rate limiter: gates one log line per `every` occurrences so a
//! persistently failing raster can't flood the log.

use std::sync::atomic::{AtomicU32, Ordering};

pub struct RateLimiter {
    every: u32,
    count: AtomicU32,
}

impl RateLimiter {
    pub const fn new(every: u32) -> Self {
        RateLimiter {
            every,
            count: AtomicU32::new(0),
        }
    }

    /// Returns `true` on roughly 1 out of every `every` calls.
    pub fn allow(&self) -> bool {
        let prev = self.count.fetch_add(1, Ordering::Relaxed);
        prev % self.every == 0
    }
}
