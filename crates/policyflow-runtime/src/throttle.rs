//! Global request throttle.
//!
//! Token bucket with capacity equal to the requests-per-minute limit.
//! Tokens refill continuously at `capacity / 60` per second and never exceed
//! the capacity. The bucket lock is never held across a sleep.

use std::num::NonZeroU32;

use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter shared by every LLM call.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: Option<NonZeroU32>,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute`.
    ///
    /// `None` is unlimited. A limit of zero can never refill, so it is
    /// treated as unlimited too and logged at warn.
    pub fn new(requests_per_minute: Option<u32>) -> Self {
        let capacity = requests_per_minute.and_then(NonZeroU32::new);
        if requests_per_minute == Some(0) {
            tracing::warn!("Rate limit of 0 requests per minute, throttling disabled");
        }

        Self {
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity.map_or(0.0, |c| f64::from(c.get())),
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn capacity(&self) -> Option<u32> {
        self.capacity.map(NonZeroU32::get)
    }

    /// Take a token, sleeping until one is available.
    ///
    /// A caller that had to wait leaves the bucket empty at wake time.
    pub async fn wait_if_needed(&self) {
        let Some(capacity) = self.capacity else {
            return;
        };
        let capacity = f64::from(capacity.get());
        let refill_rate = capacity / 60.0;

        let wait = {
            let mut bucket = self.bucket.lock();
            let now = Instant::now();
            let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
            bucket.tokens = (bucket.tokens + elapsed * refill_rate).min(capacity);
            bucket.last_refill = now;

            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                return;
            }

            Duration::from_secs_f64((1.0 - bucket.tokens) / refill_rate)
        };

        tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
        tokio::time::sleep(wait).await;

        let mut bucket = self.bucket.lock();
        bucket.tokens = 0.0;
        bucket.last_refill = Instant::now();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
