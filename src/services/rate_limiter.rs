//! Rate Limiter - token bucket governor for provider and marketplace limits
//!
//! Each outbound provider gets its own bucket:
//! - Chain RPC (metadata): N requests per second, bursts allowed
//! - Marketplaces (orders): N orders per minute, spread uniformly
//!
//! A uniform quota is a bucket of capacity one, so admissions are spaced
//! `window / N` apart instead of arriving in a burst.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// How many operations are admitted per window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    /// Operations admitted per window
    pub per_window: u32,
    /// Refill window duration
    pub window: Duration,
    /// Largest burst admitted at once
    pub burst: u32,
}

impl Quota {
    pub fn new(per_window: u32, window: Duration) -> Self {
        let per_window = per_window.max(1);
        Self {
            per_window,
            window,
            burst: per_window,
        }
    }

    pub fn per_second(n: u32) -> Self {
        Self::new(n, Duration::from_secs(1))
    }

    pub fn per_minute(n: u32) -> Self {
        Self::new(n, Duration::from_secs(60))
    }

    /// Space admissions evenly across the window
    pub fn uniform(mut self) -> Self {
        self.burst = 1;
        self
    }
}

/// A single token bucket
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn new(quota: Quota) -> Self {
        let max = quota.burst as f64;
        let window_secs = quota.window.as_secs_f64().max(f64::EPSILON);
        Self {
            tokens: max,
            max_tokens: max,
            refill_rate: quota.per_window as f64 / window_secs,
            last_refill: Instant::now(),
        }
    }

    /// Refill tokens based on elapsed time
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// Try to consume one token. Returns true if successful.
    fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one token is available
    fn time_until_available(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let deficit = 1.0 - self.tokens;
            Duration::from_secs_f64(deficit / self.refill_rate)
        }
    }
}

/// Shared governor for one provider. Cloning shares the bucket.
#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    bucket: Arc<Mutex<TokenBucket>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, quota: Quota) -> Self {
        Self {
            name,
            bucket: Arc::new(Mutex::new(TokenBucket::new(quota))),
        }
    }

    /// Acquire a token, waiting if necessary.
    /// Returns true if we had to wait (i.e., were rate limited).
    pub async fn acquire(&self) -> bool {
        let mut waited = false;
        loop {
            let wait_time = {
                let mut b = self.bucket.lock().await;
                if b.try_acquire() {
                    return waited;
                }
                b.time_until_available()
            };

            waited = true;
            debug!("Rate limiter: waiting {:?} for {}", wait_time, self.name);
            tokio::time::sleep(wait_time).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_is_admitted_immediately() {
        let limiter = RateLimiter::new("test", Quota::per_second(3));
        assert!(!limiter.acquire().await);
        assert!(!limiter.acquire().await);
        assert!(!limiter.acquire().await);
        assert!(limiter.acquire().await);
    }

    #[tokio::test]
    async fn test_uniform_quota_spaces_admissions() {
        let limiter = RateLimiter::new("test", Quota::new(20, Duration::from_secs(1)).uniform());
        let start = Instant::now();
        assert!(!limiter.acquire().await);
        assert!(limiter.acquire().await);
        // One token every 50ms
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_clones_share_bucket() {
        let limiter = RateLimiter::new("test", Quota::new(20, Duration::from_secs(1)).uniform());
        let other = limiter.clone();
        assert!(!limiter.acquire().await);
        // The clone finds the single token already spent
        assert!(other.acquire().await);
    }

    #[test]
    fn test_zero_quota_is_clamped() {
        let quota = Quota::per_second(0);
        assert_eq!(quota.per_window, 1);
        assert_eq!(quota.uniform().burst, 1);
    }
}
