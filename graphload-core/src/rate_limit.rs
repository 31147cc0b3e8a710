//! Token bucket admission gate for write attempts.
//!
//! Each partition owns one [`RateLimiter`]. A denied attempt is not retried:
//! the caller records it as a failed write, so sustained overload turns into
//! logged failures instead of an unbounded queue.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    capacity: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, rate: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Steady-rate limiter with a one second burst.
#[derive(Debug)]
pub struct RateLimiter {
    permits_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `permits_per_sec <= 0` (or NaN) yields a limiter that admits nothing.
    pub fn new(permits_per_sec: f64) -> Self {
        let rate = if permits_per_sec.is_finite() && permits_per_sec > 0.0 {
            permits_per_sec
        } else {
            0.0
        };
        let capacity = if rate > 0.0 { rate.max(1.0) } else { 0.0 };
        Self {
            permits_per_sec: rate,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn permits_per_sec(&self) -> f64 {
        self.permits_per_sec
    }

    /// Wait up to `timeout` for one permit.
    ///
    /// Returns `false` without waiting when the next permit cannot arrive
    /// before the timeout expires.
    pub async fn try_acquire(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                let now = Instant::now();
                bucket.refill(self.permits_per_sec, now);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return true;
                }
                if self.permits_per_sec == 0.0 {
                    return false;
                }
                // Compared in seconds: very low rates put the next permit
                // beyond what a Duration can hold.
                let wait_secs = (1.0 - bucket.tokens) / self.permits_per_sec;
                let remaining = deadline.saturating_duration_since(now).as_secs_f64();
                if wait_secs > remaining {
                    return false;
                }
                Duration::from_secs_f64(wait_secs)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_zero_rate_denies_everything() {
        let limiter = RateLimiter::new(0.0);
        for _ in 0..5 {
            assert!(!limiter.try_acquire(Duration::from_millis(50)).await);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_throttle() {
        let limiter = RateLimiter::new(10.0);
        for _ in 0..10 {
            assert!(limiter.try_acquire(Duration::ZERO).await);
        }
        // Bucket is empty; the next permit is 100ms away.
        assert!(!limiter.try_acquire(Duration::from_millis(50)).await);

        let start = Instant::now();
        assert!(limiter.try_acquire(Duration::from_millis(200)).await);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_over_time() {
        let limiter = RateLimiter::new(2.0);
        assert!(limiter.try_acquire(Duration::ZERO).await);
        assert!(limiter.try_acquire(Duration::ZERO).await);
        assert!(!limiter.try_acquire(Duration::ZERO).await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire(Duration::ZERO).await);
        assert!(limiter.try_acquire(Duration::ZERO).await);
        assert!(!limiter.try_acquire(Duration::ZERO).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_rate_denies_without_panicking() {
        let limiter = RateLimiter::new(1e-20);
        assert!(limiter.try_acquire(Duration::ZERO).await);
        assert!(!limiter.try_acquire(Duration::from_secs(5)).await);
        assert!(!limiter.try_acquire(Duration::from_secs(24 * 3600)).await);
    }

    #[test]
    fn test_invalid_rates_clamp_to_zero() {
        assert_eq!(RateLimiter::new(-3.0).permits_per_sec(), 0.0);
        assert_eq!(RateLimiter::new(f64::NAN).permits_per_sec(), 0.0);
    }
}
