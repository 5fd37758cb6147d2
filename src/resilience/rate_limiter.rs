//! Dual token-bucket Rate Limiter (C4).
//!
//! Two buckets — requests/minute and tokens/minute — refill continuously
//! on every admission attempt under a single short critical section. The
//! limiter does not guarantee FIFO across waiters; over-admission is
//! prevented by re-checking both buckets under lock after every sleep.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::clock::{sleep, SleepOutcome};

/// Tunables for a [`RateLimiter`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub llm_tokens_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_minute: 60, llm_tokens_per_minute: 60_000 }
    }
}

struct Buckets {
    requests_available: f64,
    tokens_available: f64,
    last_refill: Instant,
}

/// Outcome of [`RateLimiter::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Admitted,
    Cancelled,
    /// `estimatedTokens > Tmax`: this request can never fit, ever.
    Impossible,
}

/// Dual token-bucket admission control, shared across every caller of a
/// `Runtime`.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<Buckets>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let now = Instant::now();
        Self {
            buckets: Mutex::new(Buckets {
                requests_available: config.requests_per_minute as f64,
                tokens_available: config.llm_tokens_per_minute as f64,
                last_refill: now,
            }),
            config,
        }
    }

    fn request_rate_per_sec(&self) -> f64 {
        self.config.requests_per_minute as f64 / 60.0
    }

    fn token_rate_per_sec(&self) -> f64 {
        self.config.llm_tokens_per_minute as f64 / 60.0
    }

    fn refill_locked(&self, buckets: &mut Buckets, now: Instant) {
        let elapsed = now.saturating_duration_since(buckets.last_refill).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        buckets.requests_available = (buckets.requests_available + elapsed * self.request_rate_per_sec())
            .min(self.config.requests_per_minute as f64);
        buckets.tokens_available = (buckets.tokens_available + elapsed * self.token_rate_per_sec())
            .min(self.config.llm_tokens_per_minute as f64);
        buckets.last_refill = now;
    }

    /// Admit one request worth `estimated_tokens`, blocking (with
    /// cancellable sleeps) until both buckets can afford it.
    pub async fn acquire(&self, estimated_tokens: u32, cancellation: &CancellationToken) -> AcquireOutcome {
        if estimated_tokens as f64 > self.config.llm_tokens_per_minute as f64 {
            return AcquireOutcome::Impossible;
        }

        loop {
            let wait = {
                let mut buckets = self.buckets.lock();
                let now = Instant::now();
                self.refill_locked(&mut buckets, now);

                if buckets.requests_available >= 1.0 && buckets.tokens_available >= estimated_tokens as f64 {
                    buckets.requests_available -= 1.0;
                    buckets.tokens_available -= estimated_tokens as f64;
                    return AcquireOutcome::Admitted;
                }

                let wait_req = ((1.0 - buckets.requests_available).max(0.0)) / self.request_rate_per_sec();
                let wait_tok = ((estimated_tokens as f64 - buckets.tokens_available).max(0.0))
                    / self.token_rate_per_sec();
                wait_req.max(wait_tok).max(0.0)
            };

            if sleep(Duration::from_secs_f64(wait), cancellation).await == SleepOutcome::Cancelled {
                return AcquireOutcome::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_immediately_within_capacity() {
        let limiter = RateLimiter::new(RateLimitConfig { requests_per_minute: 60, llm_tokens_per_minute: 1000 });
        let token = CancellationToken::new();
        let outcome = limiter.acquire(10, &token).await;
        assert_eq!(outcome, AcquireOutcome::Admitted);
    }

    #[tokio::test]
    async fn impossible_when_estimate_exceeds_capacity() {
        let limiter = RateLimiter::new(RateLimitConfig { requests_per_minute: 60, llm_tokens_per_minute: 100 });
        let token = CancellationToken::new();
        let outcome = limiter.acquire(101, &token).await;
        assert_eq!(outcome, AcquireOutcome::Impossible);
    }

    #[tokio::test]
    async fn exhausting_request_bucket_forces_a_wait() {
        let limiter = RateLimiter::new(RateLimitConfig { requests_per_minute: 60, llm_tokens_per_minute: 100_000 });
        let token = CancellationToken::new();

        // Drain to zero requests available.
        for _ in 0..60 {
            assert_eq!(limiter.acquire(1, &token).await, AcquireOutcome::Admitted);
        }

        let buckets = limiter.buckets.lock();
        assert!(buckets.requests_available < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_wait_returns_cancelled() {
        let limiter = RateLimiter::new(RateLimitConfig { requests_per_minute: 1, llm_tokens_per_minute: 100_000 });
        let token = CancellationToken::new();

        assert_eq!(limiter.acquire(1, &token).await, AcquireOutcome::Admitted);

        let token2 = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token2.cancel();
        });

        let outcome = limiter.acquire(1, &token).await;
        assert_eq!(outcome, AcquireOutcome::Cancelled);
    }
}
