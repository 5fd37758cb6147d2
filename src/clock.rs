//! Monotonic time and cancellable sleep (C1).
//!
//! Every suspension point in the runtime (rate-limiter wait, concurrency
//! gate wait, retry backoff) goes through [`sleep`] so that cancellation
//! is honored uniformly instead of being reimplemented at each call site.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Outcome of a cancellable sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    Completed,
    Cancelled,
}

/// Monotonic millisecond timestamp, suitable for measuring elapsed time.
///
/// Backed by [`std::time::Instant`]; not meaningful across process
/// restarts, which is fine since limiter/breaker state is in-process only.
pub fn now() -> std::time::Instant {
    std::time::Instant::now()
}

/// Sleep for `duration`, returning early with [`SleepOutcome::Cancelled`]
/// if `cancellation` fires first. Never busy-waits.
pub async fn sleep(duration: Duration, cancellation: &CancellationToken) -> SleepOutcome {
    if duration.is_zero() {
        if cancellation.is_cancelled() {
            return SleepOutcome::Cancelled;
        }
        return SleepOutcome::Completed;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => SleepOutcome::Completed,
        _ = cancellation.cancelled() => SleepOutcome::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancellation() {
        let token = CancellationToken::new();
        let outcome = sleep(Duration::from_millis(50), &token).await;
        assert_eq!(outcome, SleepOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_returns_cancelled_promptly() {
        let token = CancellationToken::new();
        let token2 = token.clone();
        tokio::spawn(async move {
            token2.cancel();
        });
        let outcome = sleep(Duration::from_secs(3600), &token).await;
        assert_eq!(outcome, SleepOutcome::Cancelled);
    }

    #[tokio::test]
    async fn zero_duration_completes_immediately() {
        let token = CancellationToken::new();
        let outcome = sleep(Duration::ZERO, &token).await;
        assert_eq!(outcome, SleepOutcome::Completed);
    }
}
