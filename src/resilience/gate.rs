//! Bounded-Concurrency Gate (C5).
//!
//! A counting semaphore scoped around the HTTP attempt so a failed or
//! cancelled attempt still releases its slot. `maxConcurrent = None`
//! means unbounded: `acquire` returns a permit that does nothing.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// A held concurrency slot. Releases automatically on drop.
pub enum GatePermit {
    Bounded(OwnedSemaphorePermit),
    Unbounded,
}

/// Counting semaphore with capacity `max_concurrent`, or no gating at all
/// when `max_concurrent` is `None`.
pub struct ConcurrencyGate {
    semaphore: Option<Arc<Semaphore>>,
}

impl ConcurrencyGate {
    pub fn new(max_concurrent: Option<usize>) -> Self {
        Self { semaphore: max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1)))) }
    }

    /// Block until a slot is free, or return `None` if `cancellation`
    /// fires first.
    pub async fn acquire(&self, cancellation: &CancellationToken) -> Option<GatePermit> {
        match &self.semaphore {
            None => Some(GatePermit::Unbounded),
            Some(sem) => {
                let sem = sem.clone();
                tokio::select! {
                    permit = sem.acquire_owned() => {
                        Some(GatePermit::Bounded(permit.expect("semaphore never closed")))
                    }
                    _ = cancellation.cancelled() => None,
                }
            }
        }
    }

    pub fn available_permits(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unbounded_gate_never_blocks() {
        let gate = ConcurrencyGate::new(None);
        let token = CancellationToken::new();
        assert!(gate.acquire(&token).await.is_some());
        assert!(gate.acquire(&token).await.is_some());
    }

    #[tokio::test]
    async fn bounded_gate_enforces_capacity() {
        let gate = ConcurrencyGate::new(Some(1));
        let token = CancellationToken::new();

        let first = gate.acquire(&token).await.unwrap();
        assert_eq!(gate.available_permits(), Some(0));

        drop(first);
        assert_eq!(gate.available_permits(), Some(1));

        let _second = gate.acquire(&token).await.unwrap();
        assert_eq!(gate.available_permits(), Some(0));
    }

    #[tokio::test]
    async fn cancellation_while_waiting_returns_none() {
        let gate = ConcurrencyGate::new(Some(1));
        let token = CancellationToken::new();
        let _held = gate.acquire(&token).await.unwrap();

        token.cancel();
        let result = gate.acquire(&token).await;
        assert!(result.is_none());
    }
}
