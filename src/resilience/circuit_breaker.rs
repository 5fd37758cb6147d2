//! Circuit Breaker (C6): per-endpoint failure counter with cooldown.
//!
//! Keyed by a stable endpoint identifier, typically `provider|model`.
//! Each endpoint gets its own independent state machine so a failing
//! model on one provider doesn't trip calls to an unrelated endpoint.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Tunables for a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    #[serde(with = "humantime_serde")]
    pub cooldown_period: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, cooldown_period: Duration::from_secs(30) }
    }
}

/// State of a single endpoint's circuit.
#[derive(Debug, Clone, Copy)]
enum CircuitState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    /// `probe_in_flight` serializes the half-open state: at most one
    /// caller may be mid-probe at a time, per SPEC_FULL.md §9.
    HalfOpen { probe_in_flight: bool },
}

/// Externally observable breaker state, for diagnostics/tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

/// Result of [`CircuitBreaker::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerDecision {
    /// Proceed with the call.
    Proceed,
    /// Reject immediately with `CircuitOpen`; no HTTP attempt.
    Reject,
}

/// Per-endpoint-key circuit breaker registry.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    states: RwLock<HashMap<String, CircuitState>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, states: RwLock::new(HashMap::new()) }
    }

    /// Check whether a call to `endpoint_key` may proceed. Transitions
    /// Open -> HalfOpen when the cooldown has elapsed, and claims the
    /// single half-open probe slot if one is available.
    pub fn check(&self, endpoint_key: &str) -> BreakerDecision {
        let mut states = self.states.write();
        match states.get(endpoint_key).copied() {
            None | Some(CircuitState::Closed { .. }) => BreakerDecision::Proceed,
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.cooldown_period {
                    states.insert(endpoint_key.to_string(), CircuitState::HalfOpen { probe_in_flight: true });
                    tracing::info!(endpoint = endpoint_key, "circuit half-open, admitting probe");
                    BreakerDecision::Proceed
                } else {
                    BreakerDecision::Reject
                }
            }
            Some(CircuitState::HalfOpen { probe_in_flight }) => {
                if probe_in_flight {
                    // A probe is already outstanding; treat this caller as
                    // if the circuit were still open rather than queuing
                    // them behind an outcome they cannot influence.
                    BreakerDecision::Reject
                } else {
                    states.insert(endpoint_key.to_string(), CircuitState::HalfOpen { probe_in_flight: true });
                    BreakerDecision::Proceed
                }
            }
        }
    }

    /// Record a successful call against `endpoint_key`.
    pub fn record_success(&self, endpoint_key: &str) {
        let mut states = self.states.write();
        match states.get(endpoint_key).copied() {
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(endpoint_key.to_string(), CircuitState::Closed { consecutive_failures: 0 });
                tracing::info!(endpoint = endpoint_key, "circuit closed after successful probe");
            }
            _ => {
                states.insert(endpoint_key.to_string(), CircuitState::Closed { consecutive_failures: 0 });
            }
        }
    }

    /// Record a breaker-relevant failure (only `Transient` failures count,
    /// per the retry executor's classification).
    pub fn record_failure(&self, endpoint_key: &str) {
        let mut states = self.states.write();
        match states.get(endpoint_key).copied() {
            Some(CircuitState::Closed { consecutive_failures }) => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    states.insert(endpoint_key.to_string(), CircuitState::Open { opened_at: Instant::now() });
                    tracing::warn!(endpoint = endpoint_key, failures, "circuit opened");
                } else {
                    states.insert(endpoint_key.to_string(), CircuitState::Closed { consecutive_failures: failures });
                }
            }
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(endpoint_key.to_string(), CircuitState::Open { opened_at: Instant::now() });
                tracing::warn!(endpoint = endpoint_key, "circuit reopened after failed probe");
            }
            None => {
                states.insert(endpoint_key.to_string(), CircuitState::Closed { consecutive_failures: 1 });
            }
            Some(CircuitState::Open { .. }) => {}
        }
    }

    pub fn status(&self, endpoint_key: &str) -> BreakerStatus {
        match self.states.read().get(endpoint_key) {
            None | Some(CircuitState::Closed { .. }) => BreakerStatus::Closed,
            Some(CircuitState::Open { .. }) => BreakerStatus::Open,
            Some(CircuitState::HalfOpen { .. }) => BreakerStatus::HalfOpen,
        }
    }

    /// Non-mutating cooldown-aware pre-check: true only while the endpoint
    /// is `Open` *and* `cooldown_period` hasn't elapsed yet. Unlike
    /// `status`, this returns `false` once cooldown has passed even though
    /// the stored state is still `Open` — the Open -> HalfOpen transition
    /// itself stays the sole responsibility of `check`, since that's the
    /// only call site serializing the half-open probe slot. A caller that
    /// short-circuits on this returning `true` never steals that slot, and
    /// once cooldown elapses this starts returning `false`, letting the
    /// call reach `check` and perform the probe transition.
    pub fn is_open_within_cooldown(&self, endpoint_key: &str) -> bool {
        match self.states.read().get(endpoint_key) {
            Some(CircuitState::Open { opened_at }) => opened_at.elapsed() < self.config.cooldown_period,
            _ => false,
        }
    }

    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
