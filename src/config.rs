//! Runtime configuration (§6, §10.3): the tunables a [`crate::orchestrator::Runtime`]
//! is built with, plus a builder for assembling them programmatically.
//!
//! Durations are `std::time::Duration` in code; at a config-file boundary
//! they round-trip through human-readable strings like `"30s"` or `"2m"`
//! via `humantime_serde`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::{CircuitBreakerConfig, RateLimitConfig, RetryConfig};

/// Top-level runtime tunables. `Default` matches every default named in
/// the resilience components exactly: 3 retries, factor 2, 1s initial
/// backoff, failure threshold 5, 30s cooldown, no concurrency cap, no
/// rate limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Provider selected when a call doesn't name one explicitly.
    pub default_provider: String,
    pub rate_limit: Option<RateLimitConfig>,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub max_concurrent: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".into(),
            rate_limit: None,
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            max_concurrent: None,
        }
    }
}

/// Builder for [`RuntimeConfig`], in the style of the provider partial
/// configs: every setter is optional and falls back to the default.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    default_provider: Option<String>,
    rate_limit: Option<RateLimitConfig>,
    circuit_breaker: Option<CircuitBreakerConfig>,
    retry: Option<RetryConfig>,
    max_concurrent: Option<usize>,
}

impl RuntimeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = Some(provider.into());
        self
    }

    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = Some(config);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    pub fn max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = Some(limit);
        self
    }

    pub fn build(self) -> RuntimeConfig {
        let defaults = RuntimeConfig::default();
        RuntimeConfig {
            default_provider: self.default_provider.unwrap_or(defaults.default_provider),
            rate_limit: self.rate_limit.or(defaults.rate_limit),
            circuit_breaker: self.circuit_breaker.unwrap_or(defaults.circuit_breaker),
            retry: self.retry.unwrap_or(defaults.retry),
            max_concurrent: self.max_concurrent.or(defaults.max_concurrent),
        }
    }
}

/// Per-call overrides layered over [`RuntimeConfig`] (§4.8 `options`).
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub ai_service: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub response_format_json: bool,
    pub tools: Option<serde_json::Value>,
    pub tool_choice: Option<serde_json::Value>,
    pub rate_limit_config: Option<RateLimitConfig>,
    pub circuit_breaker_config: Option<CircuitBreakerConfig>,
    pub retries: Option<u32>,
    pub backoff_factor: Option<f64>,
    pub timeout: Option<Duration>,
    pub max_concurrent: Option<usize>,
}
