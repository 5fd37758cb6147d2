//! Property tests for the two pieces of the runtime with laws simple
//! enough to state generically rather than as a handful of examples:
//! provider-name normalization and rate-limiter admission.

use llm_resilience_runtime::registry::normalize_provider_name;
use llm_resilience_runtime::resilience::{AcquireOutcome, RateLimitConfig, RateLimiter};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

proptest! {
    /// Normalizing is idempotent: running it twice is the same as once.
    #[test]
    fn normalize_provider_name_is_idempotent(name in "\\PC{0,40}") {
        let once = normalize_provider_name(&name);
        let twice = normalize_provider_name(&once);
        prop_assert_eq!(once, twice);
    }

    /// Normalizing never produces uppercase ASCII or leading/trailing
    /// whitespace, regardless of what went in.
    #[test]
    fn normalize_provider_name_has_no_uppercase_ascii_or_outer_whitespace(name in "\\PC{0,40}") {
        let normalized = normalize_provider_name(&name);
        prop_assert!(!normalized.chars().any(|c| c.is_ascii_uppercase()));
        prop_assert_eq!(normalized.trim(), normalized.as_str());
    }

    /// A single `acquire` call never admits a request whose estimated
    /// token count exceeds the configured tokens-per-minute capacity; it
    /// is always classified `Impossible` instead, regardless of capacity
    /// or estimate magnitude.
    #[test]
    fn acquire_never_admits_more_tokens_than_capacity_allows(
        tokens_per_minute in 1u32..100_000,
        estimated_tokens in 0u32..200_000,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let outcome = runtime.block_on(async {
            let limiter = RateLimiter::new(RateLimitConfig {
                requests_per_minute: 1_000_000,
                llm_tokens_per_minute: tokens_per_minute,
            });
            let token = CancellationToken::new();
            limiter.acquire(estimated_tokens, &token).await
        });

        if estimated_tokens > tokens_per_minute {
            prop_assert_eq!(outcome, AcquireOutcome::Impossible);
        } else {
            prop_assert_eq!(outcome, AcquireOutcome::Admitted);
        }
    }
}
