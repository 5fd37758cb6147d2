//! The closed error taxonomy shared by every layer of the runtime.
//!
//! HTTP transport failures and JSON parsing failures are folded into a
//! [`RuntimeError`] as soon as they are classified; nothing below the
//! retry executor leaks a `reqwest::Error` or a `serde_json::Error`.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Stable, `match`-able classification of a [`RuntimeError`].
///
/// Mirrors the seven-kind taxonomy plus the boundary case raised when a
/// request can never fit inside the configured token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Cancelled,
    RateLimited,
    RateLimitImpossible,
    Transient,
    Auth,
    BadRequest,
    CircuitOpen,
    Upstream,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::RateLimitImpossible => "rate_limit_impossible",
            ErrorKind::Transient => "transient",
            ErrorKind::Auth => "auth",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Config => "config",
        };
        write!(f, "{s}")
    }
}

/// Everything the caller of `Runtime::chat` can fail with.
///
/// Every variant carries enough context (`provider`, `model`, `attempt`)
/// to build a useful message without the caller needing to chase a
/// `source()` chain.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("[{provider}/{model}] cancelled on attempt {attempt}")]
    Cancelled { provider: String, model: String, attempt: u32 },

    #[error("[{provider}/{model}] rate limited (attempt {attempt}){}", retry_after_suffix(*retry_after))]
    RateLimited {
        provider: String,
        model: String,
        attempt: u32,
        retry_after: Option<Duration>,
    },

    #[error("[{provider}/{model}] estimated {estimated_tokens} tokens exceed the configured tokens-per-minute capacity")]
    RateLimitImpossible { provider: String, model: String, attempt: u32, estimated_tokens: u32 },

    #[error("[{provider}/{model}] transient failure on attempt {attempt}{}", status_suffix(*status))]
    Transient {
        provider: String,
        model: String,
        attempt: u32,
        status: Option<u16>,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[{provider}/{model}] authentication failed{}", status_suffix(*status))]
    Auth {
        provider: String,
        model: String,
        attempt: u32,
        status: Option<u16>,
    },

    #[error("[{provider}/{model}] bad request{}: {message}", status_suffix(*status))]
    BadRequest {
        provider: String,
        model: String,
        attempt: u32,
        status: Option<u16>,
        message: String,
    },

    #[error("[{provider}/{model}] circuit open, rejecting without attempting HTTP")]
    CircuitOpen { provider: String, model: String, attempt: u32 },

    #[error("[{provider}/{model}] upstream error{}: {message}", status_suffix(*status))]
    Upstream {
        provider: String,
        model: String,
        attempt: u32,
        status: Option<u16>,
        message: String,
    },

    #[error("[{provider}/{model}] configuration error: {message}")]
    Config { provider: String, model: String, message: String },
}

fn retry_after_suffix(retry_after: Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {d:?}"),
        None => String::new(),
    }
}

fn status_suffix(status: Option<u16>) -> String {
    match status {
        Some(s) => format!(" (status {s})"),
        None => String::new(),
    }
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Cancelled { .. } => ErrorKind::Cancelled,
            RuntimeError::RateLimited { .. } => ErrorKind::RateLimited,
            RuntimeError::RateLimitImpossible { .. } => ErrorKind::RateLimitImpossible,
            RuntimeError::Transient { .. } => ErrorKind::Transient,
            RuntimeError::Auth { .. } => ErrorKind::Auth,
            RuntimeError::BadRequest { .. } => ErrorKind::BadRequest,
            RuntimeError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            RuntimeError::Upstream { .. } => ErrorKind::Upstream,
            RuntimeError::Config { .. } => ErrorKind::Config,
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            RuntimeError::Cancelled { provider, .. }
            | RuntimeError::RateLimited { provider, .. }
            | RuntimeError::RateLimitImpossible { provider, .. }
            | RuntimeError::Transient { provider, .. }
            | RuntimeError::Auth { provider, .. }
            | RuntimeError::BadRequest { provider, .. }
            | RuntimeError::CircuitOpen { provider, .. }
            | RuntimeError::Upstream { provider, .. }
            | RuntimeError::Config { provider, .. } => provider,
        }
    }

    pub fn attempt(&self) -> u32 {
        match self {
            RuntimeError::Cancelled { attempt, .. }
            | RuntimeError::RateLimited { attempt, .. }
            | RuntimeError::RateLimitImpossible { attempt, .. }
            | RuntimeError::Transient { attempt, .. }
            | RuntimeError::Auth { attempt, .. }
            | RuntimeError::BadRequest { attempt, .. }
            | RuntimeError::CircuitOpen { attempt, .. }
            | RuntimeError::Upstream { attempt, .. } => *attempt,
            RuntimeError::Config { .. } => 0,
        }
    }

    /// Whether the retry executor should attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RuntimeError::RateLimited { .. } | RuntimeError::Transient { .. })
    }

    /// Whether this failure should count against the circuit breaker.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(self, RuntimeError::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RuntimeError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
