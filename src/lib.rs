//! A resilient client-side runtime for calling LLM chat APIs.
//!
//! Composes four independent resilience mechanisms — a dual token-bucket
//! rate limiter, a bounded concurrency gate, a per-endpoint circuit
//! breaker, and a retry executor with exponential backoff — around a
//! pluggable, data-driven provider registry covering OpenAI, Anthropic,
//! Google, Ollama, and any OpenAI-compatible endpoint. [`orchestrator::Runtime::chat`]
//! is the single entry point; everything else is composed internally.

pub mod clock;
pub mod config;
pub mod error;
pub mod jsonpath;
pub mod message;
pub mod orchestrator;
pub mod registry;
pub mod resilience;
pub mod tokens;
pub mod transport;

pub use config::{ChatOptions, RuntimeConfig, RuntimeConfigBuilder};
pub use error::{ErrorKind, Result, RuntimeError};
pub use message::{Message, Role};
pub use orchestrator::Runtime;
pub use registry::{PartialProviderConfig, ProviderConfig, ProviderRegistry};
