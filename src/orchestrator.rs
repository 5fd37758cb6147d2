//! Chat Orchestrator (C8): the single public entry point, composing the
//! provider registry, token estimator, rate limiter, concurrency gate,
//! circuit breaker, retry executor, and HTTP transport per call.
//!
//! Mirrors the check -> resource-acquire -> attempt -> release shape of a
//! runtime orchestrator composing independent resilience primitives around
//! one piece of real work, generalized from a single domain object to any
//! configured provider dialect.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::{ChatOptions, RuntimeConfig};
use crate::error::{Result, RuntimeError};
use crate::jsonpath::JsonPath;
use crate::message::{Message, Role};
use crate::registry::config::MessageFormat;
use crate::registry::{AuthHeaders, ProviderConfig, ProviderRegistry};
use crate::resilience::{CircuitBreaker, ConcurrencyGate, RateLimiter, RetryConfig, RetryExecutor};
use crate::tokens::{HeuristicEstimator, TokenEstimator};
use crate::transport::{self, TransportError};

/// The runtime: owns the long-lived shared state (registry, breaker,
/// default limiter/gate) and exposes [`Runtime::chat`] as its sole public
/// operation.
pub struct Runtime {
    config: RuntimeConfig,
    registry: Arc<ProviderRegistry>,
    breaker: CircuitBreaker,
    default_limiter: Option<RateLimiter>,
    default_gate: ConcurrencyGate,
    client: Client,
    estimator: Arc<dyn TokenEstimator>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> reqwest::Result<Self> {
        Ok(Self {
            default_limiter: config.rate_limit.map(RateLimiter::new),
            default_gate: ConcurrencyGate::new(config.max_concurrent),
            breaker: CircuitBreaker::new(config.circuit_breaker),
            registry: Arc::new(ProviderRegistry::new()),
            client: transport::build_client()?,
            estimator: Arc::new(HeuristicEstimator),
            config,
        })
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Run a chat completion against `history`, returning the assistant's
    /// text content.
    pub async fn chat(&self, history: &[Message], options: ChatOptions, cancellation: &CancellationToken) -> Result<String> {
        if history.is_empty() {
            return Err(RuntimeError::BadRequest {
                provider: options.ai_service.clone().unwrap_or_else(|| self.config.default_provider.clone()),
                model: options.model.clone().unwrap_or_default(),
                attempt: 0,
                status: None,
                message: "history must contain at least one message".into(),
            });
        }

        let provider_name = options.ai_service.clone().unwrap_or_else(|| self.config.default_provider.clone());

        let provider_config = self.registry.get(&provider_name).ok_or_else(|| RuntimeError::BadRequest {
            provider: provider_name.clone(),
            model: String::new(),
            attempt: 0,
            status: None,
            message: format!("unknown provider `{provider_name}`"),
        })?;

        if provider_config.chat_api_url.is_empty() {
            return Err(RuntimeError::BadRequest {
                provider: provider_name.clone(),
                model: String::new(),
                attempt: 0,
                status: None,
                message: "provider has no chat_api_url configured".into(),
            });
        }

        let model = options.model.clone().unwrap_or_else(|| provider_config.default_model.clone());
        let endpoint_key = format!("{provider_name}|{model}");

        // An explicit per-call override gets its own breaker, scoped to
        // this call, rather than retuning the shared per-endpoint state
        // every other caller of the same endpoint also relies on.
        let local_breaker = options.circuit_breaker_config.map(CircuitBreaker::new);
        let breaker = local_breaker.as_ref().unwrap_or(&self.breaker);

        // Breaker check ahead of the rate limiter / gate: a non-mutating,
        // cooldown-aware peek, so it doesn't claim the half-open probe slot
        // the retry executor's authoritative check (just before HTTP) is
        // responsible for. Cooldown-aware matters: once cooldown has
        // elapsed this returns false even though the stored state is still
        // `Open`, so the call falls through to the retry executor's
        // `check`, which is the only place that performs Open -> HalfOpen.
        // A plain `status() == Open` would reject forever, since nothing
        // else ever reaches `check` to make that transition happen.
        if breaker.is_open_within_cooldown(&endpoint_key) {
            return Err(RuntimeError::CircuitOpen { provider: provider_name, model, attempt: 0 });
        }

        let body = build_request_body(&provider_config, history, &model, &options)?;

        let estimated_tokens = self.estimator.estimate(history);
        let limiter = options.rate_limit_config.map(RateLimiter::new);
        let effective_limiter = limiter.as_ref().or(self.default_limiter.as_ref());
        if let Some(limiter) = effective_limiter {
            match limiter.acquire(estimated_tokens, cancellation).await {
                crate::resilience::AcquireOutcome::Admitted => {}
                crate::resilience::AcquireOutcome::Cancelled => {
                    return Err(RuntimeError::Cancelled { provider: provider_name, model, attempt: 0 });
                }
                crate::resilience::AcquireOutcome::Impossible => {
                    return Err(RuntimeError::RateLimitImpossible { provider: provider_name, model, attempt: 0, estimated_tokens });
                }
            }
        }

        let gate = options.max_concurrent.map(|n| ConcurrencyGate::new(Some(n)));
        let effective_gate = gate.as_ref().unwrap_or(&self.default_gate);
        let Some(_permit) = effective_gate.acquire(cancellation).await else {
            return Err(RuntimeError::Cancelled { provider: provider_name, model, attempt: 0 });
        };

        let retry_config = RetryConfig {
            retries: options.retries.unwrap_or(self.config.retry.retries),
            backoff_factor: options.backoff_factor.unwrap_or(self.config.retry.backoff_factor),
            initial_backoff: self.config.retry.initial_backoff,
            max_backoff: self.config.retry.max_backoff,
            attempt_timeout: options.timeout.unwrap_or(self.config.retry.attempt_timeout),
        };
        let executor = RetryExecutor::new(retry_config, breaker, endpoint_key.clone());

        let url = self.registry.build_api_url(&provider_name, &provider_config.chat_api_url, options.api_key.as_deref());
        let auth = self.registry.build_auth_headers(&provider_name, options.api_key.as_deref());

        let provider_name_ref = &provider_name;
        let model_ref = &model;
        let body_ref = &body;
        let url_ref = &url;
        let auth_ref = &auth;
        let provider_config_ref = &provider_config;
        let timeout = retry_config.attempt_timeout;
        let client = &self.client;

        executor
            .run(
                cancellation,
                |attempt| RuntimeError::CircuitOpen { provider: provider_name_ref.clone(), model: model_ref.clone(), attempt },
                |attempt| RuntimeError::Transient {
                    provider: provider_name_ref.clone(),
                    model: model_ref.clone(),
                    attempt,
                    status: None,
                    cause: None,
                },
                |attempt| async move {
                    attempt_once(client, url_ref, auth_ref, body_ref, timeout, provider_name_ref, model_ref, attempt, provider_config_ref)
                        .await
                },
            )
            .await
    }
}

async fn attempt_once(
    client: &Client,
    url: &str,
    auth: &AuthHeaders,
    body: &Value,
    timeout: Duration,
    provider: &str,
    model: &str,
    attempt: u32,
    provider_config: &ProviderConfig,
) -> Result<String> {
    let mut headers: Vec<(String, String)> = auth.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    headers.push(("Content-Type".to_string(), "application/json".to_string()));

    let response = match transport::post_json(client, url, &headers, body, timeout).await {
        Ok(response) => response,
        Err(TransportError::Timeout(_)) => {
            return Err(RuntimeError::Transient { provider: provider.into(), model: model.into(), attempt, status: None, cause: None });
        }
        Err(err) => {
            return Err(RuntimeError::Transient {
                provider: provider.into(),
                model: model.into(),
                attempt,
                status: None,
                cause: Some(Box::new(err)),
            });
        }
    };

    classify_response(response, provider, model, attempt, provider_config)
}

fn classify_response(
    response: transport::TransportResponse,
    provider: &str,
    model: &str,
    attempt: u32,
    provider_config: &ProviderConfig,
) -> Result<String> {
    let transport::TransportResponse { status, body, retry_after } = response;

    if (200..300).contains(&status) {
        let Ok(path) = JsonPath::parse(&provider_config.chat_config.response_parse_path) else {
            return Err(RuntimeError::Transient { provider: provider.into(), model: model.into(), attempt, status: Some(status), cause: None });
        };
        return match path.get_str(&body) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(RuntimeError::Transient { provider: provider.into(), model: model.into(), attempt, status: Some(status), cause: None }),
        };
    }

    let provider = provider.to_string();
    let model = model.to_string();

    match status {
        429 => Err(RuntimeError::RateLimited { provider, model, attempt, retry_after }),
        500..=504 => Err(RuntimeError::Transient { provider, model, attempt, status: Some(status), cause: None }),
        401 | 403 => Err(RuntimeError::Auth { provider, model, attempt, status: Some(status) }),
        400 | 404 | 422 => Err(RuntimeError::BadRequest { provider, model, attempt, status: Some(status), message: error_message(&body) }),
        _ => Err(RuntimeError::Upstream { provider, model, attempt, status: Some(status), message: error_message(&body) }),
    }
}

fn error_message(body: &Value) -> String {
    body.get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(Value::as_str)
        .unwrap_or("no error detail in response body")
        .to_string()
}

fn build_request_body(config: &ProviderConfig, history: &[Message], model: &str, options: &ChatOptions) -> Result<Value> {
    match config.chat_config.message_format {
        MessageFormat::Openai => Ok(build_openai_body(history, model, options)),
        MessageFormat::Anthropic => Ok(build_anthropic_body(history, model, options)),
        MessageFormat::OllamaGenerate => Ok(build_ollama_body(history, model)),
    }
}

fn build_openai_body(history: &[Message], model: &str, options: &ChatOptions) -> Value {
    let messages: Vec<Value> = history.iter().map(message_to_json).collect();
    let mut body = json!({ "model": model, "messages": messages });
    let obj = body.as_object_mut().expect("object literal");
    if let Some(max_tokens) = options.max_tokens {
        obj.insert("max_tokens".into(), json!(max_tokens));
    }
    if let Some(temperature) = options.temperature {
        obj.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = options.top_p {
        obj.insert("top_p".into(), json!(top_p));
    }
    if options.response_format_json {
        obj.insert("response_format".into(), json!({"type": "json_object"}));
    }
    if let Some(tools) = &options.tools {
        obj.insert("tools".into(), tools.clone());
    }
    if let Some(tool_choice) = &options.tool_choice {
        obj.insert("tool_choice".into(), tool_choice.clone());
    }
    body
}

fn build_anthropic_body(history: &[Message], model: &str, options: &ChatOptions) -> Value {
    let system = history.iter().find(|m| m.role == Role::System).map(|m| m.content.clone());
    let messages: Vec<Value> = history.iter().filter(|m| m.role != Role::System).map(message_to_json).collect();

    let mut body = json!({
        "model": model,
        "messages": messages,
        "max_tokens": options.max_tokens.unwrap_or(1024),
    });
    let obj = body.as_object_mut().expect("object literal");
    if let Some(system) = system {
        obj.insert("system".into(), json!(system));
    }
    if let Some(temperature) = options.temperature {
        obj.insert("temperature".into(), json!(temperature));
    }
    if let Some(top_p) = options.top_p {
        obj.insert("top_p".into(), json!(top_p));
    }
    if let Some(tools) = &options.tools {
        obj.insert("tools".into(), translate_tools_to_anthropic(tools));
    }
    body
}

/// Rewrites an OpenAI-style tool schema's `parameters` field to
/// Anthropic's `input_schema`. Passes unrecognized shapes through
/// unchanged rather than failing the call over a cosmetic mismatch.
fn translate_tools_to_anthropic(tools: &Value) -> Value {
    let Some(array) = tools.as_array() else { return tools.clone() };
    Value::Array(
        array
            .iter()
            .map(|tool| {
                let mut tool = tool.clone();
                if let Some(obj) = tool.as_object_mut() {
                    if let Some(parameters) = obj.remove("parameters") {
                        obj.insert("input_schema".into(), parameters);
                    }
                }
                tool
            })
            .collect(),
    )
}

fn build_ollama_body(history: &[Message], model: &str) -> Value {
    let prompt = flatten_conversation(history);
    json!({ "model": model, "prompt": prompt, "stream": false })
}

fn flatten_conversation(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn message_to_json(message: &Message) -> Value {
    let mut obj = json!({ "role": message.role.as_str(), "content": message.content });
    let map = obj.as_object_mut().expect("object literal");
    if let Some(name) = &message.name {
        map.insert("name".into(), json!(name));
    }
    if let Some(tool_call_id) = &message.tool_call_id {
        map.insert("tool_call_id".into(), json!(tool_call_id));
    }
    obj
}
