//! Provider Registry (C3): process-wide store of provider configuration,
//! API keys, and cached model catalogs.
//!
//! Kept data-driven rather than one Rust type per provider: a
//! [`ProviderConfig`] fully describes a dialect (URLs, auth shape, message
//! format, response parse path), and the orchestrator interprets that data
//! generically. Adding a fifth OpenAI-compatible endpoint is then a
//! `configure` call, not a new module.

pub mod cache;
pub mod config;
pub mod defaults;
pub mod secrets;

use std::collections::HashMap;

use parking_lot::RwLock;
use reqwest::Client;
use serde_json::Value;

pub use cache::{ModelCatalog, ModelInfo};
pub use config::{
    AuthConfig, AuthType, ChatConfig, MessageFormat, ParseConfig, PartialAuthConfig, PartialChatConfig,
    PartialParseConfig, PartialProviderConfig, ProviderConfig, ToolSchemaType,
};
pub use secrets::{resolve_api_key, ApiKeyStore};

use crate::jsonpath::JsonPath;

/// Lowercases and trims a provider name so lookups are forgiving of
/// incidental casing/whitespace differences at call sites.
pub fn normalize_provider_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Headers to attach to a chat or model-catalog request, already resolved
/// against the caller's explicit key, the `ApiKeyStore`, and environment
/// variables.
#[derive(Debug, Clone, Default)]
pub struct AuthHeaders {
    pub headers: HashMap<String, String>,
}

/// Process-wide provider configuration, secrets, and model-catalog cache.
pub struct ProviderRegistry {
    configs: RwLock<HashMap<String, ProviderConfig>>,
    secrets: ApiKeyStore,
    catalog: ModelCatalog,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        let mut configs = HashMap::new();
        for config in defaults::builtin_defaults() {
            configs.insert(config.name.clone(), config);
        }
        Self { configs: RwLock::new(configs), secrets: ApiKeyStore::new(), catalog: ModelCatalog::new() }
    }

    /// Merge `partial` over the named provider's existing config (falling
    /// back to an empty shell with the given name if it doesn't exist yet).
    /// An `api_key` on the partial is stripped and routed to the
    /// [`ApiKeyStore`] rather than stored in the returned config.
    /// Invalidates the model cache for this provider; callers should await
    /// that before relying on a fresh catalog.
    pub async fn configure(&self, name: &str, partial: PartialProviderConfig) -> ProviderConfig {
        let key = normalize_provider_name(name);

        if let Some(api_key) = &partial.api_key {
            self.secrets.set(&key, api_key.clone());
        }

        let merged = {
            let mut configs = self.configs.write();
            let base = configs.get(&key).cloned().unwrap_or_else(|| empty_shell(&key));
            let merged = base.merge(&partial);
            configs.insert(key.clone(), merged.clone());
            merged
        };

        self.catalog.invalidate(&key).await;
        merged
    }

    pub fn get(&self, name: &str) -> Option<ProviderConfig> {
        self.configs.read().get(&normalize_provider_name(name)).cloned()
    }

    pub fn list(&self, active_only: bool) -> Vec<ProviderConfig> {
        self.configs
            .read()
            .values()
            .filter(|c| !active_only || c.active)
            .cloned()
            .collect()
    }

    pub fn has_api_key(&self, name: &str) -> bool {
        let key = normalize_provider_name(name);
        if self.secrets.contains(&key) {
            return true;
        }
        match self.get(&key) {
            Some(config) => config.env_var_names.iter().any(|var| {
                std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false)
            }),
            None => false,
        }
    }

    /// Resolve an API key and build the headers a chat or model-catalog
    /// request should carry: the auth header (when `auth_type == Header`)
    /// plus `custom_headers`. Query-type auth never adds a header; use
    /// [`ProviderRegistry::build_api_url`] for that.
    pub fn build_auth_headers(&self, name: &str, explicit_api_key: Option<&str>) -> AuthHeaders {
        let Some(config) = self.get(name) else {
            return AuthHeaders::default();
        };

        let mut headers = config.custom_headers.clone();
        let key = resolve_api_key(explicit_api_key, &self.secrets, name, &config.env_var_names);

        if config.auth_config.auth_type == AuthType::Header {
            if let Some(key) = key {
                let header_name = config.auth_config.header_name.clone().unwrap_or_else(|| "Authorization".into());
                headers.insert(header_name, config.auth_config.format_header_value(&key));
            } else if !config.auth_config.optional {
                tracing::warn!(provider = %name, "no API key resolved for a provider that requires one");
            }
        }

        AuthHeaders { headers }
    }

    /// Append the query-string auth parameter to `url` when the provider
    /// uses query-type auth; otherwise returns `url` unchanged.
    pub fn build_api_url(&self, name: &str, url: &str, explicit_api_key: Option<&str>) -> String {
        let Some(config) = self.get(name) else {
            return url.to_string();
        };
        if config.auth_config.auth_type != AuthType::Query {
            return url.to_string();
        }
        let Some(key) = resolve_api_key(explicit_api_key, &self.secrets, name, &config.env_var_names) else {
            return url.to_string();
        };
        let param = config.auth_config.query_param.clone().unwrap_or_else(|| "key".into());
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}{param}={}", urlencode(&key))
    }

    /// Cache-first model catalog lookup. On a cache miss, issues the GET
    /// itself; parse or transport failures are logged and yield an empty
    /// list rather than propagating past this boundary.
    pub async fn get_models(&self, client: &Client, name: &str, explicit_api_key: Option<&str>) -> Vec<ModelInfo> {
        let key = normalize_provider_name(name);
        if let Some(cached) = self.catalog.get(&key).await {
            return (*cached).clone();
        }

        let Some(config) = self.get(&key) else {
            tracing::warn!(provider = %name, "get_models on unknown provider");
            return Vec::new();
        };
        let Some(models_url) = config.models_api_url.clone() else {
            tracing::warn!(provider = %name, "provider has no models_api_url configured");
            return Vec::new();
        };

        let url = self.build_api_url(&key, &models_url, explicit_api_key);
        let auth = self.build_auth_headers(&key, explicit_api_key);

        let mut request = client.get(&url);
        for (header, value) in &auth.headers {
            request = request.header(header, value);
        }

        let models = match request.send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.json::<Value>().await {
                    Ok(body) => parse_model_catalog(&body, &config.parse_config),
                    Err(err) => {
                        tracing::warn!(provider = %name, error = %err, "failed to decode model catalog response");
                        Vec::new()
                    }
                },
                Err(err) => {
                    tracing::warn!(provider = %name, error = %err, "model catalog request returned an error status");
                    Vec::new()
                }
            },
            Err(err) => {
                tracing::warn!(provider = %name, error = %err, "model catalog request failed");
                Vec::new()
            }
        };

        self.catalog.put(&key, models.clone()).await;
        models
    }

    pub async fn get_model(&self, client: &Client, name: &str, model_id: &str, explicit_api_key: Option<&str>) -> Option<ModelInfo> {
        self.get_models(client, name, explicit_api_key).await.into_iter().find(|m| m.id == model_id)
    }

    /// Insert or replace a single model in the cached catalog without a
    /// round trip, e.g. after the caller independently discovers one.
    pub async fn save_model(&self, name: &str, model: ModelInfo) {
        let key = normalize_provider_name(name);
        let mut models = self.catalog.get(&key).await.map(|m| (*m).clone()).unwrap_or_default();
        models.retain(|m| m.id != model.id);
        models.push(model);
        self.catalog.put(&key, models).await;
    }

    pub async fn clear_cache(&self, name: Option<&str>) {
        match name {
            Some(name) => self.catalog.invalidate(&normalize_provider_name(name)).await,
            None => self.catalog.clear().await,
        }
    }

    /// Test helper: restore built-in defaults and drop all secrets/cache.
    pub async fn reset(&self) {
        let mut configs = self.configs.write();
        configs.clear();
        for config in defaults::builtin_defaults() {
            configs.insert(config.name.clone(), config);
        }
        drop(configs);
        self.catalog.clear().await;
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_shell(name: &str) -> ProviderConfig {
    ProviderConfig {
        name: name.to_string(),
        chat_api_url: String::new(),
        models_api_url: None,
        env_var_names: Vec::new(),
        default_model: String::new(),
        custom_headers: HashMap::new(),
        auth_config: AuthConfig {
            auth_type: AuthType::Header,
            header_name: Some("Authorization".into()),
            header_format: Some("Bearer {key}".into()),
            query_param: None,
            optional: false,
        },
        parse_config: ParseConfig {
            models_path: "data".into(),
            id_field: "id".into(),
            name_field: None,
            display_name_field: None,
            context_window_field: None,
            id_prefix: None,
        },
        chat_config: ChatConfig {
            message_format: MessageFormat::Openai,
            response_parse_path: "choices[0].message.content".into(),
            tool_schema_type: Some(ToolSchemaType::Openai),
        },
        active: true,
    }
}

fn parse_model_catalog(body: &Value, parse_config: &ParseConfig) -> Vec<ModelInfo> {
    let Ok(path) = JsonPath::parse(&parse_config.models_path) else {
        tracing::warn!(path = %parse_config.models_path, "invalid models_path");
        return Vec::new();
    };
    let Some(Value::Array(entries)) = path.get(body) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let raw_id = entry.get(&parse_config.id_field)?.as_str()?;
            let id = match &parse_config.id_prefix {
                Some(prefix) => raw_id.strip_prefix(prefix.as_str()).unwrap_or(raw_id).to_string(),
                None => raw_id.to_string(),
            };
            let name = parse_config.name_field.as_ref().and_then(|f| entry.get(f)).and_then(Value::as_str).map(str::to_string);
            let display_name = parse_config
                .display_name_field
                .as_ref()
                .and_then(|f| entry.get(f))
                .and_then(Value::as_str)
                .map(str::to_string);
            let context_window =
                parse_config.context_window_field.as_ref().and_then(|f| entry.get(f)).and_then(Value::as_u64).map(|n| n as u32);

            Some(ModelInfo { id, name, display_name, context_window })
        })
        .collect()
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
