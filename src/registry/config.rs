//! Typed provider configuration: [`ProviderConfig`] and its partial,
//! mergeable counterpart [`PartialProviderConfig`].
//!
//! The registry stores full configs; callers hand it partials through
//! [`ProviderRegistry::configure`][super::ProviderRegistry::configure]. An
//! absent field in a partial always means "inherit the existing value" —
//! there is no way to express "clear this field" short of overwriting it
//! with a new value, which mirrors how the defaults/overrides split is
//! specified.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Where the API key is carried for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Header,
    Query,
}

/// How a provider wants its API key attached to a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub auth_type: AuthType,
    /// Header name when `auth_type == Header` (e.g. `"Authorization"`, `"x-api-key"`).
    pub header_name: Option<String>,
    /// Template applied to the resolved key, containing the literal `{key}`
    /// placeholder (e.g. `"Bearer {key}"`). `None` means the raw key.
    pub header_format: Option<String>,
    /// Query parameter name when `auth_type == Query` (e.g. `"key"`).
    pub query_param: Option<String>,
    /// Whether a missing key is tolerated (Ollama: auth is optional).
    pub optional: bool,
}

impl AuthConfig {
    /// Render the header value for a resolved key, applying `header_format`.
    pub fn format_header_value(&self, key: &str) -> String {
        match &self.header_format {
            Some(template) => template.replace("{key}", key),
            None => key.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialAuthConfig {
    pub auth_type: Option<AuthType>,
    pub header_name: Option<String>,
    pub header_format: Option<String>,
    pub query_param: Option<String>,
    pub optional: Option<bool>,
}

impl AuthConfig {
    fn merged_with(&self, partial: &PartialAuthConfig) -> Self {
        Self {
            auth_type: partial.auth_type.unwrap_or(self.auth_type),
            header_name: partial.header_name.clone().or_else(|| self.header_name.clone()),
            header_format: partial.header_format.clone().or_else(|| self.header_format.clone()),
            query_param: partial.query_param.clone().or_else(|| self.query_param.clone()),
            optional: partial.optional.unwrap_or(self.optional),
        }
    }
}

/// How to parse a model-catalog response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// JSON path to the array of model objects (e.g. `"data"`, `"models"`).
    pub models_path: String,
    pub id_field: String,
    pub name_field: Option<String>,
    pub display_name_field: Option<String>,
    pub context_window_field: Option<String>,
    /// Prefix stripped from ids after extraction (Google: `"models/"`).
    pub id_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialParseConfig {
    pub models_path: Option<String>,
    pub id_field: Option<String>,
    pub name_field: Option<String>,
    pub display_name_field: Option<String>,
    pub context_window_field: Option<String>,
    pub id_prefix: Option<String>,
}

impl ParseConfig {
    fn merged_with(&self, partial: &PartialParseConfig) -> Self {
        Self {
            models_path: partial.models_path.clone().unwrap_or_else(|| self.models_path.clone()),
            id_field: partial.id_field.clone().unwrap_or_else(|| self.id_field.clone()),
            name_field: partial.name_field.clone().or_else(|| self.name_field.clone()),
            display_name_field: partial.display_name_field.clone().or_else(|| self.display_name_field.clone()),
            context_window_field: partial
                .context_window_field
                .clone()
                .or_else(|| self.context_window_field.clone()),
            id_prefix: partial.id_prefix.clone().or_else(|| self.id_prefix.clone()),
        }
    }
}

/// Request/response shape for the chat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    Openai,
    Anthropic,
    /// Ollama's `/api/generate`: a single flattened prompt string.
    OllamaGenerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSchemaType {
    Openai,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub message_format: MessageFormat,
    /// JSON path into the chat response body for the text content.
    pub response_parse_path: String,
    pub tool_schema_type: Option<ToolSchemaType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialChatConfig {
    pub message_format: Option<MessageFormat>,
    pub response_parse_path: Option<String>,
    pub tool_schema_type: Option<ToolSchemaType>,
}

impl ChatConfig {
    fn merged_with(&self, partial: &PartialChatConfig) -> Self {
        Self {
            message_format: partial.message_format.unwrap_or(self.message_format),
            response_parse_path: partial
                .response_parse_path
                .clone()
                .unwrap_or_else(|| self.response_parse_path.clone()),
            tool_schema_type: partial.tool_schema_type.or(self.tool_schema_type),
        }
    }
}

/// Full configuration for one provider. Never carries the API key —
/// that lives in `ApiKeyStore`, addressed by the same normalized name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub chat_api_url: String,
    pub models_api_url: Option<String>,
    pub env_var_names: Vec<String>,
    pub default_model: String,
    pub custom_headers: HashMap<String, String>,
    pub auth_config: AuthConfig,
    pub parse_config: ParseConfig,
    pub chat_config: ChatConfig,
    pub active: bool,
}

/// A partial override applied over an existing or default [`ProviderConfig`]
/// via [`ProviderConfig::merge`]. Every field absent means "keep what's there".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialProviderConfig {
    pub chat_api_url: Option<String>,
    pub models_api_url: Option<String>,
    pub env_var_names: Option<Vec<String>>,
    pub default_model: Option<String>,
    pub custom_headers: Option<HashMap<String, String>>,
    pub auth_config: Option<PartialAuthConfig>,
    pub parse_config: Option<PartialParseConfig>,
    pub chat_config: Option<PartialChatConfig>,
    pub active: Option<bool>,
    /// Convenience shorthand: derives `chat_api_url`/`models_api_url` by
    /// provider family when those fields aren't already set explicitly.
    pub base_url: Option<String>,
    /// Removed from the config before storage; routed to the `ApiKeyStore`.
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Apply `partial` over `self`: shallow merge for scalars, deep merge
    /// for `custom_headers`/`auth_config`/`parse_config`/`chat_config`.
    pub fn merge(&self, partial: &PartialProviderConfig) -> Self {
        let mut custom_headers = self.custom_headers.clone();
        if let Some(overrides) = &partial.custom_headers {
            for (k, v) in overrides {
                custom_headers.insert(k.clone(), v.clone());
            }
        }

        let mut merged = Self {
            name: self.name.clone(),
            chat_api_url: partial.chat_api_url.clone().unwrap_or_else(|| self.chat_api_url.clone()),
            models_api_url: partial.models_api_url.clone().or_else(|| self.models_api_url.clone()),
            env_var_names: partial.env_var_names.clone().unwrap_or_else(|| self.env_var_names.clone()),
            default_model: partial.default_model.clone().unwrap_or_else(|| self.default_model.clone()),
            custom_headers,
            auth_config: match &partial.auth_config {
                Some(p) => self.auth_config.merged_with(p),
                None => self.auth_config.clone(),
            },
            parse_config: match &partial.parse_config {
                Some(p) => self.parse_config.merged_with(p),
                None => self.parse_config.clone(),
            },
            chat_config: match &partial.chat_config {
                Some(p) => self.chat_config.merged_with(p),
                None => self.chat_config.clone(),
            },
            active: partial.active.unwrap_or(self.active),
        };

        if let Some(base) = &partial.base_url {
            apply_base_url(&mut merged, base, partial);
        }

        merged
    }
}

/// Derive `chat_api_url`/`models_api_url` from a bare base URL, by family,
/// but only for fields the partial didn't already set explicitly.
fn apply_base_url(config: &mut ProviderConfig, base_url: &str, partial: &PartialProviderConfig) {
    let base = base_url.trim_end_matches('/');
    let is_ollama = config.chat_config.message_format == MessageFormat::OllamaGenerate;

    if partial.chat_api_url.is_none() {
        config.chat_api_url =
            if is_ollama { format!("{base}/api/generate") } else { format!("{base}/v1/chat/completions") };
    }
    if partial.models_api_url.is_none() {
        config.models_api_url =
            Some(if is_ollama { format!("{base}/api/tags") } else { format!("{base}/v1/models") });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::defaults::openai_default;

    #[test]
    fn merge_keeps_fields_absent_from_the_partial() {
        let base = openai_default();
        let partial = PartialProviderConfig { default_model: Some("gpt-4o".into()), ..Default::default() };
        let merged = base.merge(&partial);

        assert_eq!(merged.default_model, "gpt-4o");
        assert_eq!(merged.chat_api_url, base.chat_api_url);
    }

    #[test]
    fn merge_deep_merges_custom_headers_instead_of_replacing() {
        let mut base = openai_default();
        base.custom_headers.insert("X-Existing".into(), "1".into());
        let partial = PartialProviderConfig {
            custom_headers: Some(HashMap::from([("X-New".into(), "2".into())])),
            ..Default::default()
        };
        let merged = base.merge(&partial);

        assert_eq!(merged.custom_headers.get("X-Existing"), Some(&"1".to_string()));
        assert_eq!(merged.custom_headers.get("X-New"), Some(&"2".to_string()));
    }

    #[test]
    fn merge_deep_merges_auth_config_field_by_field() {
        let base = openai_default();
        let partial = PartialProviderConfig {
            auth_config: Some(PartialAuthConfig { optional: Some(true), ..Default::default() }),
            ..Default::default()
        };
        let merged = base.merge(&partial);

        assert!(merged.auth_config.optional);
        assert_eq!(merged.auth_config.auth_type, base.auth_config.auth_type);
        assert_eq!(merged.auth_config.header_name, base.auth_config.header_name);
    }

    #[test]
    fn base_url_derives_openai_style_urls_when_unset() {
        let base = openai_default();
        let partial = PartialProviderConfig { base_url: Some("http://localhost:9000/".into()), ..Default::default() };
        let merged = base.merge(&partial);

        assert_eq!(merged.chat_api_url, "http://localhost:9000/v1/chat/completions");
        assert_eq!(merged.models_api_url, Some("http://localhost:9000/v1/models".to_string()));
    }

    #[test]
    fn base_url_does_not_override_an_explicitly_set_chat_api_url() {
        let base = openai_default();
        let partial = PartialProviderConfig {
            base_url: Some("http://localhost:9000".into()),
            chat_api_url: Some("http://example.com/custom".into()),
            ..Default::default()
        };
        let merged = base.merge(&partial);

        assert_eq!(merged.chat_api_url, "http://example.com/custom");
        // models_api_url wasn't set explicitly, so base_url still derives it.
        assert_eq!(merged.models_api_url, Some("http://localhost:9000/v1/models".to_string()));
    }
}
