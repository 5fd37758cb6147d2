//! Compiled-in default [`ProviderConfig`]s for the four shipped dialects.
//!
//! Values mirror the provider dialect and model-catalog tables: URLs, auth
//! shape, response parse paths, and environment variable names.

use std::collections::HashMap;

use crate::registry::config::{
    AuthConfig, AuthType, ChatConfig, MessageFormat, ParseConfig, ProviderConfig, ToolSchemaType,
};

pub fn openai_default() -> ProviderConfig {
    ProviderConfig {
        name: "openai".into(),
        chat_api_url: "https://api.openai.com/v1/chat/completions".into(),
        models_api_url: Some("https://api.openai.com/v1/models".into()),
        env_var_names: vec!["OPENAI_API_KEY".into()],
        default_model: "gpt-4o-mini".into(),
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

pub fn anthropic_default() -> ProviderConfig {
    ProviderConfig {
        name: "anthropic".into(),
        chat_api_url: "https://api.anthropic.com/v1/messages".into(),
        models_api_url: Some("https://api.anthropic.com/v1/models".into()),
        env_var_names: vec!["ANTHROPIC_API_KEY".into()],
        default_model: "claude-sonnet-4-5-20250514".into(),
        custom_headers: HashMap::from([("anthropic-version".to_string(), "2023-06-01".to_string())]),
        auth_config: AuthConfig {
            auth_type: AuthType::Header,
            header_name: Some("x-api-key".into()),
            header_format: None,
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
            message_format: MessageFormat::Anthropic,
            response_parse_path: "content[0].text".into(),
            tool_schema_type: Some(ToolSchemaType::Anthropic),
        },
        active: true,
    }
}

pub fn google_default() -> ProviderConfig {
    ProviderConfig {
        name: "google".into(),
        chat_api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions".into(),
        models_api_url: Some("https://generativelanguage.googleapis.com/v1beta/models".into()),
        env_var_names: vec!["GEMINI_API_KEY".into(), "GOOGLE_API_KEY".into(), "GOOGLE_GENERATIVE_AI_API_KEY".into()],
        default_model: "gemini-2.0-flash".into(),
        custom_headers: HashMap::new(),
        auth_config: AuthConfig {
            auth_type: AuthType::Query,
            header_name: None,
            header_format: None,
            query_param: Some("key".into()),
            optional: false,
        },
        parse_config: ParseConfig {
            models_path: "models".into(),
            id_field: "name".into(),
            name_field: Some("displayName".into()),
            display_name_field: Some("displayName".into()),
            context_window_field: Some("inputTokenLimit".into()),
            id_prefix: Some("models/".into()),
        },
        chat_config: ChatConfig {
            message_format: MessageFormat::Openai,
            response_parse_path: "choices[0].message.content".into(),
            tool_schema_type: Some(ToolSchemaType::Openai),
        },
        active: true,
    }
}

pub fn ollama_default() -> ProviderConfig {
    let base = std::env::var("OLLAMA_API_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
    let base = base.trim_end_matches('/');
    ProviderConfig {
        name: "ollama".into(),
        chat_api_url: format!("{base}/api/generate"),
        models_api_url: Some(format!("{base}/api/tags")),
        env_var_names: vec!["OLLAMA_API_KEY".into()],
        default_model: "llama3".into(),
        custom_headers: HashMap::new(),
        auth_config: AuthConfig {
            auth_type: AuthType::Header,
            header_name: Some("Authorization".into()),
            header_format: Some("Bearer {key}".into()),
            query_param: None,
            optional: true,
        },
        parse_config: ParseConfig {
            models_path: "models".into(),
            id_field: "name".into(),
            name_field: Some("name".into()),
            display_name_field: None,
            context_window_field: None,
            id_prefix: None,
        },
        chat_config: ChatConfig {
            message_format: MessageFormat::OllamaGenerate,
            response_parse_path: "response".into(),
            tool_schema_type: None,
        },
        active: true,
    }
}

/// All built-in defaults, keyed by normalized provider name. Each is
/// gated by its own feature so a consumer that only ever talks to one
/// backend doesn't carry the others' compiled-in config.
pub fn builtin_defaults() -> Vec<ProviderConfig> {
    let mut defaults = Vec::new();
    #[cfg(feature = "openai")]
    defaults.push(openai_default());
    #[cfg(feature = "anthropic")]
    defaults.push(anthropic_default());
    #[cfg(feature = "google")]
    defaults.push(google_default());
    #[cfg(feature = "ollama")]
    defaults.push(ollama_default());
    defaults
}
