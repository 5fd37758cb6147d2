//! Secret handling for provider API keys.
//!
//! Kept as a distinct type from [`super::ProviderConfig`] so that logging
//! or serializing a config can never accidentally include a credential.
//! Values are wrapped in [`secrecy::SecretString`], which redacts Debug
//! output and zeroes memory on drop.

use std::collections::HashMap;

use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};

use crate::registry::normalize_provider_name;

/// Separate in-memory mapping from normalized provider name to secret
/// API key. Never serialized alongside [`super::ProviderConfig`].
#[derive(Default)]
pub struct ApiKeyStore {
    keys: RwLock<HashMap<String, SecretString>>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or overwrite) the API key for `provider`.
    pub fn set(&self, provider: &str, key: impl Into<String>) {
        self.keys.write().insert(normalize_provider_name(provider), SecretString::from(key.into()));
    }

    /// Look up the stored key for `provider`, if any.
    pub fn get(&self, provider: &str) -> Option<String> {
        self.keys
            .read()
            .get(&normalize_provider_name(provider))
            .map(|s| s.expose_secret().to_string())
    }

    pub fn remove(&self, provider: &str) {
        self.keys.write().remove(&normalize_provider_name(provider));
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.keys.read().contains_key(&normalize_provider_name(provider))
    }
}

impl std::fmt::Debug for ApiKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyStore")
            .field("providers", &self.keys.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolve an API key for `provider` in precedence order: an explicit
/// per-call override, then the [`ApiKeyStore`], then the provider's
/// ordered list of environment variable names.
pub fn resolve_api_key(
    explicit: Option<&str>,
    store: &ApiKeyStore,
    provider: &str,
    env_var_names: &[String],
) -> Option<String> {
    if let Some(key) = explicit {
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }
    if let Some(key) = store.get(provider) {
        return Some(key);
    }
    for var in env_var_names {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_exposes_the_secret() {
        let store = ApiKeyStore::new();
        store.set("openai", "sk-super-secret");
        let debug = format!("{:?}", store);
        assert!(!debug.contains("sk-super-secret"));
    }

    #[test]
    fn get_is_case_and_whitespace_insensitive() {
        let store = ApiKeyStore::new();
        store.set(" OpenAI ", "key-1");
        assert_eq!(store.get("openai"), Some("key-1".to_string()));
    }

    #[test]
    fn resolve_prefers_explicit_over_store_over_env() {
        let store = ApiKeyStore::new();
        store.set("openai", "store-key");
        std::env::set_var("TEST_RESOLVE_ENV_KEY", "env-key");

        let env_names = vec!["TEST_RESOLVE_ENV_KEY".to_string()];

        assert_eq!(
            resolve_api_key(Some("explicit-key"), &store, "openai", &env_names),
            Some("explicit-key".to_string())
        );
        assert_eq!(resolve_api_key(None, &store, "openai", &env_names), Some("store-key".to_string()));

        store.remove("openai");
        assert_eq!(resolve_api_key(None, &store, "openai", &env_names), Some("env-key".to_string()));

        std::env::remove_var("TEST_RESOLVE_ENV_KEY");
    }

    #[test]
    fn resolve_returns_none_when_nothing_is_configured() {
        let store = ApiKeyStore::new();
        assert_eq!(resolve_api_key(None, &store, "ollama", &[]), None);
    }
}
