//! Model catalog cache: a cache-first store of each provider's model list.
//!
//! Mirrors the shape of an evaluation cache keyed by a stable string and
//! backed by `moka`'s async cache, just keyed by normalized provider name
//! instead of a content hash.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};

/// One entry of a provider's model catalog, after `parse_config` extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub context_window: Option<u32>,
}

/// Cache-first store of provider model catalogs.
///
/// A fixed TTL keeps long-lived processes from serving a stale catalog
/// forever; `clear`/`invalidate` give callers (`configure`, `clearCache`)
/// an explicit way to force a refresh sooner.
pub struct ModelCatalog {
    cache: Cache<String, Arc<Vec<ModelInfo>>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(256)
                .time_to_live(Duration::from_secs(6 * 60 * 60))
                .build(),
        }
    }

    pub async fn get(&self, provider: &str) -> Option<Arc<Vec<ModelInfo>>> {
        self.cache.get(provider).await
    }

    pub async fn put(&self, provider: &str, models: Vec<ModelInfo>) {
        self.cache.insert(provider.to_string(), Arc::new(models)).await;
    }

    pub async fn invalidate(&self, provider: &str) {
        self.cache.invalidate(provider).await;
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let catalog = ModelCatalog::new();
        let models = vec![ModelInfo { id: "gpt-4o-mini".into(), name: None, display_name: None, context_window: None }];
        catalog.put("openai", models.clone()).await;
        assert_eq!(catalog.get("openai").await.map(|m| (*m).clone()), Some(models));
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let catalog = ModelCatalog::new();
        assert!(catalog.get("anthropic").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_only_the_named_provider() {
        let catalog = ModelCatalog::new();
        catalog.put("openai", vec![]).await;
        catalog.put("anthropic", vec![]).await;

        catalog.invalidate("openai").await;

        assert!(catalog.get("openai").await.is_none());
        assert!(catalog.get("anthropic").await.is_some());
    }
}
