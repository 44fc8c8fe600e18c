//! Process-wide response cache.
//!
//! Entries are keyed by resource name and language and tagged with the
//! configuration revision they were computed from. A lookup under a newer
//! revision misses, so any configuration write invalidates every entry
//! without the writer having to know about the cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: String,
    pub language: String,
}

impl CacheKey {
    pub fn new(resource: &str, language: &str) -> Self {
        Self {
            resource: resource.to_string(),
            language: language.to_string(),
        }
    }
}

#[derive(Clone)]
struct CachedResponse {
    revision_id: i64,
    value: Arc<Value>,
}

#[derive(Clone, Default)]
pub struct ApiCache {
    entries: Arc<RwLock<HashMap<CacheKey, CachedResponse>>>,
}

impl ApiCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached value computed at `revision_id`.
    pub async fn get(&self, key: &CacheKey, revision_id: i64) -> Option<Arc<Value>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.revision_id == revision_id)
            .map(|entry| Arc::clone(&entry.value))
    }

    pub async fn put(&self, key: CacheKey, revision_id: i64, value: Arc<Value>) {
        let mut entries = self.entries.write().await;

        // Entries computed before the current revision can never hit again.
        entries.retain(|_, entry| entry.revision_id >= revision_id);
        entries.insert(key, CachedResponse { revision_id, value });
    }

    /// Return the cached value for `(resource, language)` or compute and store it.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        resource: &str,
        language: &str,
        revision_id: i64,
        compute: F,
    ) -> Result<Arc<Value>, AppError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let key = CacheKey::new(resource, language);
        if let Some(hit) = self.get(&key, revision_id).await {
            tracing::debug!("Cache hit for {}/{}", resource, language);
            return Ok(hit);
        }

        tracing::debug!("Cache miss for {}/{}, computing", resource, language);
        let value = Arc::new(serde_json::to_value(compute().await?)?);
        self.put(key, revision_id, Arc::clone(&value)).await;
        Ok(value)
    }

    /// Drop every entry.
    pub async fn invalidate(&self) {
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        tracing::info!("Response cache invalidated ({} entries dropped)", dropped);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
