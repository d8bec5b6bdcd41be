//! Cached repository adapters.
//!
//! Wraps the model and credential repositories with the TTL cache. Reads
//! consult the cache first and populate it on miss; every mutating operation
//! invalidates the affected key after the underlying write succeeds and
//! before returning, so no caller can observe a post-write cache hit serving
//! pre-write data. A failed underlying write leaves the cache untouched.
//!
//! The adapters are transparent: they implement the same repository traits as
//! the stores they wrap, plus a [`stats`](CachedModelRepository::stats)
//! accessor for observability.

use std::sync::Arc;
use std::time::Duration;

use super::models::{
    Credential, CredentialCreateRequest, CredentialUpdateRequest, Model, ModelCreateRequest, ModelUpdateRequest,
};
use super::{CredentialRepository, ModelRepository, Result};
use crate::cache::TtlCache;
use crate::types::CredentialId;

/// Size and configured TTL of one cache, for the operator stats surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub ttl: Duration,
}

pub struct CachedModelRepository {
    inner: Arc<dyn ModelRepository>,
    cache: TtlCache<String, Model>,
}

impl CachedModelRepository {
    pub fn new(inner: Arc<dyn ModelRepository>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            ttl: self.cache.ttl(),
        }
    }

    /// Stop the cache's eviction sweep task.
    pub fn close(&self) {
        self.cache.close();
    }
}

#[async_trait::async_trait]
impl ModelRepository for CachedModelRepository {
    async fn get_model_by_id(&self, id: &str) -> Result<Option<Model>> {
        if let Some(model) = self.cache.get(&id.to_string()) {
            return Ok(Some(model));
        }
        let model = self.inner.get_model_by_id(id).await?;
        if let Some(model) = &model {
            self.cache.set(model.id.clone(), model.clone());
        }
        Ok(model)
    }

    async fn get_all_models(&self) -> Result<Vec<Model>> {
        self.inner.get_all_models().await
    }

    async fn create_model(&self, request: &ModelCreateRequest) -> Result<Model> {
        let created = self.inner.create_model(request).await?;
        self.cache.delete(&created.id);
        Ok(created)
    }

    async fn update_model(&self, id: &str, request: &ModelUpdateRequest) -> Result<Model> {
        let updated = self.inner.update_model(id, request).await?;
        self.cache.delete(&id.to_string());
        Ok(updated)
    }

    async fn delete_model(&self, id: &str) -> Result<bool> {
        let deleted = self.inner.delete_model(id).await?;
        self.cache.delete(&id.to_string());
        Ok(deleted)
    }
}

pub struct CachedCredentialRepository {
    inner: Arc<dyn CredentialRepository>,
    cache: TtlCache<CredentialId, Credential>,
}

impl CachedCredentialRepository {
    pub fn new(inner: Arc<dyn CredentialRepository>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            ttl: self.cache.ttl(),
        }
    }

    pub fn close(&self) {
        self.cache.close();
    }
}

#[async_trait::async_trait]
impl CredentialRepository for CachedCredentialRepository {
    async fn get_credential(&self, id: CredentialId) -> Result<Option<Credential>> {
        if let Some(credential) = self.cache.get(&id) {
            return Ok(Some(credential));
        }
        let credential = self.inner.get_credential(id).await?;
        if let Some(credential) = &credential {
            self.cache.set(credential.id, credential.clone());
        }
        Ok(credential)
    }

    async fn list_credentials(&self) -> Result<Vec<Credential>> {
        self.inner.list_credentials().await
    }

    async fn create_credential(&self, request: &CredentialCreateRequest) -> Result<Credential> {
        let created = self.inner.create_credential(request).await?;
        self.cache.delete(&created.id);
        Ok(created)
    }

    async fn update_credential(&self, id: CredentialId, request: &CredentialUpdateRequest) -> Result<Credential> {
        let updated = self.inner.update_credential(id, request).await?;
        self.cache.delete(&id);
        Ok(updated)
    }

    async fn delete_credential(&self, id: CredentialId) -> Result<bool> {
        let deleted = self.inner.delete_credential(id).await?;
        self.cache.delete(&id);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CredentialKind;
    use crate::store::RepoError;
    use crate::store::memory::InMemoryModelRepository;
    use crate::store::models::ModelCapabilities;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    const TTL: Duration = Duration::from_secs(60);

    fn model_create(id: &str, name: &str) -> ModelCreateRequest {
        ModelCreateRequest {
            id: id.to_string(),
            name: name.to_string(),
            provider: "openrouter".to_string(),
            credential_id: Uuid::new_v4(),
            credential_kind: CredentialKind::OpenRouter,
            input_token_price: Decimal::new(1, 6),
            output_token_price: Decimal::new(2, 6),
            capabilities: ModelCapabilities::default(),
            metadata: HashMap::new(),
        }
    }

    /// Counts reads so tests can tell cache hits from delegated lookups.
    struct CountingModelRepository {
        inner: InMemoryModelRepository,
        reads: AtomicUsize,
        fail_updates: bool,
    }

    impl CountingModelRepository {
        fn new(fail_updates: bool) -> Self {
            Self {
                inner: InMemoryModelRepository::new(),
                reads: AtomicUsize::new(0),
                fail_updates,
            }
        }
    }

    #[async_trait::async_trait]
    impl ModelRepository for CountingModelRepository {
        async fn get_model_by_id(&self, id: &str) -> Result<Option<Model>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_model_by_id(id).await
        }

        async fn get_all_models(&self) -> Result<Vec<Model>> {
            self.inner.get_all_models().await
        }

        async fn create_model(&self, request: &ModelCreateRequest) -> Result<Model> {
            self.inner.create_model(request).await
        }

        async fn update_model(&self, id: &str, request: &ModelUpdateRequest) -> Result<Model> {
            if self.fail_updates {
                return Err(RepoError::Other(anyhow::anyhow!("write failed")));
            }
            self.inner.update_model(id, request).await
        }

        async fn delete_model(&self, id: &str) -> Result<bool> {
            self.inner.delete_model(id).await
        }
    }

    #[tokio::test]
    async fn test_miss_populates_cache_and_hit_skips_repository() {
        let backing = Arc::new(CountingModelRepository::new(false));
        let cached = CachedModelRepository::new(backing.clone(), TTL);

        cached.create_model(&model_create("gpt-4o", "GPT-4o")).await.unwrap();

        let first = cached.get_model_by_id("gpt-4o").await.unwrap().unwrap();
        let second = cached.get_model_by_id("gpt-4o").await.unwrap().unwrap();
        assert_eq!(first, second);
        // One delegated read; the second was served from the cache
        assert_eq!(backing.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_invalidates_before_returning() {
        let backing = Arc::new(CountingModelRepository::new(false));
        let cached = CachedModelRepository::new(backing.clone(), TTL);

        cached.create_model(&model_create("gpt-4o", "old name")).await.unwrap();
        // Warm the cache
        cached.get_model_by_id("gpt-4o").await.unwrap();

        cached
            .update_model(
                "gpt-4o",
                &ModelUpdateRequest {
                    name: Some("new name".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // The very next read must not return the pre-write value
        let model = cached.get_model_by_id("gpt-4o").await.unwrap().unwrap();
        assert_eq!(model.name, "new name");
    }

    #[tokio::test]
    async fn test_delete_invalidates() {
        let backing = Arc::new(CountingModelRepository::new(false));
        let cached = CachedModelRepository::new(backing.clone(), TTL);

        cached.create_model(&model_create("gpt-4o", "GPT-4o")).await.unwrap();
        cached.get_model_by_id("gpt-4o").await.unwrap();

        assert!(cached.delete_model("gpt-4o").await.unwrap());
        assert!(cached.get_model_by_id("gpt-4o").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let backing = Arc::new(CountingModelRepository::new(true));
        let cached = CachedModelRepository::new(backing.clone(), TTL);

        cached.create_model(&model_create("gpt-4o", "GPT-4o")).await.unwrap();
        cached.get_model_by_id("gpt-4o").await.unwrap();
        let reads_before = backing.reads.load(Ordering::SeqCst);

        let result = cached
            .update_model(
                "gpt-4o",
                &ModelUpdateRequest {
                    name: Some("new name".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(result.is_err());

        // Still served from cache: the failed write did not invalidate
        cached.get_model_by_id("gpt-4o").await.unwrap();
        assert_eq!(backing.reads.load(Ordering::SeqCst), reads_before);
    }

    #[tokio::test]
    async fn test_stats_report_size_and_ttl() {
        let backing = Arc::new(CountingModelRepository::new(false));
        let cached = CachedModelRepository::new(backing, TTL);

        assert_eq!(cached.stats(), CacheStats { size: 0, ttl: TTL });

        cached.create_model(&model_create("gpt-4o", "GPT-4o")).await.unwrap();
        cached.get_model_by_id("gpt-4o").await.unwrap();
        assert_eq!(cached.stats().size, 1);
    }
}
