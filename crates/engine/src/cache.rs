//! Read-through / write-through product cache.
//!
//! Writes land in the cache first and are rolled back when the backing
//! store rejects them, so the cache never holds a record the store refused.
//! Reads that miss the cache are retried with exponential backoff; they are
//! idempotent, unlike writes, which are never retried blindly.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{ProductId, SiteId};
use domain::Product;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{ErrorKind, Result};
use crate::services::ProductStore;

/// Retry policy for idempotent reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 50,
        }
    }
}

impl RetryConfig {
    /// `base_delay_ms * 2^(attempt - 1)`
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
    }
}

pub struct CachedProductStore {
    inner: Arc<dyn ProductStore>,
    cache: RwLock<HashMap<ProductId, Product>>,
    retry: RetryConfig,
}

impl CachedProductStore {
    pub fn new(inner: Arc<dyn ProductStore>, retry: RetryConfig) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            retry,
        }
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn read_with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error)
                    if error.kind() == ErrorKind::PersistenceFailure
                        && attempt < self.retry.max_retries =>
                {
                    attempt += 1;
                    let delay_ms = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(operation, attempt, delay_ms, %error, "catalog read failed, retrying");
                    metrics::counter!("wms_read_retries_total").increment(1);
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Puts `previous` back after a rejected write.
    async fn roll_back(&self, id: ProductId, previous: Option<Product>) {
        let mut cache = self.cache.write().await;
        match previous {
            Some(product) => {
                cache.insert(id, product);
            }
            None => {
                cache.remove(&id);
            }
        }
        metrics::counter!("wms_persistence_failures_total").increment(1);
    }
}

#[async_trait]
impl ProductStore for CachedProductStore {
    async fn create(&self, product: Product) -> Result<Product> {
        let previous = self
            .cache
            .write()
            .await
            .insert(product.id, product.clone());
        match self.inner.create(product.clone()).await {
            Ok(stored) => Ok(stored),
            Err(error) => {
                tracing::error!(product_id = %product.id, %error, "product create failed, rolled back");
                self.roll_back(product.id, previous).await;
                Err(error)
            }
        }
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        if let Some(product) = self.cache.read().await.get(&id) {
            return Ok(Some(product.clone()));
        }
        let fetched = self.read_with_retry("get", || self.inner.get(id)).await?;
        if let Some(product) = &fetched {
            self.cache.write().await.insert(id, product.clone());
        }
        Ok(fetched)
    }

    async fn update(&self, product: Product) -> Result<Product> {
        let previous = self
            .cache
            .write()
            .await
            .insert(product.id, product.clone());
        match self.inner.update(product.clone()).await {
            Ok(stored) => Ok(stored),
            Err(error) => {
                tracing::error!(product_id = %product.id, %error, "product update failed, rolled back");
                self.roll_back(product.id, previous).await;
                Err(error)
            }
        }
    }

    async fn delete(&self, id: ProductId) -> Result<()> {
        let previous = self.cache.write().await.remove(&id);
        if let Err(error) = self.inner.delete(id).await {
            tracing::error!(product_id = %id, %error, "product delete failed, rolled back");
            self.roll_back(id, previous).await;
            return Err(error);
        }
        Ok(())
    }

    /// Always reads the backing store; SKU generation must see the live catalog.
    async fn list(&self) -> Result<Vec<Product>> {
        let products = self.read_with_retry("list", || self.inner.list()).await?;
        let mut cache = self.cache.write().await;
        cache.clear();
        cache.extend(products.iter().map(|p| (p.id, p.clone())));
        Ok(products)
    }

    async fn list_for_site(&self, site_id: SiteId) -> Result<Vec<Product>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|p| p.site_id == site_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::services::InMemoryProductStore;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
        }
    }

    fn setup() -> (InMemoryProductStore, CachedProductStore) {
        let backing = InMemoryProductStore::new();
        let cached = CachedProductStore::new(Arc::new(backing.clone()), fast_retry());
        (backing, cached)
    }

    fn product() -> Product {
        Product::new(SiteId::new(), "Cable", "EL-001", "Electronics", Utc::now()).with_stock(20, 10)
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let retry = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
        };
        assert_eq!(retry.delay_for_attempt(1), 100);
        assert_eq!(retry.delay_for_attempt(2), 200);
        assert_eq!(retry.delay_for_attempt(3), 400);
    }

    #[tokio::test]
    async fn test_failed_update_rolls_back_cache() {
        let (backing, cached) = setup();
        let original = cached.create(product()).await.unwrap();

        backing.set_fail_on_write(true);
        let mut changed = original.clone();
        changed.stock = 0;
        assert!(cached.update(changed).await.is_err());

        let seen = cached.get(original.id).await.unwrap().unwrap();
        assert_eq!(seen.stock, 20);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_cache_entry() {
        let (backing, cached) = setup();
        backing.set_fail_on_write(true);
        let product = product();
        assert!(cached.create(product.clone()).await.is_err());
        assert_eq!(cached.cached_len().await, 0);
        assert!(cached.get(product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_through_caches_hits() {
        let (backing, cached) = setup();
        let product = backing.create(product()).await.unwrap();

        cached.get(product.id).await.unwrap();
        cached.get(product.id).await.unwrap();
        assert_eq!(backing.read_count(), 1);
    }

    #[tokio::test]
    async fn test_reads_retry_until_success() {
        let (backing, cached) = setup();
        let product = backing.create(product()).await.unwrap();

        backing.fail_next_reads(2);
        let fetched = cached.get(product.id).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(backing.read_count(), 3);
    }

    #[tokio::test]
    async fn test_reads_give_up_after_max_retries() {
        let (backing, cached) = setup();
        backing.fail_next_reads(10);
        let err = cached.list().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
        assert_eq!(backing.read_count(), 4);
    }
}
