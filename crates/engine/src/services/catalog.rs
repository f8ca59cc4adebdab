//! Product persistence.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use common::{ProductId, SiteId};
use domain::{CatalogError, Product};
use tokio::sync::RwLock;

use crate::error::{EngineError, Result};

/// Site-scoped product records.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Inserts a product. A non-empty SKU must be unique within the site.
    async fn create(&self, product: Product) -> Result<Product>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>>;

    async fn update(&self, product: Product) -> Result<Product>;

    async fn delete(&self, id: ProductId) -> Result<()>;

    /// Every product at every site. SKU generation scans this.
    async fn list(&self) -> Result<Vec<Product>>;

    async fn list_for_site(&self, site_id: SiteId) -> Result<Vec<Product>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|p| p.site_id == site_id)
            .collect())
    }

    async fn find_by_sku(&self, site_id: SiteId, sku: &str) -> Result<Option<Product>> {
        Ok(self
            .list_for_site(site_id)
            .await?
            .into_iter()
            .find(|p| !sku.is_empty() && p.sku == sku))
    }

    /// Case-insensitive name lookup, used for manual receipt lines.
    async fn find_by_name(&self, site_id: SiteId, name: &str) -> Result<Option<Product>> {
        Ok(self
            .list_for_site(site_id)
            .await?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim())))
    }
}

/// In-memory product store.
///
/// `set_fail_on_write` rejects every write; `fail_next_reads(n)` rejects the
/// next `n` reads, for exercising the cache's retry path.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    fail_on_write: Arc<AtomicBool>,
    failing_reads: Arc<AtomicU32>,
    reads: Arc<AtomicU32>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Number of read calls that reached this store.
    pub fn read_count(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_readable(&self) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(EngineError::Persistence(
                "product read timed out".to_string(),
            ));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(EngineError::Persistence(
                "product write rejected by backing store".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn create(&self, product: Product) -> Result<Product> {
        self.check_writable()?;
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(EngineError::Duplicate(format!("product {}", product.id)));
        }
        if !product.sku.is_empty()
            && products
                .values()
                .any(|p| p.site_id == product.site_id && p.sku == product.sku)
        {
            return Err(CatalogError::DuplicateSku {
                sku: product.sku.clone(),
                site_id: product.site_id,
            }
            .into());
        }
        products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        self.check_readable()?;
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn update(&self, product: Product) -> Result<Product> {
        self.check_writable()?;
        let mut products = self.products.write().await;
        let Some(stored) = products.get_mut(&product.id) else {
            return Err(EngineError::ProductNotFound(product.id));
        };
        *stored = product.clone();
        Ok(product)
    }

    async fn delete(&self, id: ProductId) -> Result<()> {
        self.check_writable()?;
        self.products.write().await.remove(&id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Product>> {
        self.check_readable()?;
        let mut all: Vec<_> = self.products.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(all)
    }
}
