//! Denormalized points running totals.
//!
//! The transaction journal in the ledger is the source of truth; these
//! records exist for cheap reads and can be rebuilt from it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{EmployeeId, SiteId};
use domain::{StorePoints, WorkerPoints};
use tokio::sync::RwLock;

use crate::error::{EngineError, Result};

#[async_trait]
pub trait PointsStore: Send + Sync {
    async fn get_worker(&self, employee_id: EmployeeId) -> Result<Option<WorkerPoints>>;

    /// Inserts or replaces a worker's totals.
    async fn save_worker(&self, points: WorkerPoints) -> Result<WorkerPoints>;

    async fn get_store(&self, site_id: SiteId) -> Result<Option<StorePoints>>;

    /// Inserts or replaces a store's totals.
    async fn save_store(&self, points: StorePoints) -> Result<StorePoints>;
}

#[derive(Default)]
struct PointsState {
    workers: HashMap<EmployeeId, WorkerPoints>,
    stores: HashMap<SiteId, StorePoints>,
}

/// In-memory points store. `set_fail_on_write` rejects every save.
#[derive(Clone, Default)]
pub struct InMemoryPointsStore {
    state: Arc<RwLock<PointsState>>,
    fail_on_write: Arc<AtomicBool>,
}

impl InMemoryPointsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(EngineError::Persistence(
                "points write rejected by backing store".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PointsStore for InMemoryPointsStore {
    async fn get_worker(&self, employee_id: EmployeeId) -> Result<Option<WorkerPoints>> {
        Ok(self.state.read().await.workers.get(&employee_id).cloned())
    }

    async fn save_worker(&self, points: WorkerPoints) -> Result<WorkerPoints> {
        self.check_writable()?;
        self.state
            .write()
            .await
            .workers
            .insert(points.employee_id, points.clone());
        Ok(points)
    }

    async fn get_store(&self, site_id: SiteId) -> Result<Option<StorePoints>> {
        Ok(self.state.read().await.stores.get(&site_id).cloned())
    }

    async fn save_store(&self, points: StorePoints) -> Result<StorePoints> {
        self.check_writable()?;
        self.state
            .write()
            .await
            .stores
            .insert(points.site_id, points.clone());
        Ok(points)
    }
}
