//! Fulfillment orchestration core.
//!
//! - [`ReleasePlanner`] turns sales, transfers and PO receipts into jobs
//! - [`ChainEngine`] completes jobs and fires the PICK → PACK → DISPATCH chain
//! - [`InventoryLedger`] is the single stock mutation primitive
//! - [`AssignmentScheduler`] binds workers to jobs under a concurrency limit
//! - [`PointsEngine`] awards worker and store points from the journal
//!
//! Everything talks to its collaborators through the traits in [`services`];
//! [`services::InMemoryServices`] wires in-memory implementations of all of them.

pub mod cache;
pub mod chain;
pub mod error;
pub mod inventory;
pub mod jobs;
mod locks;
pub mod points;
pub mod release;
pub mod scheduler;
pub mod services;

use std::sync::Arc;

use domain::EngineConfig;

pub use cache::{CachedProductStore, RetryConfig};
pub use chain::{ChainEngine, ChainOutcome, CompletionReport};
pub use error::{EngineError, ErrorKind, Result};
pub use inventory::{AdjustOutcome, Adjustment, InventoryLedger};
pub use jobs::{CreateOutcome, JobRepository};
pub use points::{PointsEngine, Reconciliation, StoreAward, WorkerAward};
pub use release::{
    PutawayQueued, Receipt, ReceiptLine, ReceiveOutcome, ReleaseOutcome, ReleasePlanner,
    SaleParked, SaleReleased,
};
pub use scheduler::AssignmentScheduler;
pub use services::{InMemoryServices, Services};

/// Ledger stream kinds written by the engine.
pub mod streams {
    /// `product:<id>`: stock movements.
    pub const PRODUCT: &str = "product";
    /// `job:<id>`: the chain record of a completed job.
    pub const JOB: &str = "job";
    /// `receipt:<po id>`: putaway queued per PO line and receipt.
    pub const RECEIPT: &str = "receipt";
    /// `release:<sale id>`: parking and release of a sale.
    pub const RELEASE: &str = "release";
    /// `worker:<employee id>`: worker points journal.
    pub const WORKER: &str = "worker";
    /// `store:<site id>`: store points journal.
    pub const STORE: &str = "store";
}

/// All engine components over one set of collaborators.
pub struct FulfillmentEngine {
    pub inventory: Arc<InventoryLedger>,
    pub jobs: JobRepository,
    pub release: ReleasePlanner,
    pub chain: ChainEngine,
    pub scheduler: AssignmentScheduler,
    pub points: Arc<PointsEngine>,
    services: Services,
    config: Arc<EngineConfig>,
}

impl FulfillmentEngine {
    pub fn new(services: Services, config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let inventory = Arc::new(InventoryLedger::new(services.clone(), config.clone()));
        let points = Arc::new(PointsEngine::new(services.clone(), config.clone()));
        Self {
            jobs: JobRepository::new(services.clone()),
            release: ReleasePlanner::new(services.clone(), config.clone()),
            chain: ChainEngine::new(services.clone(), inventory.clone(), points.clone()),
            scheduler: AssignmentScheduler::new(services.clone(), config.clone()),
            inventory,
            points,
            services,
            config,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
