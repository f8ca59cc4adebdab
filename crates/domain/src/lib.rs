//! Domain layer for the fulfillment engine.
//!
//! Pure entities and policies, no I/O:
//! - Warehouse jobs, line items and worker assignments with their state rules
//! - Products, stock arithmetic and SKU/barcode resolution
//! - Sales, transfers and purchase orders that seed job chains
//! - Points balances, point rules, bonus tiers, levels and role distribution
//! - The engine configuration snapshot

pub mod catalog;
pub mod config;
pub mod employee;
pub mod error;
pub mod job;
pub mod money;
pub mod orders;
pub mod points;

pub use catalog::{
    BarcodeType, CatalogError, Product, SkuDecision, SkuRequest, SkuResolution, SkuSource,
    StockChange, StockDirection, StockMovement, StockStatus,
};
pub use config::{EngineConfig, StorePointsConfig, WarehousePointsConfig};
pub use employee::Employee;
pub use error::{DomainError, Result};
pub use job::{
    AssignmentStatus, ItemStatus, JobAssignment, JobCompletion, JobError, JobItem, JobStatus,
    JobType, Priority, WmsJob, WmsJobBuilder,
};
pub use money::Money;
pub use orders::{
    FulfillmentPlan, FulfillmentStatus, FulfillmentStrategy, PlanAssignment, PlannedItem, PoLine,
    PoStatus, PurchaseOrder, Sale, SaleLine, TransferLine, TransferRecord, TransferStatus,
};
pub use points::{
    BonusTier, PointsAccount, PointsBalance, PointsConfigError, PointsTransaction, RoleShare,
    StorePointRule, StorePoints, TransactionKind, WarehouseAction, WarehousePointRule,
    WorkerPoints,
};
