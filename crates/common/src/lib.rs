//! Shared identifier types used across the fulfillment workspace.

pub mod types;

pub use types::{
    AssignmentId, EmployeeId, JobId, OrderRef, ProductId, PurchaseOrderId, SaleId, SiteId,
    TransactionId, TransferId,
};
