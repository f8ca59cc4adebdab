//! Read models folded from the fulfillment ledger.
//!
//! - [`Projection`] trait for folding ledger entries into read models
//! - [`ReadModel`] trait for query access to the folded data
//! - [`ProjectionProcessor`] for feeding entries from the ledger to projections
//! - Views: points balances, per-product stock history, job chain history

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::{CatchUp, ProjectionProcessor};
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    AccountSummary, ChainHistoryView, PointsBalanceView, ProductHistory, StockHistoryView,
};
