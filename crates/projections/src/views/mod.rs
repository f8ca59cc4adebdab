//! Read model views folded from the ledger.

pub mod chain_history;
pub mod points_balance;
pub mod stock_history;

pub use chain_history::ChainHistoryView;
pub use points_balance::{AccountSummary, PointsBalanceView};
pub use stock_history::{ProductHistory, StockHistoryView};
