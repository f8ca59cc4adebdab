//! Individual and team points ledgers, their rules and bonus tiers.

pub mod balance;
pub mod distribution;
pub mod rules;
pub mod tiers;
pub mod transaction;

pub use balance::{PointsBalance, StorePoints, WorkerPoints};
pub use distribution::{RoleShare, default_role_distribution, share_for, validate_distribution};
pub use rules::{
    JobPoints, SalePoints, StorePointRule, UnitTerms, WarehouseAction, WarehousePointRule,
    default_store_rules, default_warehouse_rules, job_points, matching_rule, rule_points,
    sale_points, streak_action,
};
pub use tiers::{
    BonusTier, LEVELS, Level, default_store_tiers, default_warehouse_tiers, estimated_bonus,
    find_tier, level_for, validate_tiers,
};
pub use transaction::{PointsAccount, PointsTransaction, TransactionKind};

use thiserror::Error;

/// Configuration-time violations in tiers or role distributions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointsConfigError {
    #[error("Bonus tier {name} has an empty or inverted range")]
    InvalidTierRange { name: String },

    #[error("Bonus tier {name} is out of order")]
    TiersOutOfOrder { name: String },

    #[error("Bonus tiers {lower} and {upper} overlap")]
    OverlappingTiers { lower: String, upper: String },

    #[error("Unbounded bonus tier {name} must be the last tier")]
    UnboundedTierNotLast { name: String },

    #[error("Role distribution must total 100%, got {total}%")]
    DistributionTotal { total: u32 },
}
