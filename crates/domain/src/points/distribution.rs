//! Splitting a store's bonus pool across job roles.

use serde::{Deserialize, Serialize};

use super::PointsConfigError;
use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleShare {
    pub role: String,
    pub percentage: u32,
}

impl RoleShare {
    pub fn new(role: impl Into<String>, percentage: u32) -> Self {
        Self {
            role: role.into(),
            percentage,
        }
    }
}

pub fn default_role_distribution() -> Vec<RoleShare> {
    vec![
        RoleShare::new("Store Manager", 30),
        RoleShare::new("Assistant Manager", 20),
        RoleShare::new("Senior Cashier", 15),
        RoleShare::new("Cashier", 12),
        RoleShare::new("Sales Associate", 10),
        RoleShare::new("Stock Clerk", 8),
        RoleShare::new("Support Staff", 5),
    ]
}

/// A role's cut of `estimated_bonus`. Roles missing from the table get nothing.
pub fn share_for(distribution: &[RoleShare], role: &str, estimated_bonus: Money) -> Money {
    distribution
        .iter()
        .find(|share| share.role.eq_ignore_ascii_case(role))
        .map_or(Money::zero(), |share| estimated_bonus.percent(share.percentage))
}

/// Percentages must add up to exactly 100.
pub fn validate_distribution(distribution: &[RoleShare]) -> Result<(), PointsConfigError> {
    let total: u32 = distribution.iter().map(|share| share.percentage).sum();
    if total != 100 {
        return Err(PointsConfigError::DistributionTotal { total });
    }
    Ok(())
}
