//! Bonus tiers and worker levels.

use serde::{Deserialize, Serialize};

use super::PointsConfigError;
use crate::money::Money;

/// A monthly points range `[min_points, max_points)` mapped to a flat bonus
/// plus a marginal amount per point. `max_points = None` is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusTier {
    pub name: String,
    pub min_points: u64,
    pub max_points: Option<u64>,
    pub bonus_amount: Money,
    pub bonus_per_point: Money,
}

impl BonusTier {
    pub fn new(
        name: impl Into<String>,
        min_points: u64,
        max_points: Option<u64>,
        bonus_amount: Money,
        bonus_per_point: Money,
    ) -> Self {
        Self {
            name: name.into(),
            min_points,
            max_points,
            bonus_amount,
            bonus_per_point,
        }
    }

    pub fn contains(&self, points: u64) -> bool {
        points >= self.min_points && self.max_points.is_none_or(|max| points < max)
    }
}

/// Tier for a monthly total: the first tier containing it, else the highest
/// tier starting at or below it.
pub fn find_tier(tiers: &[BonusTier], points: u64) -> Option<&BonusTier> {
    tiers.iter().find(|tier| tier.contains(points)).or_else(|| {
        tiers
            .iter()
            .filter(|tier| tier.min_points <= points)
            .max_by_key(|tier| tier.min_points)
    })
}

pub fn estimated_bonus(tier: &BonusTier, monthly_points: u64) -> Money {
    tier.bonus_amount + tier.bonus_per_point.multiply(monthly_points)
}

/// Tiers must be sorted by `min_points`, well-formed and non-overlapping, and
/// only the last may be unbounded.
pub fn validate_tiers(tiers: &[BonusTier]) -> Result<(), PointsConfigError> {
    for (index, tier) in tiers.iter().enumerate() {
        if let Some(max) = tier.max_points
            && max <= tier.min_points
        {
            return Err(PointsConfigError::InvalidTierRange {
                name: tier.name.clone(),
            });
        }

        let Some(next) = tiers.get(index + 1) else {
            continue;
        };
        if next.min_points <= tier.min_points {
            return Err(PointsConfigError::TiersOutOfOrder {
                name: next.name.clone(),
            });
        }
        match tier.max_points {
            None => {
                return Err(PointsConfigError::UnboundedTierNotLast {
                    name: tier.name.clone(),
                });
            }
            Some(max) if max > next.min_points => {
                return Err(PointsConfigError::OverlappingTiers {
                    lower: tier.name.clone(),
                    upper: next.name.clone(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn tier(name: &str, min: u64, max: Option<u64>, amount_units: i64, per_point_cents: i64) -> BonusTier {
    BonusTier::new(
        name,
        min,
        max,
        Money::from_units(amount_units),
        Money::from_cents(per_point_cents),
    )
}

pub fn default_warehouse_tiers() -> Vec<BonusTier> {
    vec![
        tier("Training", 0, Some(100), 0, 0),
        tier("Bronze", 100, Some(300), 500, 50),
        tier("Silver", 300, Some(600), 1200, 75),
        tier("Gold", 600, Some(1000), 2500, 100),
        tier("Platinum", 1000, Some(2000), 5000, 125),
        tier("Diamond", 2000, None, 10000, 150),
    ]
}

pub fn default_store_tiers() -> Vec<BonusTier> {
    vec![
        tier("Starting", 0, Some(500), 0, 0),
        tier("Bronze", 500, Some(1500), 2000, 50),
        tier("Silver", 1500, Some(3000), 5000, 75),
        tier("Gold", 3000, Some(6000), 10000, 100),
        tier("Platinum", 6000, Some(10000), 20000, 125),
        tier("Diamond", 10000, None, 40000, 150),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub level: u8,
    pub title: &'static str,
    pub min_points: u64,
}

const fn level(level: u8, title: &'static str, min_points: u64) -> Level {
    Level {
        level,
        title,
        min_points,
    }
}

/// Fixed level table, ascending by threshold.
pub const LEVELS: [Level; 10] = [
    level(1, "Rookie", 0),
    level(2, "Apprentice", 100),
    level(3, "Worker", 300),
    level(4, "Skilled", 600),
    level(5, "Expert", 1000),
    level(6, "Pro", 2000),
    level(7, "Master", 4000),
    level(8, "Elite", 7000),
    level(9, "Champion", 12000),
    level(10, "Legend", 20000),
];

/// Highest level whose threshold does not exceed `total_points`.
pub fn level_for(total_points: u64) -> &'static Level {
    LEVELS
        .iter()
        .rev()
        .find(|level| level.min_points <= total_points)
        .unwrap_or(&LEVELS[0])
}
