//! Point rules and the pure scoring functions over them.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::job::{JobType, WmsJob};
use crate::money::Money;
use crate::orders::{Sale, SaleLine};

/// Actions a warehouse rule can be keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarehouseAction {
    #[serde(rename = "PICK")]
    Pick,
    #[serde(rename = "PACK")]
    Pack,
    #[serde(rename = "PUTAWAY")]
    Putaway,
    #[serde(rename = "TRANSFER")]
    Transfer,
    #[serde(rename = "DISPATCH")]
    Dispatch,
    #[serde(rename = "ITEM_BONUS")]
    ItemBonus,
    #[serde(rename = "ACCURACY_100")]
    Accuracy100,
    #[serde(rename = "STREAK_3")]
    Streak3,
    #[serde(rename = "STREAK_7")]
    Streak7,
    #[serde(rename = "STREAK_30")]
    Streak30,
}

impl WarehouseAction {
    pub fn for_job_type(job_type: JobType) -> Self {
        match job_type {
            JobType::Pick => WarehouseAction::Pick,
            JobType::Pack => WarehouseAction::Pack,
            JobType::Putaway => WarehouseAction::Putaway,
            JobType::Transfer => WarehouseAction::Transfer,
            JobType::Dispatch => WarehouseAction::Dispatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehousePointRule {
    pub action: WarehouseAction,
    pub points: u32,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
}

impl WarehousePointRule {
    pub fn new(action: WarehouseAction, points: u32, description: impl Into<String>) -> Self {
        Self {
            action,
            points,
            enabled: true,
            description: description.into(),
        }
    }
}

fn enabled() -> bool {
    true
}

pub fn default_warehouse_rules() -> Vec<WarehousePointRule> {
    use WarehouseAction::*;
    vec![
        WarehousePointRule::new(Pick, 15, "Complete a pick job"),
        WarehousePointRule::new(Pack, 10, "Complete a pack job"),
        WarehousePointRule::new(Putaway, 8, "Complete a putaway job"),
        WarehousePointRule::new(Transfer, 10, "Complete a transfer job"),
        WarehousePointRule::new(Dispatch, 8, "Complete a dispatch job"),
        WarehousePointRule::new(ItemBonus, 2, "Per line item handled"),
        WarehousePointRule::new(Accuracy100, 50, "Every item picked in full"),
        WarehousePointRule::new(Streak3, 25, "3 day streak"),
        WarehousePointRule::new(Streak7, 75, "7 day streak"),
        WarehousePointRule::new(Streak30, 300, "30 day streak"),
    ]
}

/// Points for an action; zero when no enabled rule is configured.
pub fn rule_points(rules: &[WarehousePointRule], action: WarehouseAction) -> u32 {
    rules
        .iter()
        .find(|rule| rule.enabled && rule.action == action)
        .map_or(0, |rule| rule.points)
}

/// Breakdown of a job completion award.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPoints {
    pub base: u32,
    pub item_bonus: u32,
    pub accuracy_bonus: u32,
}

impl JobPoints {
    pub fn total(&self) -> u32 {
        self.base + self.item_bonus + self.accuracy_bonus
    }
}

/// Scores a completed job. Any `Short` line forfeits the accuracy bonus.
pub fn job_points(rules: &[WarehousePointRule], job: &WmsJob) -> JobPoints {
    let items = u32::try_from(job.line_items.len()).unwrap_or(u32::MAX);
    JobPoints {
        base: rule_points(rules, WarehouseAction::for_job_type(job.job_type)),
        item_bonus: items.saturating_mul(rule_points(rules, WarehouseAction::ItemBonus)),
        accuracy_bonus: if job.all_items_picked() {
            rule_points(rules, WarehouseAction::Accuracy100)
        } else {
            0
        },
    }
}

/// Streak rule unlocked by reaching exactly `streak` days.
pub fn streak_action(streak: u32) -> Option<WarehouseAction> {
    match streak {
        3 => Some(WarehouseAction::Streak3),
        7 => Some(WarehouseAction::Streak7),
        30 => Some(WarehouseAction::Streak30),
        _ => None,
    }
}

/// Per-unit scoring terms shared by product, category and quantity rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTerms {
    pub points_per_unit: u32,
    /// Applied when `min_quantity` is met, or always when it is unset.
    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default)]
    pub min_quantity: Option<u32>,
    #[serde(default)]
    pub max_points_per_transaction: Option<u64>,
}

impl UnitTerms {
    pub fn per_unit(points_per_unit: u32) -> Self {
        Self {
            points_per_unit,
            multiplier: None,
            min_quantity: None,
            max_points_per_transaction: None,
        }
    }

    pub fn line_points(&self, quantity: u32) -> u64 {
        if let Some(min) = self.min_quantity
            && quantity < min
        {
            return 0;
        }
        let base = u64::from(quantity) * u64::from(self.points_per_unit);
        let scaled = match self.multiplier {
            Some(m) if m >= 0.0 => (base as f64 * m).floor() as u64,
            _ => base,
        };
        match self.max_points_per_transaction {
            Some(max) => scaled.min(max),
            None => scaled,
        }
    }
}

/// Store (POS) rule. Line rules match from most to least specific:
/// product, then category, then the catch-all quantity rule. Revenue rules
/// score the whole sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorePointRule {
    Product {
        product_id: ProductId,
        #[serde(flatten)]
        terms: UnitTerms,
        #[serde(default)]
        priority: u32,
        #[serde(default = "enabled")]
        enabled: bool,
    },
    Category {
        category: String,
        #[serde(flatten)]
        terms: UnitTerms,
        #[serde(default)]
        priority: u32,
        #[serde(default = "enabled")]
        enabled: bool,
    },
    Quantity {
        #[serde(flatten)]
        terms: UnitTerms,
        #[serde(default)]
        priority: u32,
        #[serde(default = "enabled")]
        enabled: bool,
    },
    Revenue {
        threshold: Money,
        points: u32,
        #[serde(default)]
        priority: u32,
        #[serde(default = "enabled")]
        enabled: bool,
    },
}

impl StorePointRule {
    pub fn is_enabled(&self) -> bool {
        match self {
            StorePointRule::Product { enabled, .. }
            | StorePointRule::Category { enabled, .. }
            | StorePointRule::Quantity { enabled, .. }
            | StorePointRule::Revenue { enabled, .. } => *enabled,
        }
    }

    pub fn priority(&self) -> u32 {
        match self {
            StorePointRule::Product { priority, .. }
            | StorePointRule::Category { priority, .. }
            | StorePointRule::Quantity { priority, .. }
            | StorePointRule::Revenue { priority, .. } => *priority,
        }
    }

    fn match_rank(&self, line: &SaleLine) -> Option<(u8, &UnitTerms)> {
        match self {
            StorePointRule::Product {
                product_id, terms, ..
            } if *product_id == line.product_id => Some((2, terms)),
            StorePointRule::Category {
                category, terms, ..
            } if category.eq_ignore_ascii_case(&line.category) => Some((1, terms)),
            StorePointRule::Quantity { terms, .. } => Some((0, terms)),
            _ => None,
        }
    }
}

pub fn default_store_rules() -> Vec<StorePointRule> {
    vec![
        StorePointRule::Quantity {
            terms: UnitTerms::per_unit(1),
            priority: 1,
            enabled: true,
        },
        StorePointRule::Revenue {
            threshold: Money::from_units(100),
            points: 1,
            priority: 2,
            enabled: true,
        },
        StorePointRule::Category {
            category: "Electronics".to_string(),
            terms: UnitTerms::per_unit(5),
            priority: 3,
            enabled: true,
        },
        StorePointRule::Category {
            category: "Groceries".to_string(),
            terms: UnitTerms::per_unit(2),
            priority: 3,
            enabled: true,
        },
    ]
}

/// Most specific enabled rule for a cart line, highest priority first
/// within the same specificity.
pub fn matching_rule<'a>(rules: &'a [StorePointRule], line: &SaleLine) -> Option<&'a UnitTerms> {
    rules
        .iter()
        .filter(|rule| rule.is_enabled())
        .filter_map(|rule| rule.match_rank(line).map(|(rank, terms)| (rank, rule.priority(), terms)))
        .max_by_key(|(rank, priority, _)| (*rank, *priority))
        .map(|(_, _, terms)| terms)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalePoints {
    pub line_points: u64,
    pub revenue_points: u64,
    pub total: u64,
}

/// Scores a sale. A non-empty cart always earns at least one point.
pub fn sale_points(rules: &[StorePointRule], sale: &Sale) -> SalePoints {
    let line_points: u64 = sale
        .lines
        .iter()
        .filter_map(|line| matching_rule(rules, line).map(|terms| terms.line_points(line.quantity)))
        .sum();

    let subtotal = sale.subtotal();
    let revenue_points: u64 = rules
        .iter()
        .filter(|rule| rule.is_enabled())
        .filter_map(|rule| match rule {
            StorePointRule::Revenue {
                threshold, points, ..
            } => Some(subtotal.whole_multiples_of(*threshold) * u64::from(*points)),
            _ => None,
        })
        .sum();

    let mut total = line_points + revenue_points;
    if sale.total_units() > 0 {
        total = total.max(1);
    }

    SalePoints {
        line_points,
        revenue_points,
        total,
    }
}
