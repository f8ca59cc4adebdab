//! Immutable configuration snapshot consumed by the engine.

use std::collections::{BTreeMap, BTreeSet};

use common::SiteId;
use serde::{Deserialize, Serialize};

use crate::catalog::default_category_prefixes;
use crate::error::DomainError;
use crate::orders::FulfillmentStrategy;
use crate::points::{
    BonusTier, RoleShare, StorePointRule, WarehousePointRule, default_role_distribution,
    default_store_rules, default_store_tiers, default_warehouse_rules, default_warehouse_tiers,
    validate_distribution, validate_tiers,
};

/// Individual (warehouse worker) points settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehousePointsConfig {
    pub enabled: bool,
    pub opted_out_sites: BTreeSet<SiteId>,
    pub eligible_roles: Vec<String>,
    pub rules: Vec<WarehousePointRule>,
    pub tiers: Vec<BonusTier>,
}

impl Default for WarehousePointsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            opted_out_sites: BTreeSet::new(),
            eligible_roles: [
                "picker",
                "dispatcher",
                "warehouse_manager",
                "inventory_specialist",
                "forklift_operator",
                "receiver",
                "packer",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            rules: default_warehouse_rules(),
            tiers: default_warehouse_tiers(),
        }
    }
}

impl WarehousePointsConfig {
    pub fn is_active_for(&self, site_id: SiteId) -> bool {
        self.enabled && !self.opted_out_sites.contains(&site_id)
    }
}

/// Team (store/POS) points settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorePointsConfig {
    pub enabled: bool,
    pub opted_out_sites: BTreeSet<SiteId>,
    pub rules: Vec<StorePointRule>,
    pub tiers: Vec<BonusTier>,
    /// Per-site overrides of `default_distribution`.
    pub role_distribution: BTreeMap<SiteId, Vec<RoleShare>>,
    pub default_distribution: Vec<RoleShare>,
}

impl Default for StorePointsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            opted_out_sites: BTreeSet::new(),
            rules: default_store_rules(),
            tiers: default_store_tiers(),
            role_distribution: BTreeMap::new(),
            default_distribution: default_role_distribution(),
        }
    }
}

impl StorePointsConfig {
    pub fn is_active_for(&self, site_id: SiteId) -> bool {
        self.enabled && !self.opted_out_sites.contains(&site_id)
    }

    pub fn distribution_for(&self, site_id: SiteId) -> &[RoleShare] {
        self.role_distribution
            .get(&site_id)
            .map_or(self.default_distribution.as_slice(), Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stock below this is `low_stock`.
    pub low_stock_threshold: u32,
    /// Active assignments (Assigned, Accepted, In-Progress) a worker may hold.
    pub max_active_assignments: usize,
    pub category_prefixes: BTreeMap<String, String>,
    pub default_strategy: FulfillmentStrategy,
    pub fulfillment_strategies: BTreeMap<SiteId, FulfillmentStrategy>,
    pub warehouse_points: WarehousePointsConfig,
    pub store_points: StorePointsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 10,
            max_active_assignments: 3,
            category_prefixes: default_category_prefixes(),
            default_strategy: FulfillmentStrategy::Nearest,
            fulfillment_strategies: BTreeMap::new(),
            warehouse_points: WarehousePointsConfig::default(),
            store_points: StorePointsConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON snapshot. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn strategy_for(&self, site_id: SiteId) -> FulfillmentStrategy {
        self.fulfillment_strategies
            .get(&site_id)
            .copied()
            .unwrap_or(self.default_strategy)
    }

    /// Checks tier ordering and that every role distribution totals 100%.
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_tiers(&self.warehouse_points.tiers)?;
        validate_tiers(&self.store_points.tiers)?;
        validate_distribution(&self.store_points.default_distribution)?;
        for distribution in self.store_points.role_distribution.values() {
            validate_distribution(distribution)?;
        }
        Ok(())
    }
}
