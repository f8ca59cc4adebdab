use chrono::{DateTime, Utc};
use common::{ProductId, SiteId};
use serde::{Deserialize, Serialize};

use super::product::StockChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StockDirection {
    In,
    Out,
    /// Stocktake: sets the counted level.
    Adjust,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::In => "IN",
            StockDirection::Out => "OUT",
            StockDirection::Adjust => "ADJUST",
        }
    }
}

impl std::fmt::Display for StockDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One applied stock mutation, as written to the movement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub product_id: ProductId,
    pub site_id: SiteId,
    pub sku: String,
    pub direction: StockDirection,
    /// Requested quantity, before clamping.
    pub quantity: u32,
    pub previous_stock: u32,
    pub resulting_stock: u32,
    pub reason: String,
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl StockMovement {
    pub const ENTRY_TYPE: &'static str = "StockAdjusted";

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        product_id: ProductId,
        site_id: SiteId,
        sku: impl Into<String>,
        direction: StockDirection,
        quantity: u32,
        change: StockChange,
        reason: impl Into<String>,
        actor: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            site_id,
            sku: sku.into(),
            direction,
            quantity,
            previous_stock: change.previous,
            resulting_stock: change.current,
            reason: reason.into(),
            actor: actor.into(),
            at,
        }
    }
}
