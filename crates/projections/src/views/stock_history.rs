//! Per-product stock movement history.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ProductId, SiteId};
use domain::{StockDirection, StockMovement};
use ledger::LedgerEntry;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductHistory {
    pub product_id: ProductId,
    pub site_id: SiteId,
    pub sku: String,
    pub movements: Vec<StockMovement>,
    /// Units actually added and removed, after clamping.
    pub units_in: u64,
    pub units_out: u64,
    pub current_stock: u32,
}

impl ProductHistory {
    fn new(movement: &StockMovement) -> Self {
        Self {
            product_id: movement.product_id,
            site_id: movement.site_id,
            sku: movement.sku.clone(),
            movements: Vec::new(),
            units_in: 0,
            units_out: 0,
            current_stock: movement.previous_stock,
        }
    }

    fn apply(&mut self, movement: StockMovement) {
        let delta = i64::from(movement.resulting_stock) - i64::from(movement.previous_stock);
        if delta > 0 {
            self.units_in += delta.unsigned_abs();
        } else {
            self.units_out += delta.unsigned_abs();
        }
        self.current_stock = movement.resulting_stock;
        self.sku = movement.sku.clone();
        self.movements.push(movement);
    }
}

struct StockHistoryState {
    products: HashMap<ProductId, ProductHistory>,
    position: ProjectionPosition,
}

/// Folds `StockAdjusted` entries into a history per product.
#[derive(Clone)]
pub struct StockHistoryView {
    state: Arc<RwLock<StockHistoryState>>,
}

impl StockHistoryView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StockHistoryState {
                products: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn history(&self, product_id: &ProductId) -> Option<ProductHistory> {
        self.state.read().await.products.get(product_id).cloned()
    }

    pub async fn movements_for_site(&self, site_id: SiteId) -> Vec<StockMovement> {
        let state = self.state.read().await;
        let mut movements: Vec<_> = state
            .products
            .values()
            .filter(|h| h.site_id == site_id)
            .flat_map(|h| h.movements.iter().cloned())
            .collect();
        movements.sort_by_key(|m| m.at);
        movements
    }

    /// Movements in one direction with a given reason, e.g. every "Putaway" IN.
    pub async fn movements_by_reason(
        &self,
        direction: StockDirection,
        reason: &str,
    ) -> Vec<StockMovement> {
        let state = self.state.read().await;
        state
            .products
            .values()
            .flat_map(|h| h.movements.iter())
            .filter(|m| m.direction == direction && m.reason == reason)
            .cloned()
            .collect()
    }
}

impl Default for StockHistoryView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for StockHistoryView {
    fn name(&self) -> &'static str {
        "StockHistoryView"
    }

    async fn handle(&self, entry: &LedgerEntry) -> Result<()> {
        let movement = if entry.entry_type == StockMovement::ENTRY_TYPE {
            Some(entry.decode::<StockMovement>()?)
        } else {
            None
        };

        let mut state = self.state.write().await;
        if let Some(movement) = movement {
            state
                .products
                .entry(movement.product_id)
                .or_insert_with(|| ProductHistory::new(&movement))
                .apply(movement);
        }
        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for StockHistoryView {
    fn name(&self) -> &'static str {
        "StockHistoryView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.products.len()).unwrap_or(0)
    }
}
