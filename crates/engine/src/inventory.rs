//! The single stock mutation primitive.
//!
//! Manual adjustments and chain-driven movements both go through
//! [`InventoryLedger::adjust`], which serializes per product, clamps at zero,
//! rederives status and journals a [`StockMovement`].

use std::sync::Arc;

use chrono::Utc;
use common::ProductId;
use domain::{
    CatalogError, EngineConfig, Product, StockDirection, StockMovement, StockStatus,
};
use ledger::{LedgerEntry, LedgerStoreExt, StreamKey};
use crate::error::{EngineError, Result};
use crate::locks::KeyedLocks;
use crate::services::{NotificationKind, Services};
use crate::streams;

/// A requested stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    pub product_id: ProductId,
    pub quantity: u32,
    pub direction: StockDirection,
    pub reason: String,
    pub actor: String,
    /// Movements carrying a key apply at most once.
    pub idempotency_key: Option<String>,
}

impl Adjustment {
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        direction: StockDirection,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            product_id,
            quantity,
            direction,
            reason: reason.into(),
            actor: "system".to_string(),
            idempotency_key: None,
        }
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustOutcome {
    Applied {
        product: Product,
        movement: StockMovement,
    },
    /// The idempotency key was already journaled; nothing changed.
    Skipped { key: String },
}

impl AdjustOutcome {
    pub fn product(&self) -> Option<&Product> {
        match self {
            AdjustOutcome::Applied { product, .. } => Some(product),
            AdjustOutcome::Skipped { .. } => None,
        }
    }
}

pub struct InventoryLedger {
    services: Services,
    config: Arc<EngineConfig>,
    locks: KeyedLocks<ProductId>,
}

impl InventoryLedger {
    pub fn new(services: Services, config: Arc<EngineConfig>) -> Self {
        Self {
            services,
            config,
            locks: KeyedLocks::new(),
        }
    }

    /// Applies one movement.
    ///
    /// The product write happens first and the journal append second; when
    /// the append fails the product is restored and the call fails with a
    /// persistence error.
    #[tracing::instrument(skip(self), fields(product_id = %adjustment.product_id))]
    pub async fn adjust(&self, adjustment: Adjustment) -> Result<AdjustOutcome> {
        if adjustment.quantity == 0 && adjustment.direction != StockDirection::Adjust {
            return Err(CatalogError::InvalidQuantity { qty: 0 }.into());
        }

        let _guard = self.locks.lock(adjustment.product_id).await;

        if let Some(key) = &adjustment.idempotency_key
            && self.services.ledger.has_key(key).await?
        {
            tracing::debug!(%key, "stock movement already applied");
            return Ok(AdjustOutcome::Skipped { key: key.clone() });
        }

        let mut product = self
            .services
            .products
            .get(adjustment.product_id)
            .await?
            .ok_or(EngineError::ProductNotFound(adjustment.product_id))?;
        let before = product.clone();
        let now = Utc::now();
        let change = product.apply_adjustment(
            adjustment.quantity,
            adjustment.direction,
            self.config.low_stock_threshold,
            now,
        )?;

        let product = self.services.products.update(product).await.map_err(|e| {
            tracing::error!(error = %e, "stock write failed");
            e
        })?;

        let movement = StockMovement::new(
            product.id,
            product.site_id,
            product.sku.clone(),
            adjustment.direction,
            adjustment.quantity,
            change,
            adjustment.reason.clone(),
            adjustment.actor.clone(),
            now,
        );
        let mut builder = LedgerEntry::builder()
            .entry_type(StockMovement::ENTRY_TYPE)
            .stream(StreamKey::new(streams::PRODUCT, product.id))
            .timestamp(now)
            .payload(&movement)?;
        if let Some(key) = &adjustment.idempotency_key {
            builder = builder.idempotency_key(key.clone());
        }

        match self.services.ledger.append_entry(builder.build()?).await {
            Ok(outcome) if outcome.is_duplicate() => {
                self.restore(before).await;
                let key = adjustment.idempotency_key.unwrap_or_default();
                return Ok(AdjustOutcome::Skipped { key });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "stock movement not journaled, restoring product");
                metrics::counter!("wms_persistence_failures_total").increment(1);
                self.restore(before).await;
                return Err(EngineError::Persistence(format!(
                    "stock movement for {} not recorded: {e}",
                    adjustment.product_id
                )));
            }
        }

        metrics::counter!(
            "wms_stock_adjustments_total",
            "direction" => adjustment.direction.as_str()
        )
        .increment(1);
        tracing::info!(
            sku = %product.sku,
            direction = %adjustment.direction,
            previous = change.previous,
            current = change.current,
            reason = %adjustment.reason,
            "stock adjusted"
        );

        if adjustment.direction == StockDirection::Out && change.status != StockStatus::Active {
            self.services
                .notifier
                .notify(
                    NotificationKind::LowStock,
                    format!(
                        "{} ({}) is down to {} unit(s)",
                        product.name, product.sku, change.current
                    ),
                )
                .await;
        }

        Ok(AdjustOutcome::Applied { product, movement })
    }

    async fn restore(&self, before: Product) {
        let id = before.id;
        if let Err(e) = self.services.products.update(before).await {
            tracing::error!(product_id = %id, error = %e, "failed to restore product after journal failure");
        }
    }

    /// Journaled movements for one product, oldest first.
    pub async fn movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>> {
        self.services
            .ledger
            .entries_for_stream(&StreamKey::new(streams::PRODUCT, product_id))
            .await?
            .iter()
            .filter(|e| e.entry_type == StockMovement::ENTRY_TYPE)
            .map(|e| e.decode::<StockMovement>().map_err(EngineError::from))
            .collect()
    }
}
