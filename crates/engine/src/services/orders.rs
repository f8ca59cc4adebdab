//! Sales, transfers and purchase orders.
//!
//! The engine only mutates their status fields; everything else is owned by
//! the surrounding system.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{PurchaseOrderId, SaleId, TransferId};
use domain::{PurchaseOrder, Sale, TransferRecord};
use tokio::sync::RwLock;

use crate::error::{EngineError, Result};

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_sale(&self, sale: Sale) -> Result<Sale>;
    async fn get_sale(&self, id: SaleId) -> Result<Option<Sale>>;
    async fn update_sale(&self, sale: Sale) -> Result<Sale>;

    async fn create_transfer(&self, transfer: TransferRecord) -> Result<TransferRecord>;
    async fn get_transfer(&self, id: TransferId) -> Result<Option<TransferRecord>>;
    async fn update_transfer(&self, transfer: TransferRecord) -> Result<TransferRecord>;

    async fn create_purchase_order(&self, po: PurchaseOrder) -> Result<PurchaseOrder>;
    async fn get_purchase_order(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>>;
    async fn update_purchase_order(&self, po: PurchaseOrder) -> Result<PurchaseOrder>;
}

#[derive(Default)]
struct OrderState {
    sales: HashMap<SaleId, Sale>,
    transfers: HashMap<TransferId, TransferRecord>,
    purchase_orders: HashMap<PurchaseOrderId, PurchaseOrder>,
}

/// In-memory order store. `set_fail_on_write` rejects every write.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<OrderState>>,
    fail_on_write: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(EngineError::Persistence(
                "order write rejected by backing store".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_sale(&self, sale: Sale) -> Result<Sale> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if state.sales.contains_key(&sale.id) {
            return Err(EngineError::Duplicate(format!("sale {}", sale.id)));
        }
        state.sales.insert(sale.id, sale.clone());
        Ok(sale)
    }

    async fn get_sale(&self, id: SaleId) -> Result<Option<Sale>> {
        Ok(self.state.read().await.sales.get(&id).cloned())
    }

    async fn update_sale(&self, sale: Sale) -> Result<Sale> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let Some(stored) = state.sales.get_mut(&sale.id) else {
            return Err(EngineError::SaleNotFound(sale.id));
        };
        *stored = sale.clone();
        Ok(sale)
    }

    async fn create_transfer(&self, transfer: TransferRecord) -> Result<TransferRecord> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if state.transfers.contains_key(&transfer.id) {
            return Err(EngineError::Duplicate(format!("transfer {}", transfer.id)));
        }
        state.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&self, id: TransferId) -> Result<Option<TransferRecord>> {
        Ok(self.state.read().await.transfers.get(&id).cloned())
    }

    async fn update_transfer(&self, transfer: TransferRecord) -> Result<TransferRecord> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let Some(stored) = state.transfers.get_mut(&transfer.id) else {
            return Err(EngineError::TransferNotFound(transfer.id));
        };
        *stored = transfer.clone();
        Ok(transfer)
    }

    async fn create_purchase_order(&self, po: PurchaseOrder) -> Result<PurchaseOrder> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if state.purchase_orders.contains_key(&po.id) {
            return Err(EngineError::Duplicate(format!("purchase order {}", po.id)));
        }
        state.purchase_orders.insert(po.id, po.clone());
        Ok(po)
    }

    async fn get_purchase_order(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrder>> {
        Ok(self.state.read().await.purchase_orders.get(&id).cloned())
    }

    async fn update_purchase_order(&self, po: PurchaseOrder) -> Result<PurchaseOrder> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let Some(stored) = state.purchase_orders.get_mut(&po.id) else {
            return Err(EngineError::PurchaseOrderNotFound(po.id));
        };
        *stored = po.clone();
        Ok(po)
    }
}
