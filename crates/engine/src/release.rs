//! Order Release Planner: turns sales, transfers and purchase-order
//! receipts into the first job of each chain.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{JobId, OrderRef, ProductId, PurchaseOrderId, SaleId, TransferId};
use domain::catalog::resolve_sku;
use domain::{
    EngineConfig, FulfillmentPlan, FulfillmentStatus, JobItem, JobType, PoLine, PoStatus, Product,
    PurchaseOrder, Sale, SkuDecision, SkuRequest, TransferStatus, WmsJob,
};
use ledger::{AppendOutcome, LedgerEntry, LedgerStoreExt, StreamKey};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::jobs::{CreateOutcome, JobRepository};
use crate::services::Services;
use crate::streams;

/// A PO line's quantity handed to putaway by one receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutawayQueued {
    pub purchase_order_id: PurchaseOrderId,
    pub receipt_id: String,
    pub line_id: u32,
    pub product_id: ProductId,
    pub job_id: JobId,
    pub quantity: u32,
    pub at: DateTime<Utc>,
}

impl PutawayQueued {
    pub const ENTRY_TYPE: &'static str = "PutawayQueued";

    pub fn idempotency_key(po_id: PurchaseOrderId, line_id: u32, receipt_id: &str) -> String {
        format!("putaway:{po_id}:{line_id}:{receipt_id}")
    }
}

/// A sale held for an operator under the Manual strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleParked {
    pub sale_id: SaleId,
    pub at: DateTime<Utc>,
}

impl SaleParked {
    pub const ENTRY_TYPE: &'static str = "SaleParked";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReleased {
    pub sale_id: SaleId,
    pub jobs: Vec<JobId>,
    pub at: DateTime<Utc>,
}

impl SaleReleased {
    pub const ENTRY_TYPE: &'static str = "SaleReleased";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub line_id: u32,
    pub quantity: u32,
    /// Value scanned at the dock, used as the SKU when present.
    #[serde(default)]
    pub scanned: Option<String>,
    #[serde(default)]
    pub sku_decision: Option<SkuDecision>,
}

/// One delivery against a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub purchase_order_id: PurchaseOrderId,
    /// Caller-chosen delivery reference; repeating it repeats nothing.
    pub receipt_id: String,
    pub lines: Vec<ReceiptLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveOutcome {
    pub jobs: Vec<WmsJob>,
    /// Lines this receipt had already queued.
    pub skipped_lines: Vec<u32>,
    pub po_status: PoStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    Released(Vec<WmsJob>),
    /// Held for an operator; see [`ReleasePlanner::release_parked`].
    Parked,
}

pub struct ReleasePlanner {
    services: Services,
    config: Arc<EngineConfig>,
    jobs: JobRepository,
}

impl ReleasePlanner {
    pub fn new(services: Services, config: Arc<EngineConfig>) -> Self {
        Self {
            jobs: JobRepository::new(services.clone()),
            services,
            config,
        }
    }

    /// Queues putaway for each received line.
    ///
    /// The receipt is validated as a whole before anything is written. Lines
    /// this receipt already queued are skipped. The PO becomes Received once
    /// every line's queued total covers its ordered quantity.
    #[tracing::instrument(skip(self, receipt), fields(po = %receipt.purchase_order_id, receipt = %receipt.receipt_id))]
    pub async fn receive_purchase_order(&self, receipt: Receipt) -> Result<ReceiveOutcome> {
        let po = self
            .services
            .orders
            .get_purchase_order(receipt.purchase_order_id)
            .await?
            .ok_or(EngineError::PurchaseOrderNotFound(receipt.purchase_order_id))?;
        if !po.status.can_receive() {
            return Err(EngineError::precondition(format!(
                "purchase order is {} and cannot be received",
                po.status
            )));
        }
        if receipt.lines.is_empty() {
            return Err(EngineError::precondition("receipt has no lines"));
        }

        let queued = self.queued_quantities(po.id).await?;
        let mut seen = HashSet::new();
        let mut skipped_lines = Vec::new();
        let mut pending = Vec::new();

        for line in &receipt.lines {
            if !seen.insert(line.line_id) {
                return Err(EngineError::precondition(format!(
                    "line {} appears twice in the receipt",
                    line.line_id
                )));
            }
            let po_line = po.line(line.line_id).ok_or_else(|| {
                EngineError::precondition(format!("purchase order has no line {}", line.line_id))
            })?;
            let key = PutawayQueued::idempotency_key(po.id, line.line_id, &receipt.receipt_id);
            if self.services.ledger.has_key(&key).await? {
                skipped_lines.push(line.line_id);
                continue;
            }
            if line.quantity == 0 {
                return Err(EngineError::precondition(format!(
                    "line {} has a zero received quantity",
                    line.line_id
                )));
            }
            let outstanding = po_line
                .quantity_ordered
                .saturating_sub(queued.get(&line.line_id).copied().unwrap_or(0));
            if line.quantity > outstanding {
                return Err(EngineError::precondition(format!(
                    "line {} receives {} but only {outstanding} are outstanding",
                    line.line_id, line.quantity
                )));
            }
            pending.push((po_line, line, key));
        }

        let mut jobs = Vec::with_capacity(pending.len());
        for (po_line, line, key) in pending {
            let product = self.receiving_product(&po, po_line, line).await?;
            let job = WmsJob::builder(po.site_id, JobType::Putaway)
                .id(JobId::derived(&key))
                .order_ref(OrderRef::PurchaseOrder(po.id))
                .item(JobItem::new(product.id, product.sku.clone(), line.quantity))
                .build()?;
            let job = self.jobs.create(job).await?.into_job();

            let record = PutawayQueued {
                purchase_order_id: po.id,
                receipt_id: receipt.receipt_id.clone(),
                line_id: line.line_id,
                product_id: product.id,
                job_id: job.id,
                quantity: line.quantity,
                at: Utc::now(),
            };
            let entry = LedgerEntry::builder()
                .entry_type(PutawayQueued::ENTRY_TYPE)
                .stream(StreamKey::new(streams::RECEIPT, po.id))
                .idempotency_key(key)
                .timestamp(record.at)
                .payload(&record)?
                .build()?;
            self.services.ledger.append_entry(entry).await?;
            tracing::info!(line = line.line_id, sku = %product.sku, qty = line.quantity, "putaway queued");
            jobs.push(job);
        }

        let queued = self.queued_quantities(po.id).await?;
        let fully_received = po.lines.iter().all(|line| {
            queued.get(&line.line_id).copied().unwrap_or(0) >= line.quantity_ordered
        });
        let mut po = po;
        if fully_received {
            po.status = PoStatus::Received;
            po = self.services.orders.update_purchase_order(po).await?;
            tracing::info!("purchase order fully received");
        }

        metrics::counter!("wms_receipt_lines_total").increment(jobs.len() as u64);
        Ok(ReceiveOutcome {
            jobs,
            skipped_lines,
            po_status: po.status,
        })
    }

    /// Received quantity per PO line, summed over every receipt.
    pub async fn queued_quantities(&self, po_id: PurchaseOrderId) -> Result<HashMap<u32, u32>> {
        let entries = self
            .services
            .ledger
            .entries_for_stream(&StreamKey::new(streams::RECEIPT, po_id))
            .await?;
        let mut totals = HashMap::new();
        for entry in entries
            .iter()
            .filter(|e| e.entry_type == PutawayQueued::ENTRY_TYPE)
        {
            let record: PutawayQueued = entry.decode()?;
            *totals.entry(record.line_id).or_insert(0) += record.quantity;
        }
        Ok(totals)
    }

    /// Finds or creates the receiving site's product for a PO line and
    /// settles its SKU against the live catalog.
    async fn receiving_product(
        &self,
        po: &PurchaseOrder,
        po_line: &PoLine,
        line: &ReceiptLine,
    ) -> Result<Product> {
        let products = &self.services.products;
        let now = Utc::now();

        let (mut product, is_new) = match po_line.product_id {
            Some(product_id) => {
                let listed = products
                    .get(product_id)
                    .await?
                    .ok_or(EngineError::ProductNotFound(product_id))?;
                if listed.site_id == po.site_id {
                    (listed, false)
                } else if let Some(local) = products.find_by_sku(po.site_id, &listed.sku).await? {
                    (local, false)
                } else {
                    (listed.clone_for_site(po.site_id, now), true)
                }
            }
            None => match products.find_by_name(po.site_id, &po_line.name).await? {
                Some(existing) => (existing, false),
                None => (
                    Product::new(
                        po.site_id,
                        po_line.name.trim(),
                        "",
                        po_line.category.clone(),
                        now,
                    ),
                    true,
                ),
            },
        };

        let catalog = products.list().await?;
        let resolution = resolve_sku(
            &SkuRequest {
                existing: Some(product.sku.as_str()),
                category: &product.category,
                scanned: line.scanned.as_deref(),
                decision: line.sku_decision,
                supplier_sku: po_line.supplier_sku.as_deref(),
            },
            catalog.iter().map(|p| p.sku.as_str()),
            &self.config.category_prefixes,
        );

        let mut changed = false;
        if resolution.dirty && resolution.sku != product.sku {
            tracing::info!(from = %product.sku, to = %resolution.sku, source = ?resolution.source, "sku resolved");
            product.sku = resolution.sku;
            changed = true;
        }
        if let Some((code, kind)) = resolution.barcode {
            product.barcode = Some(code);
            product.barcode_type = Some(kind);
            changed = true;
        }

        if is_new {
            products.create(product).await
        } else if changed {
            product.updated_at = now;
            products.update(product).await
        } else {
            Ok(product)
        }
    }

    /// Releases a pending sale per its site's fulfillment strategy.
    #[tracing::instrument(skip(self))]
    pub async fn release_sale(&self, sale_id: SaleId) -> Result<ReleaseOutcome> {
        let sale = self.pending_sale(sale_id).await?;
        let strategy = self.config.strategy_for(sale.site_id);
        if strategy.defers_release() {
            self.park(&sale).await?;
            return Ok(ReleaseOutcome::Parked);
        }

        let plan = self
            .services
            .planner
            .plan(sale.site_id, strategy, &sale.lines)
            .await?;
        self.release_with_plan(sale, &plan)
            .await
            .map(ReleaseOutcome::Released)
    }

    /// Releases a parked sale with an operator-supplied plan.
    #[tracing::instrument(skip(self, plan))]
    pub async fn release_parked(
        &self,
        sale_id: SaleId,
        plan: FulfillmentPlan,
    ) -> Result<Vec<WmsJob>> {
        let sale = self.pending_sale(sale_id).await?;
        if !self.is_parked(sale_id).await? {
            return Err(EngineError::precondition(format!(
                "sale {sale_id} is not awaiting manual release"
            )));
        }
        self.release_with_plan(sale, &plan).await
    }

    /// Sales currently held for manual release, oldest first.
    pub async fn parked_sales(&self) -> Result<Vec<SaleId>> {
        let mut parked = Vec::new();
        for entry in self
            .services
            .ledger
            .entries_by_type(SaleParked::ENTRY_TYPE)
            .await?
        {
            let record: SaleParked = entry.decode()?;
            if !parked.contains(&record.sale_id) && self.is_parked(record.sale_id).await? {
                parked.push(record.sale_id);
            }
        }
        Ok(parked)
    }

    pub async fn is_parked(&self, sale_id: SaleId) -> Result<bool> {
        let entries = self
            .services
            .ledger
            .entries_for_stream(&StreamKey::new(streams::RELEASE, sale_id))
            .await?;
        Ok(entries
            .last()
            .is_some_and(|e| e.entry_type == SaleParked::ENTRY_TYPE))
    }

    async fn pending_sale(&self, sale_id: SaleId) -> Result<Sale> {
        let sale = self
            .services
            .orders
            .get_sale(sale_id)
            .await?
            .ok_or(EngineError::SaleNotFound(sale_id))?;
        if sale.fulfillment_status != FulfillmentStatus::Pending {
            return Err(EngineError::precondition(format!(
                "sale {sale_id} is already {}",
                sale.fulfillment_status
            )));
        }
        Ok(sale)
    }

    async fn park(&self, sale: &Sale) -> Result<()> {
        let record = SaleParked {
            sale_id: sale.id,
            at: Utc::now(),
        };
        let entry = LedgerEntry::builder()
            .entry_type(SaleParked::ENTRY_TYPE)
            .stream(StreamKey::new(streams::RELEASE, sale.id))
            .idempotency_key(format!("park:{}", sale.id))
            .timestamp(record.at)
            .payload(&record)?
            .build()?;
        if let AppendOutcome::Appended { .. } = self.services.ledger.append_entry(entry).await? {
            metrics::counter!("wms_sales_parked_total").increment(1);
            tracing::info!("sale parked for manual release");
        }
        Ok(())
    }

    /// Creates one PICK per plan site, routed to the requesting store.
    /// A site listed more than once still gets a single PICK carrying all of
    /// its lines, since the PICK id is derived from sale and site.
    async fn release_with_plan(&self, sale: Sale, plan: &FulfillmentPlan) -> Result<Vec<WmsJob>> {
        if plan.is_empty() {
            return Err(EngineError::precondition(format!(
                "no site can fulfill sale {}",
                sale.id
            )));
        }

        let order_ref = OrderRef::Sale(sale.id);
        let picks = plan
            .merged_by_site()
            .iter()
            .map(|assignment| {
                WmsJob::builder(assignment.site_id, JobType::Pick)
                    .id(JobId::derived(&format!(
                        "release:{}:{}",
                        sale.id, assignment.site_id
                    )))
                    .order_ref(order_ref)
                    .route(assignment.site_id, sale.site_id)
                    .items(assignment.items.iter().map(|item| {
                        JobItem::new(item.product_id, item.sku.clone(), item.quantity)
                    }))
                    .build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut jobs = Vec::with_capacity(picks.len());
        for pick in picks {
            jobs.push(self.jobs.create(pick).await.map(CreateOutcome::into_job)?);
        }

        let mut sale = sale;
        sale.fulfillment_status = FulfillmentStatus::Picking;
        let sale = self.services.orders.update_sale(sale).await?;

        let record = SaleReleased {
            sale_id: sale.id,
            jobs: jobs.iter().map(|job| job.id).collect(),
            at: Utc::now(),
        };
        let entry = LedgerEntry::builder()
            .entry_type(SaleReleased::ENTRY_TYPE)
            .stream(StreamKey::new(streams::RELEASE, sale.id))
            .idempotency_key(format!("release:{}", sale.id))
            .timestamp(record.at)
            .payload(&record)?
            .build()?;
        self.services.ledger.append_entry(entry).await?;

        metrics::counter!("wms_sales_released_total").increment(1);
        tracing::info!(sale_id = %sale.id, picks = jobs.len(), "sale released");
        Ok(jobs)
    }

    /// Creates the source-site PICK for an approved transfer.
    #[tracing::instrument(skip(self))]
    pub async fn release_transfer(&self, transfer_id: TransferId) -> Result<WmsJob> {
        let mut transfer = self
            .services
            .orders
            .get_transfer(transfer_id)
            .await?
            .ok_or(EngineError::TransferNotFound(transfer_id))?;
        if !transfer.status.can_release() {
            return Err(EngineError::precondition(format!(
                "transfer {transfer_id} is already {}",
                transfer.status
            )));
        }

        let pick = WmsJob::builder(transfer.source_site_id, JobType::Pick)
            .id(JobId::derived(&format!(
                "release:{transfer_id}:{}",
                transfer.source_site_id
            )))
            .order_ref(OrderRef::Transfer(transfer_id))
            .route(transfer.source_site_id, transfer.dest_site_id)
            .transfer_status(TransferStatus::Picking)
            .items(
                transfer
                    .items
                    .iter()
                    .map(|line| JobItem::new(line.product_id, line.sku.clone(), line.quantity)),
            )
            .build()?;
        let pick = self.jobs.create(pick).await?.into_job();

        transfer.status = TransferStatus::Picking;
        self.services.orders.update_transfer(transfer).await?;
        tracing::info!(job_number = %pick.job_number, "transfer released");
        Ok(pick)
    }
}
