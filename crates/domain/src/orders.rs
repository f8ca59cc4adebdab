//! Order-like records that seed job chains.
//!
//! The engine treats these as opaque apart from the status fields it is
//! allowed to move: sale fulfillment status, transfer status and PO status.

use chrono::{DateTime, Utc};
use common::{ProductId, PurchaseOrderId, SaleId, SiteId, TransferId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Where a sale is in its fulfillment chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FulfillmentStatus {
    #[default]
    Pending,
    Picking,
    Packing,
    Shipped,
    Delivered,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "Pending",
            FulfillmentStatus::Picking => "Picking",
            FulfillmentStatus::Packing => "Packing",
            FulfillmentStatus::Shipped => "Shipped",
            FulfillmentStatus::Delivered => "Delivered",
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extended status vocabulary for inter-site transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransferStatus {
    #[default]
    Requested,
    Approved,
    Picking,
    Picked,
    Packed,
    #[serde(rename = "In-Transit")]
    InTransit,
    Delivered,
    Received,
}

impl TransferStatus {
    /// Whether the transfer can still be released to the floor.
    pub fn can_release(&self) -> bool {
        matches!(self, TransferStatus::Requested | TransferStatus::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Requested => "Requested",
            TransferStatus::Approved => "Approved",
            TransferStatus::Picking => "Picking",
            TransferStatus::Picked => "Picked",
            TransferStatus::Packed => "Packed",
            TransferStatus::InTransit => "In-Transit",
            TransferStatus::Delivered => "Delivered",
            TransferStatus::Received => "Received",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PoStatus {
    Draft,
    #[default]
    Pending,
    Approved,
    Received,
    Cancelled,
}

impl PoStatus {
    pub fn can_receive(&self) -> bool {
        matches!(self, PoStatus::Pending | PoStatus::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PoStatus::Draft => "Draft",
            PoStatus::Pending => "Pending",
            PoStatus::Approved => "Approved",
            PoStatus::Received => "Received",
            PoStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for PoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl SaleLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(u64::from(self.quantity))
    }
}

/// A customer or store sale that may need warehouse fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    /// The requesting store.
    pub site_id: SiteId,
    pub lines: Vec<SaleLine>,
    pub fulfillment_status: FulfillmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn new(site_id: SiteId, lines: Vec<SaleLine>, at: DateTime<Utc>) -> Self {
        Self {
            id: SaleId::new(),
            site_id,
            lines,
            fulfillment_status: FulfillmentStatus::Pending,
            created_at: at,
        }
    }

    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(SaleLine::line_total).sum()
    }

    pub fn total_units(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: u32,
}

/// Stock moving from one site to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub source_site_id: SiteId,
    pub dest_site_id: SiteId,
    pub items: Vec<TransferLine>,
    pub status: TransferStatus,
}

impl TransferRecord {
    pub fn new(source_site_id: SiteId, dest_site_id: SiteId, items: Vec<TransferLine>) -> Self {
        Self {
            id: TransferId::new(),
            source_site_id,
            dest_site_id,
            items,
            status: TransferStatus::Requested,
        }
    }
}

/// One ordered line on a purchase order.
///
/// `product_id` is `None` for manual lines that name a product not yet in
/// the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoLine {
    pub line_id: u32,
    pub product_id: Option<ProductId>,
    pub name: String,
    pub category: String,
    pub supplier_sku: Option<String>,
    pub quantity_ordered: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    /// Receiving site.
    pub site_id: SiteId,
    pub supplier: String,
    pub status: PoStatus,
    pub lines: Vec<PoLine>,
}

impl PurchaseOrder {
    pub fn new(site_id: SiteId, supplier: impl Into<String>, lines: Vec<PoLine>) -> Self {
        Self {
            id: PurchaseOrderId::new(),
            site_id,
            supplier: supplier.into(),
            status: PoStatus::Pending,
            lines,
        }
    }

    pub fn line(&self, line_id: u32) -> Option<&PoLine> {
        self.lines.iter().find(|line| line.line_id == line_id)
    }
}

/// Per-site policy for which warehouse(s) serve an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStrategy {
    #[default]
    Nearest,
    LocalOnly,
    Split,
    Manual,
}

impl FulfillmentStrategy {
    /// Manual strategy parks orders until an operator releases them.
    pub fn defers_release(&self) -> bool {
        matches!(self, FulfillmentStrategy::Manual)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedItem {
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: u32,
}

/// Items one site will pick for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAssignment {
    pub site_id: SiteId,
    pub items: Vec<PlannedItem>,
}

/// Which site(s) serve which items of an order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FulfillmentPlan {
    pub assignments: Vec<PlanAssignment>,
}

impl FulfillmentPlan {
    pub fn single_site(site_id: SiteId, items: Vec<PlannedItem>) -> Self {
        Self {
            assignments: vec![PlanAssignment { site_id, items }],
        }
    }

    /// True when no site has anything to pick.
    pub fn is_empty(&self) -> bool {
        self.assignments.iter().all(|a| a.items.is_empty())
    }

    /// One assignment per site, in first-seen order. Repeated sites are
    /// folded together and repeated products at a site have their
    /// quantities summed.
    pub fn merged_by_site(&self) -> Vec<PlanAssignment> {
        let mut merged: Vec<PlanAssignment> = Vec::new();
        for assignment in &self.assignments {
            let index = match merged.iter().position(|m| m.site_id == assignment.site_id) {
                Some(index) => index,
                None => {
                    merged.push(PlanAssignment {
                        site_id: assignment.site_id,
                        items: Vec::new(),
                    });
                    merged.len() - 1
                }
            };
            let items = &mut merged[index].items;
            for item in &assignment.items {
                match items.iter_mut().find(|i| i.product_id == item.product_id) {
                    Some(existing) => existing.quantity += item.quantity,
                    None => items.push(item.clone()),
                }
            }
        }
        merged.retain(|assignment| !assignment.items.is_empty());
        merged
    }
}
