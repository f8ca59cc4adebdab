//! Products, stock movements and identifier (SKU/barcode) resolution.

pub mod barcode;
pub mod movement;
pub mod product;
pub mod sku;

pub use barcode::{BarcodeType, detect_barcode};
pub use movement::{StockDirection, StockMovement};
pub use product::{Product, StockChange, StockStatus};
pub use sku::{
    DEFAULT_PREFIX, SkuDecision, SkuRequest, SkuResolution, SkuSource, category_prefix,
    default_category_prefixes, is_valid_sku, next_sku, resolve_sku,
};

use common::SiteId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Stock movement quantity must be positive, got {qty}")]
    InvalidQuantity { qty: u32 },

    #[error("SKU {sku} already exists at site {site_id}")]
    DuplicateSku { sku: String, site_id: SiteId },
}
