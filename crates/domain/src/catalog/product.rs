//! Site-scoped product records and stock arithmetic.

use chrono::{DateTime, Utc};
use common::{ProductId, SiteId};
use serde::{Deserialize, Serialize};

use super::barcode::BarcodeType;
use super::{CatalogError, StockDirection};
use crate::money::Money;

/// Derived availability of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    #[default]
    Active,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// `OutOfStock` at zero, `LowStock` under `threshold`, otherwise `Active`.
    pub fn derive(stock: u32, threshold: u32) -> Self {
        if stock == 0 {
            StockStatus::OutOfStock
        } else if stock < threshold {
            StockStatus::LowStock
        } else {
            StockStatus::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Active => "active",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stock level before and after an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub previous: u32,
    pub current: u32,
    pub status: StockStatus,
}

impl StockChange {
    /// Signed change actually applied, after clamping.
    pub fn delta(&self) -> i64 {
        i64::from(self.current) - i64::from(self.previous)
    }
}

/// One catalog item at one site. The same item at two sites is two records
/// sharing a SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub site_id: SiteId,
    pub name: String,
    pub sku: String,
    pub category: String,
    pub stock: u32,
    pub status: StockStatus,
    pub location: Option<String>,
    pub barcode: Option<String>,
    pub barcode_type: Option<BarcodeType>,
    pub price: Money,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        site_id: SiteId,
        name: impl Into<String>,
        sku: impl Into<String>,
        category: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProductId::new(),
            site_id,
            name: name.into(),
            sku: sku.into(),
            category: category.into(),
            stock: 0,
            status: StockStatus::OutOfStock,
            location: None,
            barcode: None,
            barcode_type: None,
            price: Money::zero(),
            updated_at: at,
        }
    }

    pub fn with_stock(mut self, stock: u32, threshold: u32) -> Self {
        self.stock = stock;
        self.status = StockStatus::derive(stock, threshold);
        self
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = price;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Applies a stock movement, clamping at zero, and rederives `status`.
    ///
    /// `In` and `Out` require a positive quantity. `Adjust` sets the counted
    /// stock level and accepts zero.
    pub fn apply_adjustment(
        &mut self,
        qty: u32,
        direction: StockDirection,
        threshold: u32,
        at: DateTime<Utc>,
    ) -> Result<StockChange, CatalogError> {
        if qty == 0 && direction != StockDirection::Adjust {
            return Err(CatalogError::InvalidQuantity { qty });
        }

        let previous = self.stock;
        let current = match direction {
            StockDirection::In => previous.saturating_add(qty),
            StockDirection::Out => previous.saturating_sub(qty),
            StockDirection::Adjust => qty,
        };

        self.stock = current;
        self.status = StockStatus::derive(current, threshold);
        self.updated_at = at;

        Ok(StockChange {
            previous,
            current,
            status: self.status,
        })
    }

    /// New empty record for the same catalog item at another site.
    ///
    /// Descriptive fields are copied; stock, location and identity are not.
    pub fn clone_for_site(&self, site_id: SiteId, at: DateTime<Utc>) -> Product {
        Product {
            id: ProductId::new(),
            site_id,
            stock: 0,
            status: StockStatus::OutOfStock,
            location: None,
            updated_at: at,
            ..self.clone()
        }
    }
}
