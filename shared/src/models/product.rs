//! Product and restaurant models

use serde::{Deserialize, Serialize};

/// Restaurant entity (station-side kitchen)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    /// Station the restaurant serves
    pub station_name: String,
    pub is_active: bool,
}

/// Named add-on choice with its own price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    pub name: String,
    #[serde(default)]
    pub price_cents: i64,
}

/// Product entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    /// Unit price in minor currency units
    pub price_cents: i64,
    /// Remaining units; `None` means unlimited
    pub stock: Option<u32>,
    pub available: bool,
    pub is_active: bool,
    #[serde(default)]
    pub options: Vec<ProductOption>,
}

impl Product {
    /// Whether the product can be ordered at all (ignores stock)
    pub fn is_orderable(&self) -> bool {
        self.available && self.is_active
    }

    /// Whether `qty` units can be taken from current stock
    pub fn has_stock_for(&self, qty: u32) -> bool {
        self.stock.is_none_or(|s| s >= qty)
    }

    pub fn option(&self, name: &str) -> Option<&ProductOption> {
        self.options.iter().find(|o| o.name == name)
    }
}

/// Create / replace product payload (admin)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpsert {
    /// Omit to create a new product
    pub id: Option<i64>,
    pub restaurant_id: i64,
    pub name: String,
    pub price_cents: i64,
    pub stock: Option<u32>,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub options: Vec<ProductOption>,
}

/// Create / replace restaurant payload (admin)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantUpsert {
    pub id: Option<i64>,
    pub name: String,
    pub station_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
