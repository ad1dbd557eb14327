//! Product Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Size option with a price delta against the base price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSize {
    pub name: String,
    pub price_delta: Decimal,
}

/// Modifier (extra shot, no onion, ...) with its own price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductModifier {
    pub name: String,
    pub price: Decimal,
}

/// Catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub sizes: Vec<ProductSize>,
    #[serde(default)]
    pub modifiers: Vec<ProductModifier>,
}

impl Product {
    /// Resolve the unit price of a selection
    pub fn unit_price(&self, size: Option<&str>, modifiers: &[String]) -> AppResult<Decimal> {
        let unknown = |option: &str| {
            AppError::validation(format!("unknown option '{option}' for product {}", self.id))
        };
        let overflow = || AppError::amount_overflow("unit price");

        let mut price = self.price;
        if let Some(size) = size {
            let found = self.sizes.iter().find(|s| s.name == size).ok_or_else(|| unknown(size))?;
            price = price.checked_add(found.price_delta).ok_or_else(overflow)?;
        }
        for name in modifiers {
            let found = self.modifiers.iter().find(|m| &m.name == name).ok_or_else(|| unknown(name))?;
            price = price.checked_add(found.price).ok_or_else(overflow)?;
        }
        Ok(price)
    }
}
