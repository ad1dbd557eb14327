//! Product catalog lookup
//!
//! Catalog maintenance is outside the edge core; this is the read side used
//! to price order lines plus a plain upsert for seeding.

use redb::WriteTransaction;
use shared::error::{AppError, AppResult};
use shared::models::Product;

use crate::db::Storage;
use crate::db::storage::{self, PRODUCTS};
use crate::utils::validation::{MAX_NAME_LEN, validate_amount, validate_required_text};

pub struct Catalog;

impl Catalog {
    pub fn upsert(storage: &Storage, product: &Product) -> AppResult<()> {
        validate_required_text(&product.id, "product id", MAX_NAME_LEN)?;
        validate_required_text(&product.name, "product name", MAX_NAME_LEN)?;
        validate_amount(product.price, "price")?;
        for size in &product.sizes {
            validate_amount(size.price_delta.abs(), "size price delta")?;
        }
        for modifier in &product.modifiers {
            validate_amount(modifier.price, "modifier price")?;
        }
        let txn = storage.begin_write()?;
        storage::put_json(&txn, PRODUCTS, &product.id, product)?;
        txn.commit()?;
        tracing::debug!(product_id = %product.id, "Product upserted");
        Ok(())
    }

    pub fn get(storage: &Storage, product_id: &str) -> AppResult<Product> {
        storage
            .read_json(PRODUCTS, product_id)?
            .ok_or_else(|| AppError::not_found("product", product_id))
    }

    pub fn require(txn: &WriteTransaction, product_id: &str) -> AppResult<Product> {
        storage::get_json(txn, PRODUCTS, product_id)?
            .ok_or_else(|| AppError::not_found("product", product_id))
    }
}
