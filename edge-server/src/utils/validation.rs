//! Input validation helpers
//!
//! Centralized text length constants and validation functions.
//! Limits are chosen based on:
//! - ESC/POS 80mm printer line width: 48 chars
//! - Reasonable UX limits for names, notes, reasons

use rust_decimal::Decimal;
use shared::error::{AppError, AppResult};

// ── Text length limits ──────────────────────────────────────────────

/// Entity names: product, staff display name, terminal code, table id
pub const MAX_NAME_LEN: usize = 200;

/// Notes, reasons (void reason, adjustment reason, item note)
pub const MAX_NOTE_LEN: usize = 500;

/// Passwords (before hashing)
pub const MAX_PASSWORD_LEN: usize = 128;

/// Upper bound for a single line quantity
pub const MAX_QUANTITY: u32 = 999;

/// Upper bound for any single money input: prices, payments, drawer counts
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(value: Option<&str>, field: &str, max_len: usize) -> AppResult<()> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Quantity must be ≥ 1
pub fn validate_quantity(quantity: u32) -> AppResult<()> {
    if quantity == 0 {
        return Err(AppError::validation("quantity must be at least 1"));
    }
    if quantity > MAX_QUANTITY {
        return Err(AppError::validation(format!(
            "quantity {quantity} exceeds maximum {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

/// Amount must be in `0..=MAX_AMOUNT`
pub fn validate_amount(amount: Decimal, field: &str) -> AppResult<()> {
    if amount < Decimal::ZERO {
        return Err(AppError::validation(format!("{field} cannot be negative, got {amount}")));
    }
    if amount > MAX_AMOUNT {
        return Err(AppError::validation(format!(
            "{field} {amount} exceeds maximum {MAX_AMOUNT}"
        )));
    }
    Ok(())
}

/// Amount must be in `(0, MAX_AMOUNT]`
pub fn validate_positive_amount(amount: Decimal, field: &str) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation(format!("{field} must be positive, got {amount}")));
    }
    validate_amount(amount, field)
}

/// Key for username lookups: trimmed and lowercased
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
