//! Table occupancy

use serde::{Deserialize, Serialize};

/// Exclusive claim on a table by one open dine-in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOccupancy {
    pub table_id: String,
    pub order_id: String,
    pub terminal_id: String,
    pub staff_id: String,
    pub locked_at: i64,
}
