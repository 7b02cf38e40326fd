use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored order row, keyed by `(source_url, order_id)`.
///
/// Nested remote structures are kept as serialized JSON text and are not
/// decomposed further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub source_url: String,
    pub order_id: i64,
    pub status: String,
    pub currency: Option<String>,
    pub total: Option<String>,
    pub customer_id: Option<i64>,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub billing: Option<String>,
    pub shipping: Option<String>,
    pub line_items: Option<String>,
    pub tax_lines: Option<String>,
    pub shipping_lines: Option<String>,
    pub fee_lines: Option<String>,
    pub coupon_lines: Option<String>,
    pub refunds: Option<String>,
    pub meta: Option<String>,
    /// Server-assigned on every write.
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
}

impl UpsertCounts {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated
    }
}

impl std::ops::AddAssign for UpsertCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
    }
}
