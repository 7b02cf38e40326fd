use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ordersync_db::orders::models::OrderRecord;

/// An order as returned by the remote orders collection.
///
/// Only the identity, status and timestamps are interpreted; nested blocks are
/// carried through as opaque JSON and anything unrecognised lands in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub total: Option<Value>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_created_gmt: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
    #[serde(default)]
    pub date_modified_gmt: Option<String>,
    #[serde(default)]
    pub billing: Option<Value>,
    #[serde(default)]
    pub shipping: Option<Value>,
    #[serde(default)]
    pub line_items: Option<Value>,
    #[serde(default)]
    pub tax_lines: Option<Value>,
    #[serde(default)]
    pub shipping_lines: Option<Value>,
    #[serde(default)]
    pub fee_lines: Option<Value>,
    #[serde(default)]
    pub coupon_lines: Option<Value>,
    #[serde(default)]
    pub refunds: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteOrder {
    pub fn created_at(&self) -> Result<DateTime<Utc>, String> {
        pick_timestamp(&self.date_created_gmt, &self.date_created)
            .map_err(|e| format!("order {}: date_created {e}", self.id))
    }

    pub fn modified_at(&self) -> Result<DateTime<Utc>, String> {
        pick_timestamp(&self.date_modified_gmt, &self.date_modified)
            .map_err(|e| format!("order {}: date_modified {e}", self.id))
    }

    /// Convert into a storage row tagged with its originating source.
    pub fn into_record(self, source_url: &str) -> Result<OrderRecord, String> {
        let date_created = self.created_at()?;
        let date_modified = self.modified_at()?;

        Ok(OrderRecord {
            source_url: source_url.to_string(),
            order_id: self.id,
            status: self.status,
            currency: self.currency,
            total: self.total.as_ref().map(value_text),
            customer_id: self.customer_id,
            date_created,
            date_modified,
            billing: self.billing.as_ref().map(Value::to_string),
            shipping: self.shipping.as_ref().map(Value::to_string),
            line_items: self.line_items.as_ref().map(Value::to_string),
            tax_lines: self.tax_lines.as_ref().map(Value::to_string),
            shipping_lines: self.shipping_lines.as_ref().map(Value::to_string),
            fee_lines: self.fee_lines.as_ref().map(Value::to_string),
            coupon_lines: self.coupon_lines.as_ref().map(Value::to_string),
            refunds: self.refunds.as_ref().map(Value::to_string),
            meta: (!self.extra.is_empty()).then(|| Value::Object(self.extra).to_string()),
            updated_at: Utc::now(),
        })
    }
}

/// Prefer the GMT field; fall back to the site-local one read as UTC.
fn pick_timestamp(gmt: &Option<String>, local: &Option<String>) -> Result<DateTime<Utc>, String> {
    let raw = gmt
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(local.as_deref().filter(|s| !s.is_empty()))
        .ok_or_else(|| "is missing".to_string())?;
    parse_timestamp(raw).ok_or_else(|| format!("is not a timestamp: {raw:?}"))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Strings are stored bare; other JSON values in their serialized form.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
