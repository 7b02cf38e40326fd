use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::db_err;
use crate::orders::models::{OrderRecord, UpsertCounts};
use crate::orders::repositories::OrderRepository;
use ordersync_common::error::SyncResult;

const COLUMNS: &str = "source_url, order_id, status, currency, total, customer_id,
    date_created, date_modified, billing, shipping, line_items, tax_lines,
    shipping_lines, fee_lines, coupon_lines, refunds, meta, updated_at";

#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> OrderRecord {
        OrderRecord {
            source_url: row.get("source_url"),
            order_id: row.get("order_id"),
            status: row.get("status"),
            currency: row.get("currency"),
            total: row.get("total"),
            customer_id: row.get("customer_id"),
            date_created: row.get("date_created"),
            date_modified: row.get("date_modified"),
            billing: row.get("billing"),
            shipping: row.get("shipping"),
            line_items: row.get("line_items"),
            tax_lines: row.get("tax_lines"),
            shipping_lines: row.get("shipping_lines"),
            fee_lines: row.get("fee_lines"),
            coupon_lines: row.get("coupon_lines"),
            refunds: row.get("refunds"),
            meta: row.get("meta"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn upsert_batch(&self, records: &[OrderRecord]) -> SyncResult<UpsertCounts> {
        let mut counts = UpsertCounts::default();
        if records.is_empty() {
            return Ok(counts);
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for record in records {
            // xmax is 0 only for a freshly inserted tuple
            let row = sqlx::query(
                "insert into orders
                 (source_url, order_id, status, currency, total, customer_id,
                  date_created, date_modified, billing, shipping, line_items, tax_lines,
                  shipping_lines, fee_lines, coupon_lines, refunds, meta, updated_at)
                 values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, now())
                 on conflict (source_url, order_id) do update set
                   status = excluded.status,
                   currency = excluded.currency,
                   total = excluded.total,
                   customer_id = excluded.customer_id,
                   date_created = excluded.date_created,
                   date_modified = excluded.date_modified,
                   billing = excluded.billing,
                   shipping = excluded.shipping,
                   line_items = excluded.line_items,
                   tax_lines = excluded.tax_lines,
                   shipping_lines = excluded.shipping_lines,
                   fee_lines = excluded.fee_lines,
                   coupon_lines = excluded.coupon_lines,
                   refunds = excluded.refunds,
                   meta = excluded.meta,
                   updated_at = now()
                 returning (xmax = 0) as inserted",
            )
            .bind(&record.source_url)
            .bind(record.order_id)
            .bind(&record.status)
            .bind(&record.currency)
            .bind(&record.total)
            .bind(record.customer_id)
            .bind(record.date_created)
            .bind(record.date_modified)
            .bind(&record.billing)
            .bind(&record.shipping)
            .bind(&record.line_items)
            .bind(&record.tax_lines)
            .bind(&record.shipping_lines)
            .bind(&record.fee_lines)
            .bind(&record.coupon_lines)
            .bind(&record.refunds)
            .bind(&record.meta)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

            if row.get::<bool, _>("inserted") {
                counts.inserted += 1;
            } else {
                counts.updated += 1;
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(counts)
    }

    async fn get(&self, source_url: &str, order_id: i64) -> SyncResult<Option<OrderRecord>> {
        let row = sqlx::query(&format!(
            "select {COLUMNS} from orders where source_url = $1 and order_id = $2"
        ))
        .bind(source_url)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Self::map_row))
    }

    async fn count_for_source(&self, source_url: &str) -> SyncResult<i64> {
        sqlx::query_scalar::<_, i64>("select count(*) from orders where source_url = $1")
            .bind(source_url)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}
