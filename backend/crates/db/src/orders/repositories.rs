use async_trait::async_trait;

use crate::orders::models::{OrderRecord, UpsertCounts};
use ordersync_common::error::SyncResult;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert-or-replace every record by `(source_url, order_id)`.
    /// Either the whole batch is applied or none of it is.
    async fn upsert_batch(&self, records: &[OrderRecord]) -> SyncResult<UpsertCounts>;

    async fn get(&self, source_url: &str, order_id: i64) -> SyncResult<Option<OrderRecord>>;

    async fn count_for_source(&self, source_url: &str) -> SyncResult<i64>;
}
