use std::sync::Arc;

use async_trait::async_trait;

use ordersync_common::error::SyncResult;
use ordersync_db::orders::models::{OrderRecord, UpsertCounts};
use ordersync_db::orders::repositories::OrderRepository;

/// Receives each non-empty page of a sweep.
#[async_trait]
pub trait PageSink: Send + Sync {
    /// Persist a page atomically. An error means nothing from the page was stored.
    async fn persist(&self, records: &[OrderRecord]) -> SyncResult<UpsertCounts>;
}

/// Writes pages straight into the orders table.
#[derive(Clone)]
pub struct OrderUpsertSink {
    orders: Arc<dyn OrderRepository>,
}

impl OrderUpsertSink {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl PageSink for OrderUpsertSink {
    async fn persist(&self, records: &[OrderRecord]) -> SyncResult<UpsertCounts> {
        let counts = self.orders.upsert_batch(records).await?;
        tracing::debug!(
            inserted = counts.inserted,
            updated = counts.updated,
            "page persisted"
        );
        Ok(counts)
    }
}
