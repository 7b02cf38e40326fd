use async_trait::async_trait;

use crate::sources::models::Source;
use ordersync_common::error::SyncResult;

#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Current set of enabled sources, ordered by URL.
    async fn list_enabled(&self) -> SyncResult<Vec<Source>>;

    async fn get(&self, url: &str) -> SyncResult<Option<Source>>;
}
