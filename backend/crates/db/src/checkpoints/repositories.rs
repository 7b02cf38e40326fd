use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::checkpoints::models::Checkpoint;
use ordersync_common::error::SyncResult;

#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    /// Watermarks for a source; both `None` if the source was never synced.
    async fn get_checkpoint(&self, source_url: &str) -> SyncResult<Checkpoint>;

    /// Store new watermarks. A `None` argument leaves that watermark as is.
    ///
    /// No comparison happens here: callers pass the maximum they observed.
    async fn advance_checkpoint(
        &self,
        source_url: &str,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> SyncResult<Checkpoint>;

    async fn list_checkpoints(&self) -> SyncResult<Vec<Checkpoint>>;
}
