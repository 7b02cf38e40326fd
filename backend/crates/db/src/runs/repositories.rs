use async_trait::async_trait;

use crate::runs::models::{RunFilter, RunSummary};
use ordersync_common::error::SyncResult;

#[async_trait]
pub trait RunSummaryRepository: Send + Sync {
    async fn append(&self, summary: &RunSummary) -> SyncResult<()>;

    /// Most recent first.
    async fn list(&self, filter: RunFilter) -> SyncResult<Vec<RunSummary>>;

    /// The most recent summary of every source that has one.
    async fn latest_per_source(&self) -> SyncResult<Vec<RunSummary>>;
}
