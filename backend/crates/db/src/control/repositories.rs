use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::control::models::SyncControl;
use ordersync_common::error::SyncResult;

#[async_trait]
pub trait SyncControlRepository: Send + Sync {
    /// Get the control row for a scope, creating it with the given defaults if absent.
    async fn get_or_create(
        &self,
        scope: &str,
        enabled: bool,
        interval_secs: i64,
    ) -> SyncResult<SyncControl>;

    /// Change loop settings. `None` keeps the stored value.
    async fn update_settings(
        &self,
        scope: &str,
        enabled: Option<bool>,
        interval_secs: Option<i64>,
    ) -> SyncResult<SyncControl>;

    /// Atomically mark a cycle as running under `token`.
    /// Returns `None` if another holder's heartbeat is younger than `stale_after`.
    async fn try_begin_cycle(
        &self,
        scope: &str,
        token: Uuid,
        stale_after: Duration,
    ) -> SyncResult<Option<SyncControl>>;

    /// Refresh the holder's heartbeat. `false` once `token` no longer holds the flag.
    async fn heartbeat(&self, scope: &str, token: Uuid) -> SyncResult<bool>;

    /// Clear the running flag and record the finish time, only if `token` still holds it.
    async fn finish_cycle(&self, scope: &str, token: Uuid) -> SyncResult<bool>;
}
