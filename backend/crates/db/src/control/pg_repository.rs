use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::control::models::SyncControl;
use crate::control::repositories::SyncControlRepository;
use crate::db_err;
use ordersync_common::error::{SyncError, SyncResult};

const RETURNING: &str = "returning scope, enabled, interval_secs, running, cycle_token,
    cycle_started_at, heartbeat_at, last_cycle_finished_at, updated_at";

#[derive(Clone)]
pub struct PgSyncControlRepository {
    pool: PgPool,
}

impl PgSyncControlRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> SyncControl {
        SyncControl {
            scope: row.get("scope"),
            enabled: row.get("enabled"),
            interval_secs: row.get("interval_secs"),
            running: row.get("running"),
            cycle_token: row.get("cycle_token"),
            cycle_started_at: row.get("cycle_started_at"),
            heartbeat_at: row.get("heartbeat_at"),
            last_cycle_finished_at: row.get("last_cycle_finished_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl SyncControlRepository for PgSyncControlRepository {
    async fn get_or_create(
        &self,
        scope: &str,
        enabled: bool,
        interval_secs: i64,
    ) -> SyncResult<SyncControl> {
        let row = sqlx::query(&format!(
            "insert into sync_control (scope, enabled, interval_secs)
             values ($1, $2, $3)
             on conflict (scope) do update set updated_at = sync_control.updated_at
             {RETURNING}"
        ))
        .bind(scope)
        .bind(enabled)
        .bind(interval_secs)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Self::map_row(row))
    }

    async fn update_settings(
        &self,
        scope: &str,
        enabled: Option<bool>,
        interval_secs: Option<i64>,
    ) -> SyncResult<SyncControl> {
        let row = sqlx::query(&format!(
            "update sync_control
             set enabled = coalesce($1, enabled),
                 interval_secs = coalesce($2, interval_secs),
                 updated_at = now()
             where scope = $3
             {RETURNING}"
        ))
        .bind(enabled)
        .bind(interval_secs)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Self::map_row)
            .ok_or_else(|| SyncError::NotFound(format!("sync control scope: {scope}")))
    }

    async fn try_begin_cycle(
        &self,
        scope: &str,
        token: Uuid,
        stale_after: Duration,
    ) -> SyncResult<Option<SyncControl>> {
        let now = Utc::now();
        let stale = chrono::Duration::from_std(stale_after)
            .map_err(|e| SyncError::Internal(format!("stale_after out of range: {e}")))?;

        let row = sqlx::query(&format!(
            "update sync_control
             set running = true, cycle_token = $2, cycle_started_at = $1,
                 heartbeat_at = $1, updated_at = $1
             where scope = $3
               and (running = false or heartbeat_at is null or heartbeat_at < $4)
             {RETURNING}"
        ))
        .bind(now)
        .bind(token)
        .bind(scope)
        .bind(now - stale)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Self::map_row))
    }

    async fn heartbeat(&self, scope: &str, token: Uuid) -> SyncResult<bool> {
        let result = sqlx::query(
            "update sync_control
             set heartbeat_at = now()
             where scope = $1 and running = true and cycle_token = $2",
        )
        .bind(scope)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn finish_cycle(&self, scope: &str, token: Uuid) -> SyncResult<bool> {
        let result = sqlx::query(
            "update sync_control
             set running = false, cycle_token = null,
                 last_cycle_finished_at = now(), updated_at = now()
             where scope = $1 and cycle_token = $2",
        )
        .bind(scope)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }
}
