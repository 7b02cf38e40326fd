use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::checkpoints::models::Checkpoint;
use crate::checkpoints::repositories::CheckpointRepository;
use crate::db_err;
use ordersync_common::error::SyncResult;

#[derive(Clone)]
pub struct PgCheckpointRepository {
    pool: PgPool,
}

impl PgCheckpointRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> Checkpoint {
        Checkpoint {
            source_url: row.get("source_url"),
            last_created_seen: row.get("last_created_seen"),
            last_modified_seen: row.get("last_modified_seen"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl CheckpointRepository for PgCheckpointRepository {
    async fn get_checkpoint(&self, source_url: &str) -> SyncResult<Checkpoint> {
        let row = sqlx::query(
            "select source_url, last_created_seen, last_modified_seen, updated_at
             from sync_checkpoints where source_url = $1",
        )
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row
            .map(Self::map_row)
            .unwrap_or_else(|| Checkpoint::empty(source_url)))
    }

    async fn advance_checkpoint(
        &self,
        source_url: &str,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> SyncResult<Checkpoint> {
        let row = sqlx::query(
            "insert into sync_checkpoints (source_url, last_created_seen, last_modified_seen)
             values ($1, $2, $3)
             on conflict (source_url) do update set
               last_created_seen = coalesce(excluded.last_created_seen, sync_checkpoints.last_created_seen),
               last_modified_seen = coalesce(excluded.last_modified_seen, sync_checkpoints.last_modified_seen),
               updated_at = now()
             returning source_url, last_created_seen, last_modified_seen, updated_at",
        )
        .bind(source_url)
        .bind(created)
        .bind(modified)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Self::map_row(row))
    }

    async fn list_checkpoints(&self) -> SyncResult<Vec<Checkpoint>> {
        let rows = sqlx::query(
            "select source_url, last_created_seen, last_modified_seen, updated_at
             from sync_checkpoints order by source_url",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Self::map_row).collect())
    }
}
