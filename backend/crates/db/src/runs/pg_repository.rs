use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::db_err;
use crate::runs::models::{RunFilter, RunStatus, RunSummary};
use crate::runs::repositories::RunSummaryRepository;
use ordersync_common::error::{SyncError, SyncResult};

const COLUMNS: &str = "id, cycle_id, source_url, status, new_orders, updated_orders, pages,
    duration_ms, message, started_at, finished_at";

#[derive(Clone)]
pub struct PgRunSummaryRepository {
    pool: PgPool,
}

impl PgRunSummaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> SyncResult<RunSummary> {
        let status: String = row.get("status");
        Ok(RunSummary {
            id: row.get("id"),
            cycle_id: row.get("cycle_id"),
            source_url: row.get("source_url"),
            status: status.parse::<RunStatus>().map_err(SyncError::Database)?,
            new_orders: row.get("new_orders"),
            updated_orders: row.get("updated_orders"),
            pages: row.get("pages"),
            duration_ms: row.get("duration_ms"),
            message: row.get("message"),
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
        })
    }
}

#[async_trait]
impl RunSummaryRepository for PgRunSummaryRepository {
    async fn append(&self, summary: &RunSummary) -> SyncResult<()> {
        sqlx::query(
            "insert into sync_runs
             (id, cycle_id, source_url, status, new_orders, updated_orders, pages,
              duration_ms, message, started_at, finished_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(summary.id)
        .bind(summary.cycle_id)
        .bind(&summary.source_url)
        .bind(summary.status.as_str())
        .bind(summary.new_orders)
        .bind(summary.updated_orders)
        .bind(summary.pages)
        .bind(summary.duration_ms)
        .bind(&summary.message)
        .bind(summary.started_at)
        .bind(summary.finished_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list(&self, filter: RunFilter) -> SyncResult<Vec<RunSummary>> {
        let rows = sqlx::query(&format!(
            "select {COLUMNS} from sync_runs
             where ($1::text is null or source_url = $1)
             order by finished_at desc
             limit $2"
        ))
        .bind(&filter.source)
        .bind(filter.effective_limit())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn latest_per_source(&self) -> SyncResult<Vec<RunSummary>> {
        let rows = sqlx::query(&format!(
            "select distinct on (source_url) {COLUMNS} from sync_runs
             order by source_url, finished_at desc"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Self::map_row).collect()
    }
}
