use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::db_err;
use crate::sources::models::Source;
use crate::sources::repositories::SourceRepository;
use ordersync_common::error::SyncResult;

const COLUMNS: &str = "url, consumer_key, consumer_secret, label, enabled, created_at, updated_at";

#[derive(Clone)]
pub struct PgSourceRepository {
    pool: PgPool,
}

impl PgSourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> Source {
        Source {
            url: row.get("url"),
            consumer_key: row.get("consumer_key"),
            consumer_secret: row.get("consumer_secret"),
            label: row.get("label"),
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Insert or replace a source. Used by seeding and tests; the engine never writes sources.
    pub async fn upsert(&self, source: &Source) -> SyncResult<()> {
        sqlx::query(
            "insert into sources (url, consumer_key, consumer_secret, label, enabled)
             values ($1, $2, $3, $4, $5)
             on conflict (url) do update set
               consumer_key = excluded.consumer_key,
               consumer_secret = excluded.consumer_secret,
               label = excluded.label,
               enabled = excluded.enabled,
               updated_at = now()",
        )
        .bind(&source.url)
        .bind(&source.consumer_key)
        .bind(&source.consumer_secret)
        .bind(&source.label)
        .bind(source.enabled)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl SourceRepository for PgSourceRepository {
    async fn list_enabled(&self) -> SyncResult<Vec<Source>> {
        let rows = sqlx::query(&format!(
            "select {COLUMNS} from sources where enabled order by url"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Self::map_row).collect())
    }

    async fn get(&self, url: &str) -> SyncResult<Option<Source>> {
        let row = sqlx::query(&format!("select {COLUMNS} from sources where url = $1"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(Self::map_row))
    }
}
