pub mod checkpoints;
pub mod control;
pub mod memory;
pub mod orders;
pub mod runs;
pub mod schema;
pub mod sources;

use ordersync_common::error::{SyncError, SyncResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> SyncResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(db_err)
}

pub(crate) fn db_err(e: sqlx::Error) -> SyncError {
    SyncError::Database(e.to_string())
}

/// Connect to `TEST_DATABASE_URL` and bootstrap the schema.
/// Returns `None` when the variable is unset so DB tests skip silently.
#[cfg(test)]
pub(crate) async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = create_pool(&url).await.expect("db should connect");
    schema::ensure_schema(&pool).await.expect("schema bootstrap");
    Some(pool)
}
