use sqlx::PgPool;

use crate::db_err;
use ordersync_common::error::SyncResult;

const STATEMENTS: &[&str] = &[
    "create table if not exists sources (
       url text primary key,
       consumer_key text not null,
       consumer_secret text not null,
       label text,
       enabled boolean not null default true,
       created_at timestamptz not null default now(),
       updated_at timestamptz not null default now()
     )",
    "create table if not exists orders (
       source_url text not null,
       order_id bigint not null,
       status text not null,
       currency text,
       total text,
       customer_id bigint,
       date_created timestamptz not null,
       date_modified timestamptz not null,
       billing text,
       shipping text,
       line_items text,
       tax_lines text,
       shipping_lines text,
       fee_lines text,
       coupon_lines text,
       refunds text,
       meta text,
       updated_at timestamptz not null default now(),
       primary key (source_url, order_id)
     )",
    "create index if not exists orders_source_modified_idx
       on orders(source_url, date_modified)",
    "create table if not exists sync_checkpoints (
       source_url text primary key,
       last_created_seen timestamptz,
       last_modified_seen timestamptz,
       updated_at timestamptz not null default now()
     )",
    "create table if not exists sync_runs (
       id uuid primary key,
       cycle_id uuid not null,
       source_url text not null,
       status text not null,
       new_orders bigint not null default 0,
       updated_orders bigint not null default 0,
       pages bigint not null default 0,
       duration_ms bigint not null default 0,
       message text not null default '',
       started_at timestamptz not null,
       finished_at timestamptz not null
     )",
    "create index if not exists sync_runs_source_finished_idx
       on sync_runs(source_url, finished_at desc)",
    "create table if not exists sync_control (
       scope text primary key,
       enabled boolean not null default false,
       interval_secs bigint not null default 3600,
       running boolean not null default false,
       cycle_token uuid,
       cycle_started_at timestamptz,
       heartbeat_at timestamptz,
       last_cycle_finished_at timestamptz,
       updated_at timestamptz not null default now()
     )",
    "alter table sync_control add column if not exists cycle_token uuid",
    "alter table sync_control add column if not exists heartbeat_at timestamptz",
];

/// Create every table and index the engine needs. Idempotent.
pub async fn ensure_schema(pool: &PgPool) -> SyncResult<()> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(db_err)?;
    }
    tracing::debug!(statements = STATEMENTS.len(), "schema ensured");
    Ok(())
}
