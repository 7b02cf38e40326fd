use std::sync::Arc;

use ordersync_config::{init_tracing, AppConfig, SyncConfig};
use ordersync_db::control::pg_repository::PgSyncControlRepository;
use ordersync_db::control::repositories::SyncControlRepository;
use ordersync_ingest::orchestrator::{SyncOrchestrator, SyncStores};
use ordersync_ingest::pacing::TokioSleeper;
use ordersync_ingest::scheduler::{run_guarded_cycle, ControlRowGuard, GuardedCycle};
use ordersync_ingest::store::client::StoreClient;

/// Run one guarded sync cycle over every enabled source and exit.
#[tokio::main]
async fn main() {
    init_tracing("info");

    let config = AppConfig::from_env().expect("failed to load config");
    let sync_config = SyncConfig::from_env().expect("invalid sync config");

    tracing::info!(service = "ordersync-ingest", scope = %sync_config.scope, "starting");

    let pool = ordersync_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");
    ordersync_db::schema::ensure_schema(&pool)
        .await
        .expect("failed to bootstrap schema");

    let control: Arc<dyn SyncControlRepository> =
        Arc::new(PgSyncControlRepository::new(pool.clone()));
    control
        .get_or_create(
            &sync_config.scope,
            sync_config.loop_enabled,
            sync_config.loop_interval.as_secs() as i64,
        )
        .await
        .expect("failed to read sync control");

    let guard = ControlRowGuard::new(control, &sync_config.scope, sync_config.stale_after);
    let client = StoreClient::new(sync_config.request_timeout).expect("failed to build http client");
    let orchestrator = SyncOrchestrator::from_config(
        SyncStores::postgres(pool),
        client,
        TokioSleeper,
        &sync_config,
    );

    let report = match run_guarded_cycle(&orchestrator, &guard).await {
        GuardedCycle::Completed(report) => report,
        GuardedCycle::Busy => {
            tracing::info!(scope = %sync_config.scope, "sync cycle already running, exiting");
            return;
        }
        GuardedCycle::Lost => {
            tracing::error!(scope = %sync_config.scope, "sync cycle taken over by another process");
            std::process::exit(1);
        }
        GuardedCycle::GuardFailed(e) => {
            tracing::error!(error = %e, "failed to acquire cycle guard");
            std::process::exit(1);
        }
    };

    for summary in &report.summaries {
        tracing::info!(
            source = %summary.source_url,
            status = summary.status.as_str(),
            new = summary.new_orders,
            updated = summary.updated_orders,
            duration_ms = summary.duration_ms,
            message = %summary.message,
            "source result"
        );
    }
    tracing::info!(
        cycle_id = %report.cycle_id,
        sources = report.summaries.len(),
        failed = report.failed_sources(),
        "ingest finished"
    );
}
