use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ordersync_config::SyncConfig;
use ordersync_db::checkpoints::pg_repository::PgCheckpointRepository;
use ordersync_db::checkpoints::repositories::CheckpointRepository;
use ordersync_db::orders::models::UpsertCounts;
use ordersync_db::orders::pg_repository::PgOrderRepository;
use ordersync_db::orders::repositories::OrderRepository;
use ordersync_db::runs::models::{RunStatus, RunSummary};
use ordersync_db::runs::pg_repository::PgRunSummaryRepository;
use ordersync_db::runs::repositories::RunSummaryRepository;
use ordersync_db::sources::models::Source;
use ordersync_db::sources::pg_repository::PgSourceRepository;
use ordersync_db::sources::repositories::SourceRepository;

use crate::fetcher::{FetcherSettings, PaginatedFetcher, SweepReport};
use crate::pacing::{DelayRange, Pacing, Sleeper};
use crate::sink::OrderUpsertSink;
use crate::store::client::OrderSource;
use crate::store::query::SweepFilter;

/// Repositories the engine reads and writes.
#[derive(Clone)]
pub struct SyncStores {
    pub sources: Arc<dyn SourceRepository>,
    pub checkpoints: Arc<dyn CheckpointRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub runs: Arc<dyn RunSummaryRepository>,
}

impl SyncStores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            sources: Arc::new(PgSourceRepository::new(pool.clone())),
            checkpoints: Arc::new(PgCheckpointRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            runs: Arc::new(PgRunSummaryRepository::new(pool)),
        }
    }
}

/// Where a source's pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePhase {
    Idle,
    FetchingNew,
    FetchingUpdated,
    Done,
    Failed,
}

impl fmt::Display for SourcePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::FetchingNew => "fetching-new",
            Self::FetchingUpdated => "fetching-updated",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summaries: Vec<RunSummary>,
}

impl CycleReport {
    pub fn failed_sources(&self) -> usize {
        self.summaries
            .iter()
            .filter(|s| s.status == RunStatus::Error)
            .count()
    }
}

/// Accumulates one source's pass into a summary row.
struct SourceRun {
    cycle_id: Uuid,
    source_url: String,
    phase: SourcePhase,
    counts: UpsertCounts,
    pages: u32,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl SourceRun {
    fn start(cycle_id: Uuid, source: &Source) -> Self {
        Self {
            cycle_id,
            source_url: source.url.clone(),
            phase: SourcePhase::Idle,
            counts: UpsertCounts::default(),
            pages: 0,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn add(&mut self, sweep: &SweepReport) {
        self.counts += sweep.counts;
        self.pages += sweep.pages;
    }

    fn finish(self, status: RunStatus, message: String) -> RunSummary {
        RunSummary {
            id: Uuid::new_v4(),
            cycle_id: self.cycle_id,
            source_url: self.source_url,
            status,
            new_orders: self.counts.inserted as i64,
            updated_orders: self.counts.updated as i64,
            pages: self.pages as i64,
            duration_ms: self.clock.elapsed().as_millis() as i64,
            message,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }

    fn fail(mut self, message: String) -> RunSummary {
        let phase = self.phase;
        self.phase = SourcePhase::Failed;
        self.finish(RunStatus::Error, format!("{phase}: {message}"))
    }
}

/// Runs sync cycles over every enabled source.
///
/// Per source: sweep orders created after the created watermark, then orders
/// modified after the modified watermark, then move each watermark only as far
/// as the persisted pages justify.
pub struct SyncOrchestrator<C, S> {
    stores: SyncStores,
    fetcher: PaginatedFetcher<C, S>,
    sink: OrderUpsertSink,
    source_delay: DelayRange,
}

impl<C: OrderSource, S: Sleeper> SyncOrchestrator<C, S> {
    pub fn new(
        stores: SyncStores,
        client: C,
        sleeper: S,
        settings: FetcherSettings,
        source_delay: DelayRange,
    ) -> Self {
        let sink = OrderUpsertSink::new(stores.orders.clone());
        Self {
            fetcher: PaginatedFetcher::new(client, sleeper, settings),
            sink,
            stores,
            source_delay,
        }
    }

    pub fn from_config(stores: SyncStores, client: C, sleeper: S, cfg: &SyncConfig) -> Self {
        let pacing = Pacing::from(cfg);
        Self::new(
            stores,
            client,
            sleeper,
            FetcherSettings::from(cfg),
            pacing.between_sources,
        )
    }

    pub fn stores(&self) -> &SyncStores {
        &self.stores
    }

    /// One pass over all enabled sources. Failures stay within their source.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();

        let sources = match self.stores.sources.list_enabled().await {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!(%cycle_id, error = %e, "failed to list sources, skipping cycle");
                Vec::new()
            }
        };

        tracing::info!(%cycle_id, sources = sources.len(), "sync cycle started");

        let mut summaries = Vec::with_capacity(sources.len());
        for (i, source) in sources.iter().enumerate() {
            let summary = self.sync_source(cycle_id, source).await;

            if let Err(e) = self.stores.runs.append(&summary).await {
                tracing::error!(source = %source.url, error = %e, "failed to record run summary");
            }
            summaries.push(summary);

            if i + 1 < sources.len() {
                self.fetcher.sleeper().sleep(self.source_delay.sample()).await;
            }
        }

        let report = CycleReport {
            cycle_id,
            started_at,
            finished_at: Utc::now(),
            summaries,
        };
        tracing::info!(
            %cycle_id,
            sources = report.summaries.len(),
            failed = report.failed_sources(),
            "sync cycle finished"
        );
        report
    }

    async fn sync_source(&self, cycle_id: Uuid, source: &Source) -> RunSummary {
        let mut run = SourceRun::start(cycle_id, source);
        tracing::info!(source = %source.url, name = source.display_name(), "syncing source");

        let checkpoint = match self.stores.checkpoints.get_checkpoint(&source.url).await {
            Ok(cp) => cp,
            Err(e) => return run.fail(format!("checkpoint read failed: {e}")),
        };

        run.phase = SourcePhase::FetchingNew;
        let created_filter = match checkpoint.last_created_seen {
            Some(ts) => SweepFilter::CreatedAfter(ts),
            None => SweepFilter::None,
        };
        let created = self
            .fetcher
            .run_sweep(source, created_filter, &self.sink)
            .await;
        run.add(&created);

        if let Some(failure) = created.failure() {
            tracing::warn!(source = %source.url, error = %failure, "created sweep failed, checkpoint unchanged");
            return run.fail(failure.to_string());
        }

        run.phase = SourcePhase::FetchingUpdated;
        // A complete unfiltered sweep has already seen every modification.
        let modified = match (checkpoint.last_modified_seen, created_filter) {
            (None, SweepFilter::None) => None,
            (Some(ts), _) => Some(
                self.fetcher
                    .run_sweep(source, SweepFilter::ModifiedAfter(ts), &self.sink)
                    .await,
            ),
            (None, _) => Some(
                self.fetcher
                    .run_sweep(source, SweepFilter::None, &self.sink)
                    .await,
            ),
        };
        if let Some(sweep) = &modified {
            run.add(sweep);
        }

        let modified_failure = modified.as_ref().and_then(|s| s.failure()).cloned();
        let (new_created, new_modified) = match &modified_failure {
            Some(_) => (checkpoint.last_created_seen.max(created.max_created), None),
            None => {
                // orders created between the two sweeps arrive through the second one
                let created_seen = created
                    .max_created
                    .max(modified.as_ref().and_then(|s| s.max_created));
                let modified_seen = created
                    .max_modified
                    .max(modified.as_ref().and_then(|s| s.max_modified));
                (
                    checkpoint.last_created_seen.max(created_seen),
                    checkpoint.last_modified_seen.max(modified_seen),
                )
            }
        };

        if new_created.is_some() || new_modified.is_some() {
            if let Err(e) = self
                .stores
                .checkpoints
                .advance_checkpoint(&source.url, new_created, new_modified)
                .await
            {
                return run.fail(format!("checkpoint write failed: {e}"));
            }
        }

        if let Some(failure) = modified_failure {
            tracing::warn!(
                source = %source.url,
                error = %failure,
                "modified sweep failed, modified watermark unchanged"
            );
            return run.fail(failure.to_string());
        }

        run.phase = SourcePhase::Done;
        let message = format!(
            "{} new, {} updated over {} pages",
            run.counts.inserted, run.counts.updated, run.pages
        );
        tracing::info!(
            source = %source.url,
            new = run.counts.inserted,
            updated = run.counts.updated,
            pages = run.pages,
            "source synced"
        );
        run.finish(RunStatus::Success, message)
    }
}
