use chrono::{DateTime, Utc};

use ordersync_config::SyncConfig;
use ordersync_db::orders::models::{OrderRecord, UpsertCounts};
use ordersync_db::sources::models::Source;

use crate::pacing::{DelayRange, RetryPolicy, Sleeper};
use crate::sink::PageSink;
use crate::store::client::OrderSource;
use crate::store::query::{PageQuery, SweepFilter};

#[derive(Debug, Clone, Copy)]
pub struct FetcherSettings {
    pub page_size: u32,
    pub retry: RetryPolicy,
    pub page_delay: DelayRange,
    /// Pages fetched before a sweep is abandoned as runaway.
    pub max_pages: u32,
}

impl From<&SyncConfig> for FetcherSettings {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            page_size: cfg.page_size,
            retry: RetryPolicy::from(cfg),
            page_delay: DelayRange::new(cfg.page_delay_min, cfg.page_delay_max),
            max_pages: cfg.max_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepFailure {
    #[error("page {page} failed {attempts} times: {last_error}")]
    RetriesExhausted {
        page: u32,
        attempts: u32,
        last_error: String,
    },

    #[error("page {page} rejected: {error}")]
    Permanent { page: u32, error: String },

    #[error("page {page} could not be stored: {error}")]
    Storage { page: u32, error: String },

    #[error("stopped after {limit} pages")]
    PageLimit { limit: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// An empty page was reached.
    Completed,
    Failed(SweepFailure),
}

/// What one sweep persisted and how it ended.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub filter: SweepFilter,
    pub pages: u32,
    pub records: u64,
    pub counts: UpsertCounts,
    /// Maxima over persisted pages only.
    pub max_created: Option<DateTime<Utc>>,
    pub max_modified: Option<DateTime<Utc>>,
    pub outcome: SweepOutcome,
}

impl SweepReport {
    fn new(filter: SweepFilter) -> Self {
        Self {
            filter,
            pages: 0,
            records: 0,
            counts: UpsertCounts::default(),
            max_created: None,
            max_modified: None,
            outcome: SweepOutcome::Completed,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == SweepOutcome::Completed
    }

    pub fn failure(&self) -> Option<&SweepFailure> {
        match &self.outcome {
            SweepOutcome::Completed => None,
            SweepOutcome::Failed(f) => Some(f),
        }
    }

    fn absorb(&mut self, records: &[OrderRecord], counts: UpsertCounts) {
        self.pages += 1;
        self.records += records.len() as u64;
        self.counts += counts;
        for r in records {
            self.max_created = self.max_created.max(Some(r.date_created));
            self.max_modified = self.max_modified.max(Some(r.date_modified));
        }
    }

    fn fail(mut self, failure: SweepFailure) -> Self {
        self.outcome = SweepOutcome::Failed(failure);
        self
    }
}

/// Walks a filtered collection page by page until an empty page,
/// handing each page to a sink before asking for the next.
pub struct PaginatedFetcher<C, S> {
    client: C,
    sleeper: S,
    settings: FetcherSettings,
}

impl<C: OrderSource, S: Sleeper> PaginatedFetcher<C, S> {
    pub fn new(client: C, sleeper: S, settings: FetcherSettings) -> Self {
        Self {
            client,
            sleeper,
            settings,
        }
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub async fn run_sweep(
        &self,
        source: &Source,
        filter: SweepFilter,
        sink: &dyn PageSink,
    ) -> SweepReport {
        let mut report = SweepReport::new(filter);
        let mut page: u32 = 1;
        let mut retries: u32 = 0;

        loop {
            if page > self.settings.max_pages {
                tracing::error!(
                    source = %source.url,
                    limit = self.settings.max_pages,
                    "page limit reached, abandoning sweep"
                );
                return report.fail(SweepFailure::PageLimit {
                    limit: self.settings.max_pages,
                });
            }

            let query = PageQuery {
                filter,
                page,
                per_page: self.settings.page_size,
            };

            let orders = match self.client.fetch_page(source, &query).await {
                Ok(orders) => orders,
                Err(e) if e.is_transient() => {
                    retries += 1;
                    if retries >= self.settings.retry.budget {
                        tracing::error!(
                            source = %source.url,
                            page,
                            attempts = retries,
                            error = %e,
                            "retry budget exhausted"
                        );
                        return report.fail(SweepFailure::RetriesExhausted {
                            page,
                            attempts: retries,
                            last_error: e.to_string(),
                        });
                    }
                    let delay = self.settings.retry.backoff(retries, e.retry_after());
                    tracing::warn!(
                        source = %source.url,
                        page,
                        attempt = retries,
                        backoff_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying page"
                    );
                    self.sleeper.sleep(delay).await;
                    continue;
                }
                Err(e) => {
                    tracing::error!(source = %source.url, page, error = %e, "page request rejected");
                    return report.fail(SweepFailure::Permanent {
                        page,
                        error: e.to_string(),
                    });
                }
            };

            if orders.is_empty() {
                tracing::info!(
                    source = %source.url,
                    filter = filter.label(),
                    pages = report.pages,
                    records = report.records,
                    "sweep completed"
                );
                return report;
            }

            let records = match orders
                .into_iter()
                .map(|o| o.into_record(&source.url))
                .collect::<Result<Vec<_>, _>>()
            {
                Ok(records) => records,
                Err(error) => {
                    tracing::error!(source = %source.url, page, %error, "malformed order in page");
                    return report.fail(SweepFailure::Permanent { page, error });
                }
            };

            let counts = match sink.persist(&records).await {
                Ok(counts) => counts,
                Err(e) => {
                    tracing::error!(source = %source.url, page, error = %e, "failed to store page");
                    return report.fail(SweepFailure::Storage {
                        page,
                        error: e.to_string(),
                    });
                }
            };

            tracing::debug!(
                source = %source.url,
                page,
                records = records.len(),
                inserted = counts.inserted,
                updated = counts.updated,
                "page stored"
            );
            report.absorb(&records, counts);
            page += 1;
            retries = 0;
            self.sleeper.sleep(self.settings.page_delay.sample()).await;
        }
    }
}
