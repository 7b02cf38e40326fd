//! In-memory repository implementations.
//!
//! These back unit tests of the engine and the control surface so they can
//! run without Postgres. Semantics mirror the `Pg*` repositories, including
//! all-or-nothing batch upserts and `None`-keeps-value checkpoint writes.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::checkpoints::models::Checkpoint;
use crate::checkpoints::repositories::CheckpointRepository;
use crate::control::models::SyncControl;
use crate::control::repositories::SyncControlRepository;
use crate::orders::models::{OrderRecord, UpsertCounts};
use crate::orders::repositories::OrderRepository;
use crate::runs::models::{RunFilter, RunSummary};
use crate::runs::repositories::RunSummaryRepository;
use crate::sources::models::Source;
use crate::sources::repositories::SourceRepository;
use ordersync_common::error::{SyncError, SyncResult};

fn poisoned<T>(_: PoisonError<T>) -> SyncError {
    SyncError::Internal("lock poisoned".to_string())
}

#[derive(Default)]
pub struct InMemorySourceRepository {
    sources: Mutex<Vec<Source>>,
}

impl InMemorySourceRepository {
    pub fn with_sources(sources: Vec<Source>) -> Self {
        Self {
            sources: Mutex::new(sources),
        }
    }

    pub fn add(&self, source: Source) {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner).push(source);
    }
}

#[async_trait]
impl SourceRepository for InMemorySourceRepository {
    async fn list_enabled(&self) -> SyncResult<Vec<Source>> {
        let mut enabled: Vec<Source> = self
            .sources
            .lock()
            .map_err(poisoned)?
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect();
        enabled.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(enabled)
    }

    async fn get(&self, url: &str) -> SyncResult<Option<Source>> {
        Ok(self
            .sources
            .lock()
            .map_err(poisoned)?
            .iter()
            .find(|s| s.url == url)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    rows: Mutex<BTreeMap<(String, i64), OrderRecord>>,
    batch_sizes: Mutex<Vec<usize>>,
    fail_writes: AtomicBool,
}

impl InMemoryOrderRepository {
    /// Make every following `upsert_batch` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Sizes of the batches applied so far, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn all(&self) -> Vec<OrderRecord> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn upsert_batch(&self, records: &[OrderRecord]) -> SyncResult<UpsertCounts> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Database("write rejected".to_string()));
        }

        let mut rows = self.rows.lock().map_err(poisoned)?;
        let mut counts = UpsertCounts::default();
        let now = Utc::now();
        for record in records {
            let mut stored = record.clone();
            stored.updated_at = now;
            let key = (record.source_url.clone(), record.order_id);
            if rows.insert(key, stored).is_some() {
                counts.updated += 1;
            } else {
                counts.inserted += 1;
            }
        }
        self.batch_sizes.lock().map_err(poisoned)?.push(records.len());
        Ok(counts)
    }

    async fn get(&self, source_url: &str, order_id: i64) -> SyncResult<Option<OrderRecord>> {
        Ok(self
            .rows
            .lock()
            .map_err(poisoned)?
            .get(&(source_url.to_string(), order_id))
            .cloned())
    }

    async fn count_for_source(&self, source_url: &str) -> SyncResult<i64> {
        Ok(self
            .rows
            .lock()
            .map_err(poisoned)?
            .keys()
            .filter(|(url, _)| url == source_url)
            .count() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryCheckpointRepository {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
    history: Mutex<Vec<Checkpoint>>,
    fail_reads: AtomicBool,
}

impl InMemoryCheckpointRepository {
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Every checkpoint state written, in order.
    pub fn history(&self) -> Vec<Checkpoint> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl CheckpointRepository for InMemoryCheckpointRepository {
    async fn get_checkpoint(&self, source_url: &str) -> SyncResult<Checkpoint> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::Database("checkpoint read rejected".to_string()));
        }
        Ok(self
            .checkpoints
            .lock()
            .map_err(poisoned)?
            .get(source_url)
            .cloned()
            .unwrap_or_else(|| Checkpoint::empty(source_url)))
    }

    async fn advance_checkpoint(
        &self,
        source_url: &str,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> SyncResult<Checkpoint> {
        let mut checkpoints = self.checkpoints.lock().map_err(poisoned)?;
        let entry = checkpoints
            .entry(source_url.to_string())
            .or_insert_with(|| Checkpoint::empty(source_url));
        if created.is_some() {
            entry.last_created_seen = created;
        }
        if modified.is_some() {
            entry.last_modified_seen = modified;
        }
        entry.updated_at = Some(Utc::now());
        let snapshot = entry.clone();
        self.history.lock().map_err(poisoned)?.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn list_checkpoints(&self) -> SyncResult<Vec<Checkpoint>> {
        let mut all: Vec<Checkpoint> = self.checkpoints.lock().map_err(poisoned)?.values().cloned().collect();
        all.sort_by(|a, b| a.source_url.cmp(&b.source_url));
        Ok(all)
    }
}

#[derive(Default)]
pub struct InMemoryRunSummaryRepository {
    runs: Mutex<Vec<RunSummary>>,
}

impl InMemoryRunSummaryRepository {
    pub fn all(&self) -> Vec<RunSummary> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl RunSummaryRepository for InMemoryRunSummaryRepository {
    async fn append(&self, summary: &RunSummary) -> SyncResult<()> {
        self.runs.lock().map_err(poisoned)?.push(summary.clone());
        Ok(())
    }

    async fn list(&self, filter: RunFilter) -> SyncResult<Vec<RunSummary>> {
        let mut runs: Vec<RunSummary> = self
            .runs
            .lock()
            .map_err(poisoned)?
            .iter()
            .filter(|r| filter.source.as_deref().is_none_or(|s| r.source_url == s))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        runs.truncate(filter.effective_limit() as usize);
        Ok(runs)
    }

    async fn latest_per_source(&self) -> SyncResult<Vec<RunSummary>> {
        let mut latest: BTreeMap<String, RunSummary> = BTreeMap::new();
        for run in self.runs.lock().map_err(poisoned)?.iter() {
            match latest.get(&run.source_url) {
                Some(existing) if existing.finished_at >= run.finished_at => {}
                _ => {
                    latest.insert(run.source_url.clone(), run.clone());
                }
            }
        }
        Ok(latest.into_values().collect())
    }
}

#[derive(Default)]
pub struct InMemorySyncControlRepository {
    rows: Mutex<HashMap<String, SyncControl>>,
}

#[async_trait]
impl SyncControlRepository for InMemorySyncControlRepository {
    async fn get_or_create(
        &self,
        scope: &str,
        enabled: bool,
        interval_secs: i64,
    ) -> SyncResult<SyncControl> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        let row = rows.entry(scope.to_string()).or_insert_with(|| SyncControl {
            scope: scope.to_string(),
            enabled,
            interval_secs,
            running: false,
            cycle_token: None,
            cycle_started_at: None,
            heartbeat_at: None,
            last_cycle_finished_at: None,
            updated_at: Utc::now(),
        });
        Ok(row.clone())
    }

    async fn update_settings(
        &self,
        scope: &str,
        enabled: Option<bool>,
        interval_secs: Option<i64>,
    ) -> SyncResult<SyncControl> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        let row = rows
            .get_mut(scope)
            .ok_or_else(|| SyncError::NotFound(format!("sync control scope: {scope}")))?;
        if let Some(enabled) = enabled {
            row.enabled = enabled;
        }
        if let Some(secs) = interval_secs {
            row.interval_secs = secs;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn try_begin_cycle(
        &self,
        scope: &str,
        token: Uuid,
        stale_after: Duration,
    ) -> SyncResult<Option<SyncControl>> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        let row = rows
            .get_mut(scope)
            .ok_or_else(|| SyncError::NotFound(format!("sync control scope: {scope}")))?;
        let now = Utc::now();
        let stale = chrono::Duration::from_std(stale_after)
            .map_err(|e| SyncError::Internal(format!("stale_after out of range: {e}")))?;
        let is_stale = row.heartbeat_at.is_none_or(|t| t < now - stale);
        if row.running && !is_stale {
            return Ok(None);
        }
        row.running = true;
        row.cycle_token = Some(token);
        row.cycle_started_at = Some(now);
        row.heartbeat_at = Some(now);
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn heartbeat(&self, scope: &str, token: Uuid) -> SyncResult<bool> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        match rows.get_mut(scope) {
            Some(row) if row.running && row.cycle_token == Some(token) => {
                row.heartbeat_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finish_cycle(&self, scope: &str, token: Uuid) -> SyncResult<bool> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        match rows.get_mut(scope) {
            Some(row) if row.cycle_token == Some(token) => {
                let now = Utc::now();
                row.running = false;
                row.cycle_token = None;
                row.last_cycle_finished_at = Some(now);
                row.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
