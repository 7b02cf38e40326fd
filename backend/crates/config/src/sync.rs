use std::time::Duration;

use ordersync_common::error::{SyncError, SyncResult};

use crate::env::{get_var_or, parse_var_or};

/// Tuning knobs for the synchronization engine and its background loop.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Single-flight scope name for the continuous loop.
    pub scope: String,
    pub page_size: u32,
    /// Failed attempts tolerated on one page before the sweep gives up.
    pub retry_budget: u32,
    pub request_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub page_delay_min: Duration,
    pub page_delay_max: Duration,
    pub source_delay_min: Duration,
    pub source_delay_max: Duration,
    pub max_pages: u32,
    pub loop_enabled: bool,
    pub loop_interval: Duration,
    /// A `running` cycle flag older than this may be taken over.
    pub stale_after: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scope: "default".to_owned(),
            page_size: 25,
            retry_budget: 3,
            request_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(1_000),
            backoff_max: Duration::from_millis(30_000),
            page_delay_min: Duration::from_millis(500),
            page_delay_max: Duration::from_millis(1_500),
            source_delay_min: Duration::from_millis(2_000),
            source_delay_max: Duration::from_millis(5_000),
            max_pages: 10_000,
            loop_enabled: false,
            loop_interval: Duration::from_secs(3_600),
            stale_after: Duration::from_secs(7_200),
        }
    }
}

impl SyncConfig {
    /// Load sync settings from `SYNC_*` environment variables.
    /// Every variable is optional; unset ones keep their defaults.
    pub fn from_env() -> SyncResult<Self> {
        let _ = dotenvy::dotenv();
        let d = Self::default();

        let cfg = Self {
            scope: get_var_or("SYNC_SCOPE", &d.scope),
            page_size: parse_var_or("SYNC_PAGE_SIZE", d.page_size)?,
            retry_budget: parse_var_or("SYNC_RETRY_BUDGET", d.retry_budget)?,
            request_timeout: secs("SYNC_TIMEOUT_SECS", d.request_timeout)?,
            backoff_base: millis("SYNC_BACKOFF_BASE_MS", d.backoff_base)?,
            backoff_max: millis("SYNC_BACKOFF_MAX_MS", d.backoff_max)?,
            page_delay_min: millis("SYNC_PAGE_DELAY_MIN_MS", d.page_delay_min)?,
            page_delay_max: millis("SYNC_PAGE_DELAY_MAX_MS", d.page_delay_max)?,
            source_delay_min: millis("SYNC_SOURCE_DELAY_MIN_MS", d.source_delay_min)?,
            source_delay_max: millis("SYNC_SOURCE_DELAY_MAX_MS", d.source_delay_max)?,
            max_pages: parse_var_or("SYNC_MAX_PAGES", d.max_pages)?,
            loop_enabled: parse_var_or("SYNC_ENABLED", d.loop_enabled)?,
            loop_interval: secs("SYNC_INTERVAL_SECS", d.loop_interval)?,
            stale_after: secs("SYNC_STALE_AFTER_SECS", d.stale_after)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.page_size == 0 || self.page_size > 100 {
            return Err(SyncError::Config(format!(
                "SYNC_PAGE_SIZE must be between 1 and 100, got {}",
                self.page_size
            )));
        }
        if self.retry_budget == 0 {
            return Err(SyncError::Config(
                "SYNC_RETRY_BUDGET must be at least 1".to_owned(),
            ));
        }
        if self.max_pages == 0 {
            return Err(SyncError::Config(
                "SYNC_MAX_PAGES must be at least 1".to_owned(),
            ));
        }
        if self.page_delay_min > self.page_delay_max {
            return Err(SyncError::Config(
                "SYNC_PAGE_DELAY_MIN_MS exceeds SYNC_PAGE_DELAY_MAX_MS".to_owned(),
            ));
        }
        if self.source_delay_min > self.source_delay_max {
            return Err(SyncError::Config(
                "SYNC_SOURCE_DELAY_MIN_MS exceeds SYNC_SOURCE_DELAY_MAX_MS".to_owned(),
            ));
        }
        if self.loop_interval.is_zero() {
            return Err(SyncError::Config(
                "SYNC_INTERVAL_SECS must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

fn secs(key: &str, default: Duration) -> SyncResult<Duration> {
    parse_var_or(key, default.as_secs()).map(Duration::from_secs)
}

fn millis(key: &str, default: Duration) -> SyncResult<Duration> {
    parse_var_or(key, default.as_millis() as u64).map(Duration::from_millis)
}
