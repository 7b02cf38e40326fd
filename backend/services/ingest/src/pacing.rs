//! Delays between requests: retry backoff and politeness pacing.
//!
//! Every wait goes through a [`Sleeper`] so the engine can be driven without
//! wall-clock time in tests.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use ordersync_config::SyncConfig;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts tolerated on one page.
    pub budget: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)` plus up
    /// to 25% jitter, capped at `max`, and never below `floor` when one is given.
    pub fn backoff(&self, retry: u32, floor: Option<Duration>) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let exp = retry.saturating_sub(1).min(20);
        let delay_ms = base_ms.saturating_mul(1u64 << exp).min(max_ms);

        let jitter_ms = if delay_ms >= 4 {
            rand::thread_rng().gen_range(0..=delay_ms / 4)
        } else {
            0
        };

        let delay = Duration::from_millis(delay_ms.saturating_add(jitter_ms).min(max_ms));
        match floor {
            Some(floor) => delay.max(floor),
            None => delay,
        }
    }
}

/// Uniformly random delay within `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn zero() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// After each persisted page.
    pub between_pages: DelayRange,
    /// After each source in a cycle.
    pub between_sources: DelayRange,
}

impl From<&SyncConfig> for RetryPolicy {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            budget: cfg.retry_budget,
            base: cfg.backoff_base,
            max: cfg.backoff_max,
        }
    }
}

impl From<&SyncConfig> for Pacing {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            between_pages: DelayRange::new(cfg.page_delay_min, cfg.page_delay_max),
            between_sources: DelayRange::new(cfg.source_delay_min, cfg.source_delay_max),
        }
    }
}
