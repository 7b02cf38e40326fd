//! Continuous sync loop and its control handle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use ordersync_common::error::{SyncError, SyncResult};
use ordersync_db::control::models::SyncControl;
use ordersync_db::control::repositories::SyncControlRepository;

use crate::orchestrator::{CycleReport, SyncOrchestrator};
use crate::pacing::Sleeper;
use crate::store::client::OrderSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub enabled: bool,
    pub interval: Duration,
}

impl LoopSettings {
    pub fn from_control(control: &SyncControl) -> Self {
        Self {
            enabled: control.enabled,
            interval: Duration::from_secs(control.interval_secs.max(1) as u64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    /// Run a cycle now, even when the loop is disabled.
    RunNow,
}

#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self) -> CycleReport;
}

#[async_trait]
impl<C: OrderSource, S: Sleeper> CycleRunner for SyncOrchestrator<C, S> {
    async fn run_cycle(&self) -> CycleReport {
        SyncOrchestrator::run_cycle(self).await
    }
}

/// Single-flight gate around a cycle.
#[async_trait]
pub trait CycleGuard: Send + Sync {
    /// A hold token, or `None` when another cycle holds the gate.
    async fn try_begin(&self) -> SyncResult<Option<Uuid>>;
    /// `false` once the hold has been taken over.
    async fn heartbeat(&self, token: Uuid) -> SyncResult<bool>;
    /// `false` when the hold had already been taken over.
    async fn finish(&self, token: Uuid) -> SyncResult<bool>;
    /// How often a running cycle refreshes its hold.
    fn heartbeat_every(&self) -> Duration;
}

/// Gate backed by the `running` flag of a `sync_control` row.
///
/// A holder whose heartbeat is older than `stale_after` is treated as dead
/// and may be taken over.
pub struct ControlRowGuard {
    control: Arc<dyn SyncControlRepository>,
    scope: String,
    stale_after: Duration,
}

impl ControlRowGuard {
    pub fn new(control: Arc<dyn SyncControlRepository>, scope: &str, stale_after: Duration) -> Self {
        Self {
            control,
            scope: scope.to_owned(),
            stale_after,
        }
    }
}

#[async_trait]
impl CycleGuard for ControlRowGuard {
    async fn try_begin(&self) -> SyncResult<Option<Uuid>> {
        let token = Uuid::new_v4();
        let acquired = self
            .control
            .try_begin_cycle(&self.scope, token, self.stale_after)
            .await?;
        Ok(acquired.map(|_| token))
    }

    async fn heartbeat(&self, token: Uuid) -> SyncResult<bool> {
        self.control.heartbeat(&self.scope, token).await
    }

    async fn finish(&self, token: Uuid) -> SyncResult<bool> {
        self.control.finish_cycle(&self.scope, token).await
    }

    fn heartbeat_every(&self) -> Duration {
        (self.stale_after / 4).max(Duration::from_secs(1))
    }
}

/// How a guarded cycle ended.
#[derive(Debug)]
pub enum GuardedCycle {
    Completed(CycleReport),
    /// Another cycle holds the gate.
    Busy,
    /// The hold was taken over mid-cycle and the cycle was abandoned.
    Lost,
    GuardFailed(SyncError),
}

/// Run one cycle under `guard`, refreshing the hold while it runs.
///
/// A cycle whose hold is taken over stops at its next suspension point;
/// the watermarks it has not written yet stay where they were.
pub async fn run_guarded_cycle<R: CycleRunner + ?Sized>(
    runner: &R,
    guard: &dyn CycleGuard,
) -> GuardedCycle {
    let token = match guard.try_begin().await {
        Ok(Some(token)) => token,
        Ok(None) => return GuardedCycle::Busy,
        Err(e) => return GuardedCycle::GuardFailed(e),
    };

    let every = guard.heartbeat_every();
    let mut beat = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    let mut cycle = runner.run_cycle();

    let report = loop {
        tokio::select! {
            report = &mut cycle => break report,
            _ = beat.tick() => match guard.heartbeat(token).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::error!(%token, "cycle hold taken over, abandoning cycle");
                    return GuardedCycle::Lost;
                }
                Err(e) => tracing::warn!(%token, error = %e, "cycle heartbeat failed"),
            },
        }
    };

    match guard.finish(token).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(%token, "cycle hold was taken over before release"),
        Err(e) => tracing::error!(%token, error = %e, "failed to release cycle guard"),
    }
    GuardedCycle::Completed(report)
}

/// Handle for steering a running [`SyncLoop`]. Dropping every clone stops the loop.
#[derive(Clone)]
pub struct SyncController {
    settings: Arc<watch::Sender<LoopSettings>>,
    commands: mpsc::Sender<LoopCommand>,
}

impl SyncController {
    pub fn settings(&self) -> LoopSettings {
        *self.settings.borrow()
    }

    pub fn update(&self, settings: LoopSettings) {
        self.settings.send_replace(settings);
    }

    /// Ask for an immediate cycle. A request already queued absorbs this one.
    pub fn trigger(&self) -> SyncResult<()> {
        match self.commands.try_send(LoopCommand::RunNow) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(SyncError::Internal("sync loop is not running".to_owned()))
            }
        }
    }
}

pub struct SyncLoop<R> {
    runner: R,
    guard: Arc<dyn CycleGuard>,
    settings: watch::Receiver<LoopSettings>,
    commands: mpsc::Receiver<LoopCommand>,
}

impl<R: CycleRunner> SyncLoop<R> {
    pub fn new(
        runner: R,
        guard: Arc<dyn CycleGuard>,
        initial: LoopSettings,
    ) -> (Self, SyncController) {
        let (settings_tx, settings_rx) = watch::channel(initial);
        let (commands_tx, commands_rx) = mpsc::channel(1);
        let sync_loop = Self {
            runner,
            guard,
            settings: settings_rx,
            commands: commands_rx,
        };
        let controller = SyncController {
            settings: Arc::new(settings_tx),
            commands: commands_tx,
        };
        (sync_loop, controller)
    }

    /// Run until the controller is dropped.
    ///
    /// Settings are read at the top of every decision; the interval timer
    /// restarts after each cycle and after each settings change.
    pub async fn run(mut self) {
        tracing::info!("sync loop started");
        loop {
            let current = *self.settings.borrow_and_update();
            let tick = async {
                if current.enabled {
                    tokio::time::sleep(current.interval).await;
                } else {
                    std::future::pending::<()>().await;
                }
            };

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(LoopCommand::RunNow) => self.run_guarded("manual").await,
                    None => break,
                },
                changed = self.settings.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = *self.settings.borrow();
                    tracing::info!(
                        enabled = next.enabled,
                        interval_secs = next.interval.as_secs(),
                        "sync loop settings changed"
                    );
                }
                _ = tick => self.run_guarded("scheduled").await,
            }
        }
        tracing::info!("sync loop stopped");
    }

    async fn run_guarded(&self, trigger: &'static str) {
        match run_guarded_cycle(&self.runner, self.guard.as_ref()).await {
            GuardedCycle::Completed(report) => tracing::info!(
                trigger,
                cycle_id = %report.cycle_id,
                sources = report.summaries.len(),
                failed = report.failed_sources(),
                "sync cycle done"
            ),
            GuardedCycle::Busy => {
                tracing::info!(trigger, "another sync cycle is running, skipping")
            }
            GuardedCycle::Lost => tracing::warn!(trigger, "sync cycle abandoned"),
            GuardedCycle::GuardFailed(e) => {
                tracing::error!(trigger, error = %e, "failed to acquire cycle guard")
            }
        }
    }
}
