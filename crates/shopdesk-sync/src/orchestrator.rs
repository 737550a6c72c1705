//! # Sync Orchestrator
//!
//! Drives one reconciliation cycle and the recurring schedule.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           run_cycle()                                   │
//! │                                                                         │
//! │  no session ──────────────────────────────► Skipped(NoSession)         │
//! │  in-progress flag held ───────────────────► Skipped(InProgress)        │
//! │                                                                         │
//! │  Idle ──► Syncing                                                       │
//! │    1. probe          Unreachable/Unknown ──► Deferred (quiet)          │
//! │    2. pull_all                                                          │
//! │    3. push_all                                                          │
//! │    4. record completion (status + lastSync)                            │
//! │    5. data-refreshed for all 14 collections + UI callbacks             │
//! │  Syncing ──► Idle                                                       │
//! │                                                                         │
//! │  FAILURES:                                                              │
//! │  transient offline  → sticky flag, Deferred, no notification           │
//! │  malformed channel  → reset + one re-run after 2s, then surfaced       │
//! │  anything else      → error notification + sync-domain retry           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling
//! Periodic ticks, channel-reset re-runs and sync retries are spawned tokio
//! tasks. Each re-enters through [`SyncOrchestrator::run_cycle`], so the
//! in-progress flag is the single point of mutual exclusion. Cancelling a
//! timer never interrupts a cycle already running.

use ::backoff::backoff::Backoff;
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapter::DataAdapter;
use crate::cache::LocalCache;
use crate::context::EngineContext;
use crate::error::{ErrorClass, SyncError, SyncResult};
use crate::probe::{ConnectionProbe, ProbeResult};
use crate::remote::RemoteStore;
use shopdesk_core::{meta_keys, CollectionName, Connectivity, SyncSession};

// =============================================================================
// Cycle Outcome
// =============================================================================

/// Why a cycle did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another cycle holds the in-progress flag.
    InProgress,
    /// No session is live.
    NoSession,
}

/// Result of one `run_cycle` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Probe, pull and push all finished.
    Completed,
    /// The cycle never started.
    Skipped(SkipReason),
    /// The store was not reachable; nothing was transferred.
    Deferred(ProbeResult),
    /// The cycle failed with an error of this class.
    Failed(ErrorClass),
}

impl CycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed)
    }
}

// =============================================================================
// Sync Orchestrator
// =============================================================================

/// Runs sync cycles and owns the periodic timer.
pub struct SyncOrchestrator {
    ctx: Arc<EngineContext>,
    probe: ConnectionProbe,
    adapter: Arc<dyn DataAdapter>,
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    periodic: Mutex<Option<JoinHandle<()>>>,
    channel_retry_pending: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(
        ctx: Arc<EngineContext>,
        probe: ConnectionProbe,
        adapter: Arc<dyn DataAdapter>,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
    ) -> Self {
        SyncOrchestrator {
            ctx,
            probe,
            adapter,
            remote,
            cache,
            periodic: Mutex::new(None),
            channel_retry_pending: AtomicBool::new(false),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn DataAdapter> {
        &self.adapter
    }

    /// Runs one reconciliation cycle.
    ///
    /// Never returns an error: failures are classified and handled here.
    pub async fn run_cycle(self: &Arc<Self>) -> CycleOutcome {
        let Some(session) = self.ctx.session().await else {
            debug!("No active session, skipping sync cycle");
            return CycleOutcome::Skipped(SkipReason::NoSession);
        };

        if !self.ctx.try_begin_cycle().await {
            info!("Sync cycle already in progress, ignoring trigger");
            return CycleOutcome::Skipped(SkipReason::InProgress);
        }

        let cycle_id = Uuid::new_v4();
        info!(%cycle_id, subject_id = %session.subject_id, "Starting sync cycle");

        match self.execute(&session).await {
            Ok(ProbeResult::Reachable) => {
                let completed_at = Utc::now();
                self.ctx.finish_cycle(Some(completed_at)).await;
                self.ctx.sync_backoff.lock().await.reset();
                self.ctx.update_status(|s| s.retry_count = 0).await;
                self.channel_retry_pending.store(false, Ordering::SeqCst);

                for name in CollectionName::iter() {
                    self.ctx.emitter.emit_data_refreshed(name);
                    self.ctx.refresh_callbacks.notify(name).await;
                }

                info!(%cycle_id, %completed_at, "Sync cycle completed");
                CycleOutcome::Completed
            }
            Ok(probe) => {
                self.ctx.finish_cycle(None).await;
                debug!(%cycle_id, %probe, "Remote store not reachable, deferring cycle");
                CycleOutcome::Deferred(probe)
            }
            Err(e) => {
                self.ctx.finish_cycle(None).await;
                self.handle_failure(e).await
            }
        }
    }

    /// Probe, pull, push, stamp.
    async fn execute(&self, session: &SyncSession) -> SyncResult<ProbeResult> {
        let probe = self.probe.probe().await?;
        if !probe.is_reachable() {
            return Ok(probe);
        }

        self.adapter.pull_all(session).await?;
        self.adapter.push_all(session).await?;

        let stamp = Utc::now().to_rfc3339();
        if let Err(e) = self.cache.write_meta(meta_keys::LAST_SYNC, &stamp).await {
            warn!(error = %e, "Failed to record last sync time");
        }

        Ok(ProbeResult::Reachable)
    }

    async fn handle_failure(self: &Arc<Self>, err: SyncError) -> CycleOutcome {
        let class = err.class();
        match class {
            ErrorClass::TransientOffline => {
                debug!(error = %err, "Store went offline mid-cycle, deferring");
                self.ctx.set_connectivity(Connectivity::Offline).await;
                CycleOutcome::Deferred(ProbeResult::Unreachable)
            }
            ErrorClass::MalformedChannel
                if !self.channel_retry_pending.swap(true, Ordering::SeqCst) =>
            {
                warn!(error = %err, "Malformed channel, resetting connection and retrying once");
                if self.remote.supports_reset() {
                    if let Err(e) = self.remote.reset_connection().await {
                        warn!(error = %e, "Connection reset failed");
                    }
                }
                self.schedule_channel_retry();
                CycleOutcome::Failed(class)
            }
            ErrorClass::MalformedChannel => {
                // Reset already spent on this failure run.
                self.channel_retry_pending.store(false, Ordering::SeqCst);
                self.surface(&err).await;
                CycleOutcome::Failed(class)
            }
            _ => {
                self.channel_retry_pending.store(false, Ordering::SeqCst);
                self.surface(&err).await;
                self.schedule_sync_retry().await;
                CycleOutcome::Failed(class)
            }
        }
    }

    /// Reports a failure to the host.
    async fn surface(&self, err: &SyncError) {
        error!(error = %err, class = %err.class(), "Sync cycle failed");
        let message = err.to_string();
        self.ctx
            .update_status(|s| s.last_error = Some(message.clone()))
            .await;
        self.ctx.emitter.emit_error(&message, err.is_retryable());
    }

    // =========================================================================
    // Deferred Re-runs
    // =========================================================================

    /// A boxed `run_cycle` for scheduled tasks.
    fn rerun(self: &Arc<Self>) -> Pin<Box<dyn Future<Output = CycleOutcome> + Send>> {
        let this = self.clone();
        Box::pin(async move { this.run_cycle().await })
    }

    fn schedule_channel_retry(self: &Arc<Self>) {
        let delay = self.ctx.config().channel_reset_delay();
        let retry = self.rerun();
        let this = self.clone();
        self.schedule(delay, async move {
            let outcome = retry.await;
            // A retry that never reached the store does not use up the reset.
            if matches!(outcome, CycleOutcome::Skipped(_) | CycleOutcome::Deferred(_)) {
                this.channel_retry_pending.store(false, Ordering::SeqCst);
            }
        });
    }

    async fn schedule_sync_retry(self: &Arc<Self>) {
        let next = {
            let mut backoff = self.ctx.sync_backoff.lock().await;
            backoff.next_backoff().map(|delay| (delay, backoff.attempt()))
        };

        match next {
            Some((delay, attempt)) => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling sync retry");
                self.ctx.update_status(|s| s.retry_count = attempt).await;

                let retry = self.rerun();
                self.schedule(delay, async move {
                    retry.await;
                });
            }
            None => {
                error!("Sync retries exhausted, giving up until the next trigger");
                self.ctx.sync_backoff.lock().await.reset();
                self.ctx.update_status(|s| s.retry_count = 0).await;
            }
        }
    }

    /// Runs `task` after `delay` unless the engine shuts down first.
    fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.ctx.shutdown_signal();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => task.await,
                _ = shutdown => {
                    debug!("Scheduled sync work cancelled by shutdown");
                }
            }
        });
    }

    // =========================================================================
    // Periodic Timer
    // =========================================================================

    /// Arms the periodic timer. No-op if already armed.
    pub async fn start_periodic(self: &Arc<Self>) {
        self.start_periodic_unless(|| false).await;
    }

    /// Arms the periodic timer unless `stale()` holds.
    ///
    /// `stale` is checked under the timer lock, the same lock
    /// [`stop_periodic`](Self::stop_periodic) takes, so a caller that bumps
    /// its own state before stopping the timer can never be overtaken by a
    /// late arm. Nothing is armed once shutdown has been signalled.
    pub(crate) async fn start_periodic_unless<F>(self: &Arc<Self>, stale: F) -> bool
    where
        F: Fn() -> bool,
    {
        let interval = self.ctx.config().periodic_interval();
        {
            let mut periodic = self.periodic.lock().unwrap_or_else(PoisonError::into_inner);
            if periodic.is_some() {
                return true;
            }
            if self.ctx.is_shutting_down() || stale() {
                debug!("Periodic sync not armed");
                return false;
            }

            let this = self.clone();
            *periodic = Some(tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    debug!("Periodic sync tick");
                    // Detached so stopping the timer never cuts a cycle short.
                    let cycle = this.clone();
                    tokio::spawn(async move {
                        cycle.run_cycle().await;
                    });
                }
            }));
        }

        info!(interval_secs = interval.as_secs(), "Periodic sync armed");
        self.sync_periodic_status().await;
        true
    }

    /// Cancels the periodic timer. A cycle already running completes.
    pub async fn stop_periodic(&self) {
        let handle = self
            .periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            handle.abort();
            info!("Periodic sync stopped");
        }
        self.sync_periodic_status().await;
    }

    /// Mirrors the timer slot into the status snapshot, read under the
    /// status lock so racing start/stop calls settle on the real state.
    async fn sync_periodic_status(&self) {
        self.ctx
            .update_status(|s| s.periodic_active = self.is_periodic_active())
            .await;
    }

    pub fn is_periodic_active(&self) -> bool {
        self.periodic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
