//! # Engine Context
//!
//! Shared state every engine component reads and writes: configuration,
//! the live session, the sticky connectivity flag, the status snapshot, the
//! sync-domain retry budget and the shutdown signal.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          EngineContext                                  │
//! │                                                                         │
//! │  session       RwLock<Option<SyncSession>>   written by the binder     │
//! │  connectivity  RwLock<Connectivity>          written by probe + cycle  │
//! │  status        RwLock<EngineStatus>          snapshot for the UI       │
//! │  sync_backoff  Mutex<DomainBackoff>          sync-domain budget        │
//! │  shutdown      watch<bool>                   cancels scheduled work    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::debug;

use crate::backoff::{DomainBackoff, RetryDomain};
use crate::config::SyncConfig;
use crate::events::{RefreshCallbacks, SyncEventEmitter};
use shopdesk_core::{Connectivity, EngineState, EngineStatus, SyncSession};

/// State shared by the probe, binder, adapter and orchestrator.
pub struct EngineContext {
    pub(crate) config: Arc<SyncConfig>,
    pub(crate) emitter: Arc<dyn SyncEventEmitter>,
    pub(crate) refresh_callbacks: RefreshCallbacks,
    connectivity: RwLock<Connectivity>,
    session: RwLock<Option<SyncSession>>,
    status: RwLock<EngineStatus>,
    pub(crate) sync_backoff: Mutex<DomainBackoff>,
    shutdown_tx: watch::Sender<bool>,
}

impl EngineContext {
    pub fn new(config: Arc<SyncConfig>, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        let sync_backoff = config.retry_policy(RetryDomain::Sync).backoff();
        let (shutdown_tx, _) = watch::channel(false);

        EngineContext {
            config,
            emitter,
            refresh_callbacks: RefreshCallbacks::new(),
            connectivity: RwLock::new(Connectivity::Unknown),
            session: RwLock::new(None),
            status: RwLock::new(EngineStatus::default()),
            sync_backoff: Mutex::new(sync_backoff),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // =========================================================================
    // Connectivity
    // =========================================================================

    pub async fn connectivity(&self) -> Connectivity {
        *self.connectivity.read().await
    }

    /// Updates the sticky connectivity flag and mirrors it into the status.
    pub async fn set_connectivity(&self, connectivity: Connectivity) {
        let previous = std::mem::replace(&mut *self.connectivity.write().await, connectivity);
        if previous != connectivity {
            debug!(from = %previous, to = %connectivity, "Connectivity changed");
            self.update_status(|s| s.connectivity = connectivity).await;
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub async fn session(&self) -> Option<SyncSession> {
        self.session.read().await.clone()
    }

    /// Replaces the live session, returning the previous one.
    pub async fn set_session(&self, session: Option<SyncSession>) -> Option<SyncSession> {
        let identity = session.as_ref().map(|s| s.display_name().to_string());
        let previous = std::mem::replace(&mut *self.session.write().await, session);
        self.update_status(|s| s.session_identity = identity).await;
        previous
    }

    // =========================================================================
    // Cycle Flag
    // =========================================================================

    /// Claims the in-progress flag. Returns false if another cycle holds it.
    pub async fn try_begin_cycle(&self) -> bool {
        let snapshot = {
            let mut status = self.status.write().await;
            if status.cycle_in_progress {
                return false;
            }
            status.cycle_in_progress = true;
            status.state = EngineState::Syncing;
            status.clone()
        };
        self.emitter.emit_status(&snapshot);
        true
    }

    /// Releases the in-progress flag, stamping `completed_at` when the cycle
    /// succeeded.
    pub async fn finish_cycle(&self, completed_at: Option<DateTime<Utc>>) {
        self.update_status(|s| {
            s.cycle_in_progress = false;
            s.state = if s.degraded {
                EngineState::Degraded
            } else {
                EngineState::Idle
            };
            if let Some(at) = completed_at {
                s.last_cycle_time = Some(at);
                s.last_error = None;
            }
        })
        .await;
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub async fn status(&self) -> EngineStatus {
        self.status.read().await.clone()
    }

    /// Applies `f` to the status and emits the resulting snapshot.
    pub async fn update_status<F>(&self, f: F) -> EngineStatus
    where
        F: FnOnce(&mut EngineStatus),
    {
        let snapshot = {
            let mut status = self.status.write().await;
            f(&mut status);
            status.clone()
        };
        self.emitter.emit_status(&snapshot);
        snapshot
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Resolves once shutdown is signalled.
    ///
    /// The returned future holds no borrow of the channel between polls, so
    /// it can sit in a `select!` inside a spawned task.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown_tx.subscribe();
        async move {
            // The sender lives as long as the context.
            let _ = rx.wait_for(|stop| *stop).await;
        }
    }

    pub fn signal_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoOpEmitter;

    fn context() -> EngineContext {
        EngineContext::new(Arc::new(SyncConfig::default()), Arc::new(NoOpEmitter))
    }

    #[tokio::test]
    async fn test_cycle_flag_is_exclusive() {
        let ctx = context();

        assert!(ctx.try_begin_cycle().await);
        assert!(!ctx.try_begin_cycle().await);
        assert_eq!(ctx.status().await.state, EngineState::Syncing);

        let now = Utc::now();
        ctx.finish_cycle(Some(now)).await;
        let status = ctx.status().await;
        assert!(!status.cycle_in_progress);
        assert_eq!(status.state, EngineState::Idle);
        assert_eq!(status.last_cycle_time, Some(now));

        assert!(ctx.try_begin_cycle().await);
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_last_time() {
        let ctx = context();
        assert!(ctx.try_begin_cycle().await);
        ctx.finish_cycle(None).await;
        assert_eq!(ctx.status().await.last_cycle_time, None);
    }

    #[tokio::test]
    async fn test_degraded_survives_cycle() {
        let ctx = context();
        ctx.update_status(|s| {
            s.degraded = true;
            s.state = EngineState::Degraded;
        })
        .await;

        assert!(ctx.try_begin_cycle().await);
        ctx.finish_cycle(Some(Utc::now())).await;
        assert_eq!(ctx.status().await.state, EngineState::Degraded);
    }

    #[tokio::test]
    async fn test_session_mirrored_into_status() {
        let ctx = context();
        let previous = ctx
            .set_session(Some(SyncSession::new("u1", Some("owner@shop.test".into()))))
            .await;
        assert!(previous.is_none());
        assert_eq!(
            ctx.status().await.session_identity.as_deref(),
            Some("owner@shop.test")
        );

        let previous = ctx.set_session(None).await;
        assert_eq!(previous.map(|s| s.subject_id), Some("u1".to_string()));
        assert_eq!(ctx.status().await.session_identity, None);
    }

    #[tokio::test]
    async fn test_connectivity_mirrored_into_status() {
        let ctx = context();
        ctx.set_connectivity(Connectivity::Offline).await;
        assert!(ctx.connectivity().await.is_offline());
        assert_eq!(ctx.status().await.connectivity, Connectivity::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_signal() {
        let ctx = Arc::new(context());
        let signal = ctx.shutdown_signal();
        let waiter = tokio::spawn(signal);

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        assert!(!ctx.is_shutting_down());

        ctx.signal_shutdown();
        waiter.await.unwrap();
        assert!(ctx.is_shutting_down());
    }
}
