//! # Sync Engine
//!
//! Public entry point. Wires the probe, adapter, orchestrator and session
//! binder together, runs setup with the init-domain retry budget, and exposes
//! the administrative surface to the host.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            start()                                      │
//! │                                                                         │
//! │  setup ──ok──► initialized = true, binder listening                    │
//! │    │                                                                    │
//! │    │ err (attempt n)                                                    │
//! │    ▼                                                                    │
//! │  n < 3 ──► sleep delay(n) (2s, 4s) ──► setup again                     │
//! │  n = 3 ──► Degraded: initialized = true, degraded = true               │
//! │              │                                                          │
//! │              └──► recovery loop: every 2 min re-run setup              │
//! │                     ok ──► degraded = false, state Idle, loop ends     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use shopdesk_db::{Database, DbConfig};
//! use shopdesk_sync::memory::MemoryRemoteStore;
//! use shopdesk_sync::{SyncConfig, SyncEngineBuilder};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DbConfig::new("./shopdesk.db")).await?;
//! let engine = SyncEngineBuilder::new(SyncConfig::load_or_default(None))
//!     .with_remote(Arc::new(MemoryRemoteStore::new()))
//!     .with_cache(Arc::new(db))
//!     .build()?;
//!
//! engine.start().await?;
//! println!("{:?}", engine.status().await);
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

use ::backoff::backoff::Backoff;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::adapter::{BulkAdapter, DataAdapter, PerCollectionAdapter, PullOutcome, PushOutcome, TransferReport};
use crate::auth::AuthProvider;
use crate::backoff::RetryDomain;
use crate::cache::LocalCache;
use crate::config::SyncConfig;
use crate::context::EngineContext;
use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, RefreshCallback, SyncEventEmitter};
use crate::orchestrator::{CycleOutcome, SyncOrchestrator};
use crate::probe::{AlwaysOnline, ConnectionProbe, NetworkMonitor};
use crate::remote::{BulkDataManager, RemoteStore};
use crate::session::{AuthSessionBinder, AutoSignIn};
use shopdesk_core::validation::validate_credentials;
use shopdesk_core::{CollectionName, EngineState, EngineStatus, SyncSession};

// =============================================================================
// Sync Engine
// =============================================================================

/// Handle to a running synchronization engine. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    ctx: Arc<EngineContext>,
    orchestrator: Arc<SyncOrchestrator>,
    binder: Arc<AuthSessionBinder>,
    cache: Arc<dyn LocalCache>,
    recovery: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SyncEngine {
    /// Runs setup, retrying within the init budget.
    ///
    /// Returns `Ok` both when setup succeeds and when the budget runs out and
    /// the engine falls back to degraded mode.
    pub async fn start(&self) -> SyncResult<()> {
        let policy = self.ctx.config().retry_policy(RetryDomain::Init);
        let mut backoff = policy.backoff();
        let shutdown = self.ctx.shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            let err = match self.binder.setup().await {
                Ok(()) => {
                    self.ctx
                        .update_status(|s| {
                            s.initialized = true;
                            s.init_retry_count = 0;
                        })
                        .await;
                    info!(retries = backoff.attempt(), "Sync engine started");
                    return Ok(());
                }
                Err(e) => e,
            };

            let delay = backoff
                .next_backoff()
                .filter(|_| backoff.attempt() < policy.max_retries);
            let attempt = backoff.attempt();
            self.ctx.update_status(|s| s.init_retry_count = attempt).await;

            let Some(delay) = delay else {
                error!(error = %err, attempts = attempt, "Engine setup retries exhausted");
                self.enter_degraded(&err).await;
                return Ok(());
            };

            warn!(
                error = %err,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Engine setup failed, retrying"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => return Err(SyncError::ShuttingDown),
            }
        }
    }

    async fn enter_degraded(&self, err: &SyncError) {
        let message = err.to_string();
        self.ctx
            .update_status(|s| {
                s.initialized = true;
                s.degraded = true;
                s.state = EngineState::Degraded;
                s.last_error = Some(message.clone());
            })
            .await;
        self.ctx.emitter.emit_error(&message, true);

        let interval = self.ctx.config().degraded_probe_interval();
        let ctx = self.ctx.clone();
        let binder = self.binder.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("Degraded mode: re-attempting setup");
                match binder.setup().await {
                    Ok(()) => {
                        ctx.update_status(|s| {
                            s.degraded = false;
                            s.init_retry_count = 0;
                            s.last_error = None;
                            if s.state == EngineState::Degraded {
                                s.state = EngineState::Idle;
                            }
                        })
                        .await;
                        info!("Recovered from degraded mode");
                        break;
                    }
                    Err(e) => debug!(error = %e, "Still degraded"),
                }
            }
        });

        warn!(
            interval_secs = interval.as_secs(),
            "Entered degraded mode, running local-cache-only"
        );
        let previous = self
            .recovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    // =========================================================================
    // Cycles
    // =========================================================================

    /// Runs a cycle now, through the same path as scheduled cycles.
    pub async fn run_manual_cycle(&self) -> CycleOutcome {
        info!("Manual sync cycle requested");
        self.orchestrator.run_cycle().await
    }

    pub async fn status(&self) -> EngineStatus {
        self.ctx.status().await
    }

    pub async fn session(&self) -> Option<SyncSession> {
        self.ctx.session().await
    }

    pub async fn start_periodic(&self) {
        self.orchestrator.start_periodic().await;
    }

    pub async fn stop_periodic(&self) {
        self.orchestrator.stop_periodic().await;
    }

    /// Replaces local copies with the remote ones, without pushing.
    pub async fn force_pull_overwrite_local(&self) -> SyncResult<TransferReport> {
        let session = self.ctx.session().await.ok_or(SyncError::NoSession)?;
        if !self.ctx.try_begin_cycle().await {
            return Err(SyncError::CycleInProgress);
        }

        warn!(subject_id = %session.subject_id, "Forcing remote data over local cache");
        let result = self.orchestrator.adapter().pull_all(&session).await;
        self.ctx.finish_cycle(None).await;

        let report = result?;
        for name in &report.transferred {
            self.notify_refreshed(*name).await;
        }
        Ok(report)
    }

    /// Pulls one collection.
    pub async fn pull_collection(&self, name: CollectionName) -> SyncResult<PullOutcome> {
        let session = self.ctx.session().await.ok_or(SyncError::NoSession)?;
        if !self.ctx.try_begin_cycle().await {
            return Err(SyncError::CycleInProgress);
        }

        let result = self.orchestrator.adapter().pull_one(&session, name).await;
        self.ctx.finish_cycle(None).await;

        let outcome = result?;
        if let PullOutcome::Replaced(_) = outcome {
            self.notify_refreshed(name).await;
        }
        Ok(outcome)
    }

    /// Pushes one collection.
    pub async fn push_collection(&self, name: CollectionName) -> SyncResult<PushOutcome> {
        let session = self.ctx.session().await.ok_or(SyncError::NoSession)?;
        if !self.ctx.try_begin_cycle().await {
            return Err(SyncError::CycleInProgress);
        }

        let result = self.orchestrator.adapter().push_one(&session, name).await;
        self.ctx.finish_cycle(None).await;
        result
    }

    async fn notify_refreshed(&self, name: CollectionName) {
        self.ctx.emitter.emit_data_refreshed(name);
        self.ctx.refresh_callbacks.notify(name).await;
    }

    // =========================================================================
    // Credentials
    // =========================================================================

    /// Caches the configured fallback identity and signs in with it,
    /// provisioning the account on first use.
    pub async fn enable_session_bootstrap(&self) -> SyncResult<AutoSignIn> {
        let credentials = self.ctx.config().bootstrap.credentials().ok_or_else(|| {
            SyncError::InvalidConfig("bootstrap identity and secret are not configured".into())
        })?;
        if self.binder.auth().is_none() {
            return Err(SyncError::AuthNotConfigured);
        }
        validate_credentials(&credentials)?;

        info!(identity = %credentials.identity, "Enabling session bootstrap");
        self.cache.store_credentials(&credentials).await?;
        self.binder.auto_sign_in().await
    }

    pub async fn clear_cached_credentials(&self) -> SyncResult<()> {
        info!("Clearing cached credentials");
        self.cache.clear_credentials().await
    }

    /// Registers a callback run after each refresh of `collection`.
    pub async fn register_refresh_callback<F>(&self, collection: CollectionName, callback: F)
    where
        F: Fn(CollectionName) + Send + Sync + 'static,
    {
        let callback: RefreshCallback = Arc::new(callback);
        self.ctx
            .refresh_callbacks
            .register(collection, callback)
            .await;
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Stops timers and drops the session subscription. A cycle already
    /// running completes.
    pub async fn shutdown(&self) {
        info!("Shutting down sync engine");
        self.binder.dispose();
        // Signalled before the timer is stopped so a cycle finishing now
        // cannot re-arm it.
        self.ctx.signal_shutdown();
        self.orchestrator.stop_periodic().await;

        let recovery = self
            .recovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = recovery {
            handle.abort();
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`SyncEngine`].
///
/// The remote store and local cache are required. Without an auth provider
/// the engine runs local-cache-only. Supplying a bulk data manager selects
/// the bulk adapter.
pub struct SyncEngineBuilder {
    config: SyncConfig,
    remote: Option<Arc<dyn RemoteStore>>,
    cache: Option<Arc<dyn LocalCache>>,
    auth: Option<Arc<dyn AuthProvider>>,
    bulk: Option<Arc<dyn BulkDataManager>>,
    network: Arc<dyn NetworkMonitor>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl SyncEngineBuilder {
    pub fn new(config: SyncConfig) -> Self {
        SyncEngineBuilder {
            config,
            remote: None,
            cache: None,
            auth: None,
            bulk: None,
            network: Arc::new(AlwaysOnline),
            emitter: Arc::new(NoOpEmitter),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn LocalCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_bulk_manager(mut self, manager: Arc<dyn BulkDataManager>) -> Self {
        self.bulk = Some(manager);
        self
    }

    pub fn with_network_monitor(mut self, network: Arc<dyn NetworkMonitor>) -> Self {
        self.network = network;
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn build(self) -> SyncResult<SyncEngine> {
        self.config.validate()?;
        let remote = self
            .remote
            .ok_or_else(|| SyncError::InvalidConfig("a remote store is required".into()))?;
        let cache = self
            .cache
            .ok_or_else(|| SyncError::InvalidConfig("a local cache is required".into()))?;

        let config = Arc::new(self.config);
        let ctx = Arc::new(EngineContext::new(config.clone(), self.emitter));

        let per_collection =
            PerCollectionAdapter::new(remote.clone(), cache.clone(), config.remote.clone());
        let adapter: Arc<dyn DataAdapter> = match self.bulk {
            Some(manager) => Arc::new(BulkAdapter::new(manager, per_collection)),
            None => Arc::new(per_collection),
        };
        debug!(kind = ?adapter.kind(), "Data adapter selected");

        let probe = ConnectionProbe::new(remote.clone(), self.network, ctx.clone());
        let orchestrator = Arc::new(SyncOrchestrator::new(
            ctx.clone(),
            probe,
            adapter,
            remote,
            cache.clone(),
        ));
        let binder = Arc::new(AuthSessionBinder::new(
            ctx.clone(),
            self.auth,
            cache.clone(),
            orchestrator.clone(),
        ));

        Ok(SyncEngine {
            ctx,
            orchestrator,
            binder,
            cache,
            recovery: Arc::new(Mutex::new(None)),
        })
    }
}
