//! # Auth Session Binder
//!
//! Owns the sync session lifecycle. Listens to the auth provider's session
//! changes and drives the orchestrator from them.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │             identity reported (new subject)                             │
//! │   NoSession ─────────────────────────────────► SessionActive           │
//! │       ▲        1. store session                     │                   │
//! │       │        2. run one full cycle                │                   │
//! │       │        3. arm periodic timer                │                   │
//! │       │                                             │                   │
//! │       └─────────────────────────────────────────────┘                   │
//! │             null identity reported                                      │
//! │                1. clear session                                         │
//! │                2. cancel periodic timer                                 │
//! │                3. automatic sign-in from cached credentials             │
//! │                                                                         │
//! │  AUTOMATIC SIGN-IN:                                                     │
//! │  cached pair? ──no──► nothing                                          │
//! │      │ yes                                                              │
//! │      ▼                                                                  │
//! │  sign_in ──ok──► (provider reports the identity → SessionActive)       │
//! │      │ principal not found                                              │
//! │      ▼                                                                  │
//! │  provision_account ──ok──► (as above)                                  │
//! │      │ err                  any other sign_in error                     │
//! │      ▼                          │                                       │
//! │  discard cached pair ◄──────────┘                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{AuthError, AuthProvider, AuthUser, SessionSubscription};
use crate::cache::LocalCache;
use crate::context::EngineContext;
use crate::error::{SyncError, SyncResult};
use crate::orchestrator::SyncOrchestrator;
use shopdesk_core::meta_keys;

/// Outcome of an automatic sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSignIn {
    /// No auth provider is configured.
    NoProvider,
    /// No cached credential pair.
    NoCredentials,
    /// Signed in with the cached pair.
    SignedIn(AuthUser),
    /// The principal did not exist and was provisioned with the cached pair.
    Provisioned(AuthUser),
    /// Sign-in failed; the cached pair was discarded.
    Discarded,
}

/// Binds auth session changes to the orchestrator.
pub struct AuthSessionBinder {
    ctx: Arc<EngineContext>,
    auth: Option<Arc<dyn AuthProvider>>,
    cache: Arc<dyn LocalCache>,
    orchestrator: Arc<SyncOrchestrator>,
    listener: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every session change; a gain cycle only arms the timer if
    /// its epoch is still current.
    epoch: AtomicU64,
}

impl AuthSessionBinder {
    pub fn new(
        ctx: Arc<EngineContext>,
        auth: Option<Arc<dyn AuthProvider>>,
        cache: Arc<dyn LocalCache>,
        orchestrator: Arc<SyncOrchestrator>,
    ) -> Self {
        AuthSessionBinder {
            ctx,
            auth,
            cache,
            orchestrator,
            listener: Mutex::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn auth(&self) -> Option<&Arc<dyn AuthProvider>> {
        self.auth.as_ref()
    }

    /// Waits for the auth provider and subscribes to session changes.
    ///
    /// Without a provider the engine runs local-cache-only and this returns
    /// `Ok`. A provider that does not become ready within the setup window
    /// yields [`SyncError::AuthUnavailable`].
    pub async fn setup(self: &Arc<Self>) -> SyncResult<()> {
        let Some(auth) = self.auth.clone() else {
            warn!("No auth provider configured, running local-cache-only");
            return Ok(());
        };

        let window = self.ctx.config().setup_timeout();
        match tokio::time::timeout(window, auth.wait_ready()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(SyncError::AuthUnavailable(window.as_secs())),
        }

        self.bind(auth.on_session_change());
        info!("Auth session binder ready");
        Ok(())
    }

    /// Starts listening on `subscription`, replacing any earlier listener.
    fn bind(self: &Arc<Self>, mut subscription: SessionSubscription) {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let initial = subscription.current();
            this.on_change(initial).await;

            while let Some(user) = subscription.changed().await {
                this.on_change(user).await;
            }
            debug!("Auth provider closed the session subscription");
        });

        let previous = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    async fn on_change(self: &Arc<Self>, user: Option<AuthUser>) {
        match user {
            Some(user) => self.on_session_gained(user).await,
            None => self.on_session_lost().await,
        }
    }

    async fn on_session_gained(self: &Arc<Self>, user: AuthUser) {
        let current = self.ctx.session().await;
        if current.as_ref().map(|s| s.subject_id.as_str()) == Some(user.uid.as_str()) {
            debug!(subject_id = %user.uid, "Session unchanged");
            return;
        }

        info!(subject_id = %user.uid, "Session gained");
        self.ctx.set_session(Some(user.to_session())).await;

        if let Err(e) = self
            .cache
            .write_meta(meta_keys::LAST_ACTIVE_SESSION, &user.uid)
            .await
        {
            warn!(error = %e, "Failed to record last active session");
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        // Detached so dropping the listener never cuts the cycle short.
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.orchestrator.run_cycle().await;
            debug!(?outcome, "Initial cycle for new session finished");

            let armed = this
                .orchestrator
                .start_periodic_unless(|| this.epoch.load(Ordering::SeqCst) != epoch)
                .await;
            if !armed {
                debug!("Session changed during initial cycle, periodic sync left off");
            }
        });
    }

    async fn on_session_lost(&self) {
        if let Some(previous) = self.ctx.set_session(None).await {
            info!(subject_id = %previous.subject_id, "Session lost");
        }
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.orchestrator.stop_periodic().await;

        match self.auto_sign_in().await {
            Ok(outcome) => debug!(?outcome, "Automatic sign-in finished"),
            Err(e) => warn!(error = %e, "Automatic sign-in failed"),
        }
    }

    /// Signs in with the cached credential pair, provisioning the account if
    /// the principal does not exist.
    pub async fn auto_sign_in(&self) -> SyncResult<AutoSignIn> {
        let Some(auth) = &self.auth else {
            return Ok(AutoSignIn::NoProvider);
        };
        let Some(credentials) = self.cache.cached_credentials().await? else {
            return Ok(AutoSignIn::NoCredentials);
        };

        info!(identity = %credentials.identity, "Attempting automatic sign-in");
        match auth
            .sign_in(&credentials.identity, &credentials.secret)
            .await
        {
            Ok(user) => Ok(AutoSignIn::SignedIn(user)),
            Err(AuthError::PrincipalNotFound(_)) => {
                info!(identity = %credentials.identity, "No account yet, provisioning");
                match auth
                    .provision_account(&credentials.identity, &credentials.secret)
                    .await
                {
                    Ok(user) => Ok(AutoSignIn::Provisioned(user)),
                    Err(e) => {
                        warn!(error = %e, "Provisioning failed, discarding cached credentials");
                        self.cache.clear_credentials().await?;
                        Ok(AutoSignIn::Discarded)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed, discarding cached credentials");
                self.cache.clear_credentials().await?;
                Ok(AutoSignIn::Discarded)
            }
        }
    }

    /// Drops the session subscription. Cycles it started keep running.
    pub fn dispose(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("Session subscription disposed");
        }
    }

    pub fn is_bound(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
