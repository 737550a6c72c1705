//! # Connection Probe
//!
//! Cheap reachability check run at the start of every sync cycle.
//!
//! ## Probe Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          probe()                                        │
//! │                                                                         │
//! │  network monitor says offline? ──yes──► Unknown (no remote call)       │
//! │          │ no                                                           │
//! │          ▼                                                              │
//! │  sticky flag Offline + reset supported? ──yes──► reset_connection()    │
//! │          │                                          │ fails            │
//! │          │                                          └──► Unreachable   │
//! │          ▼                                                              │
//! │  read _health/probe ──ok──► flag Online, Reachable                     │
//! │          │                                                              │
//! │          ├── malformed channel ──► reset, read once more               │
//! │          │                          ok ──► Reachable                   │
//! │          │                          err ─► propagate                   │
//! │          ├── offline ──► flag Offline, Unreachable                     │
//! │          └── other ────► propagate                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Whether the health document exists is irrelevant; only the outcome of the
//! read matters.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::EngineContext;
use crate::error::{ErrorClass, SyncResult};
use crate::remote::{RemoteError, RemoteStore};
use shopdesk_core::Connectivity;

// =============================================================================
// Network Monitor
// =============================================================================

/// Host-level connectivity hint (e.g. the OS network state).
pub trait NetworkMonitor: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Monitor for hosts with no connectivity signal.
pub struct AlwaysOnline;

impl NetworkMonitor for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

// =============================================================================
// Probe Result
// =============================================================================

/// Outcome of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The remote store answered.
    Reachable,
    /// The remote store is known to be unreachable.
    Unreachable,
    /// The host reports no network; the store was not contacted.
    Unknown,
}

impl ProbeResult {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeResult::Reachable)
    }
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeResult::Reachable => write!(f, "reachable"),
            ProbeResult::Unreachable => write!(f, "unreachable"),
            ProbeResult::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Connection Probe
// =============================================================================

/// Determines whether the remote store is reachable.
pub struct ConnectionProbe {
    remote: Arc<dyn RemoteStore>,
    network: Arc<dyn NetworkMonitor>,
    ctx: Arc<EngineContext>,
}

impl ConnectionProbe {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        network: Arc<dyn NetworkMonitor>,
        ctx: Arc<EngineContext>,
    ) -> Self {
        ConnectionProbe {
            remote,
            network,
            ctx,
        }
    }

    /// Checks reachability, updating the sticky connectivity flag.
    ///
    /// Errors other than transient-offline are propagated to the caller.
    pub async fn probe(&self) -> SyncResult<ProbeResult> {
        if !self.network.is_online() {
            debug!("Host reports no network, skipping probe");
            return Ok(ProbeResult::Unknown);
        }

        if self.ctx.connectivity().await.is_offline() && self.remote.supports_reset() {
            info!("Store previously unreachable, resetting connection before probe");
            if let Err(e) = self.remote.reset_connection().await {
                warn!(error = %e, "Connection reset failed");
                return Ok(ProbeResult::Unreachable);
            }
        }

        match self.read_health().await {
            Ok(()) => self.mark_reachable().await,
            Err(e) if e.class() == ErrorClass::MalformedChannel => {
                warn!(error = %e, "Probe hit a malformed channel, resetting and retrying once");
                if self.remote.supports_reset() {
                    self.remote.reset_connection().await?;
                }
                self.read_health().await?;
                self.mark_reachable().await
            }
            Err(e) if e.class() == ErrorClass::TransientOffline => {
                debug!(error = %e, "Probe found store unreachable");
                self.ctx.set_connectivity(Connectivity::Offline).await;
                Ok(ProbeResult::Unreachable)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_health(&self) -> Result<(), RemoteError> {
        let remote = &self.ctx.config().remote;
        self.remote
            .read_document(&remote.health_collection, &remote.health_document)
            .await
            .map(|_| ())
    }

    async fn mark_reachable(&self) -> SyncResult<ProbeResult> {
        self.ctx.set_connectivity(Connectivity::Online).await;
        Ok(ProbeResult::Reachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::events::NoOpEmitter;
    use crate::memory::{ManualNetwork, MemoryRemoteStore};

    fn setup(remote: Arc<MemoryRemoteStore>, network: Arc<ManualNetwork>) -> ConnectionProbe {
        let ctx = Arc::new(EngineContext::new(
            Arc::new(SyncConfig::default()),
            Arc::new(NoOpEmitter),
        ));
        ConnectionProbe::new(remote, network, ctx)
    }

    #[tokio::test]
    async fn test_probe_reachable_sets_online() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let probe = setup(remote.clone(), Arc::new(ManualNetwork::new(true)));

        assert_eq!(probe.probe().await.unwrap(), ProbeResult::Reachable);
        assert_eq!(probe.ctx.connectivity().await, Connectivity::Online);
        assert_eq!(remote.read_count(), 1);
    }

    #[tokio::test]
    async fn test_probe_skips_remote_when_host_offline() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let probe = setup(remote.clone(), Arc::new(ManualNetwork::new(false)));

        assert_eq!(probe.probe().await.unwrap(), ProbeResult::Unknown);
        assert_eq!(remote.read_count(), 0);
    }

    #[tokio::test]
    async fn test_probe_offline_sets_sticky_flag() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.fail_next_reads(1, RemoteError::Offline("client is offline".into()));
        let probe = setup(remote.clone(), Arc::new(ManualNetwork::new(true)));

        assert_eq!(probe.probe().await.unwrap(), ProbeResult::Unreachable);
        assert_eq!(probe.ctx.connectivity().await, Connectivity::Offline);

        // Next probe resets first, then clears the flag.
        assert_eq!(probe.probe().await.unwrap(), ProbeResult::Reachable);
        assert_eq!(remote.reset_count(), 1);
        assert_eq!(probe.ctx.connectivity().await, Connectivity::Online);
    }

    #[tokio::test]
    async fn test_probe_reset_failure_is_unreachable() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let probe = setup(remote.clone(), Arc::new(ManualNetwork::new(true)));
        probe.ctx.set_connectivity(Connectivity::Offline).await;
        remote.fail_resets(true);

        assert_eq!(probe.probe().await.unwrap(), ProbeResult::Unreachable);
        assert_eq!(remote.read_count(), 0);
    }

    #[tokio::test]
    async fn test_probe_malformed_channel_retries_once() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.fail_next_reads(1, RemoteError::BadRequest("400".into()));
        let probe = setup(remote.clone(), Arc::new(ManualNetwork::new(true)));

        assert_eq!(probe.probe().await.unwrap(), ProbeResult::Reachable);
        assert_eq!(remote.reset_count(), 1);
        assert_eq!(remote.read_count(), 2);
    }

    #[tokio::test]
    async fn test_probe_malformed_channel_twice_propagates() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.fail_next_reads(2, RemoteError::BadRequest("400".into()));
        let probe = setup(remote.clone(), Arc::new(ManualNetwork::new(true)));

        let err = probe.probe().await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::MalformedChannel);
    }

    #[tokio::test]
    async fn test_probe_other_error_propagates() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.fail_next_reads(1, RemoteError::PermissionDenied("denied".into()));
        let probe = setup(remote, Arc::new(ManualNetwork::new(true)));

        let err = probe.probe().await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Unclassified);
    }
}
