//! # shopdesk-sync: Synchronization Engine for Shopdesk
//!
//! Reconciles the device-local cache with the remote document store for the
//! fixed set of business collections, surviving network and auth instability
//! and running at most one reconciliation at a time.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Engine Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 SyncEngine (built by SyncEngineBuilder)          │  │
//! │  │                                                                  │  │
//! │  │  Setup with init-domain retries, degraded mode + recovery loop  │  │
//! │  │  Administrative surface for the UI                              │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ AuthSession    │  │     Sync       │  │   DataAdapter          │    │
//! │  │ Binder         │─►│  Orchestrator  │─►│                        │    │
//! │  │                │  │                │  │ PerCollectionAdapter   │    │
//! │  │ session gain → │  │ probe → pull → │  │   or BulkAdapter       │    │
//! │  │ cycle+periodic │  │ push → notify  │  │                        │    │
//! │  │ loss → stop,   │  │ periodic timer │  └────────────────────────┘    │
//! │  │ auto sign-in   │  │ retries        │                                 │
//! │  └────────────────┘  └───────┬────────┘                                 │
//! │                              ▼                                          │
//! │                     ┌────────────────┐   ┌────────────────────────┐    │
//! │                     │ConnectionProbe │   │ Backoff (init / sync)  │    │
//! │                     │ sticky offline │   │ min(base·2^(n-1), cap) │    │
//! │                     └────────────────┘   └────────────────────────┘    │
//! │                                                                         │
//! │  EngineContext: config, session, connectivity, status, shutdown        │
//! │                                                                         │
//! │  STATUS EVENTS (to the UI):                                            │
//! │  • "sync://status"         - EngineStatus snapshot                     │
//! │  • "sync://data-refreshed" - one per collection after a cycle          │
//! │  • "sync://error"          - surfaced failures                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### Collaborator Interfaces
//! - [`remote`] - Remote store and bulk data manager traits
//! - [`auth`] - Auth provider trait and session subscription
//! - [`cache`] - Local cache trait (implemented for `shopdesk_db::Database`)
//!
//! ### Engine Components
//! - [`probe`] - Connection probe
//! - [`session`] - Auth session binder
//! - [`adapter`] - Data access adapters
//! - [`backoff`] - Retry policies and backoff sequences
//! - [`orchestrator`] - Sync cycles and periodic scheduling
//! - [`engine`] - `SyncEngine` and its builder
//!
//! ### Support
//! - [`config`] - TOML + environment configuration
//! - [`context`] - Shared engine state
//! - [`events`] - Event emitter and refresh callbacks
//! - [`error`] - Error types and classification
//! - [`memory`] - In-memory collaborators
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopdesk_sync::{SyncConfig, SyncEngineBuilder};
//!
//! let engine = SyncEngineBuilder::new(SyncConfig::load_or_default(None))
//!     .with_remote(remote_store)
//!     .with_cache(Arc::new(database))
//!     .with_auth(auth_provider)
//!     .with_emitter(ui_emitter)
//!     .build()?;
//!
//! engine.start().await?;
//! engine.run_manual_cycle().await;
//! println!("Last cycle: {:?}", engine.status().await.last_cycle_time);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

// Collaborator interfaces
pub mod auth;
pub mod cache;
pub mod remote;

// Engine components
pub mod adapter;
pub mod backoff;
pub mod engine;
pub mod orchestrator;
pub mod probe;
pub mod session;

// Support
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod memory;

// =============================================================================
// Re-exports
// =============================================================================

pub use adapter::{AdapterKind, DataAdapter, PullOutcome, PushOutcome, TransferReport};
pub use auth::{AuthError, AuthProvider, AuthUser, SessionSubscription};
pub use crate::backoff::{DomainBackoff, RetryDomain, RetryPolicy};
pub use cache::LocalCache;
pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use error::{ErrorClass, SyncError, SyncResult};
pub use events::{NoOpEmitter, SyncEventEmitter};
pub use orchestrator::{CycleOutcome, SkipReason};
pub use probe::{NetworkMonitor, ProbeResult};
pub use remote::{BulkDataManager, Document, RemoteError, RemoteStore, WriteOptions};
pub use session::AutoSignIn;
