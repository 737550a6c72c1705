//! # Domain Types
//!
//! Core types shared by the local cache and the synchronization engine.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CollectionName  │   │  SyncSession    │   │  EngineStatus   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  inventory      │   │  subject_id     │   │  initialized    │       │
//! │  │  customers      │   │  identity       │   │  lastCycleTime  │       │
//! │  │  invoices ...   │   │  started_at     │   │  retryCount ... │       │
//! │  │  (14, fixed)    │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  Connectivity   │   │  EngineState    │   │CachedCredentials│       │
//! │  │  Unknown        │   │  Idle           │   │  identity       │       │
//! │  │  Offline        │   │  Syncing        │   │  secret         │       │
//! │  │  Online         │   │  Degraded       │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// Collection Name
// =============================================================================

/// One logical dataset synced independently between the local cache and the
/// remote store.
///
/// The set is fixed at compile time and identical on both sides; there is no
/// dynamic discovery of collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum CollectionName {
    Inventory,
    Customers,
    Invoices,
    Repairs,
    Suppliers,
    PurchaseOrders,
    Expenses,
    Payments,
    Quotes,
    Employees,
    Appointments,
    Warranties,
    Categories,
    Settings,
}

impl CollectionName {
    /// Every collection, in the order a sync cycle visits them.
    pub const ALL: [CollectionName; 14] = [
        CollectionName::Inventory,
        CollectionName::Customers,
        CollectionName::Invoices,
        CollectionName::Repairs,
        CollectionName::Suppliers,
        CollectionName::PurchaseOrders,
        CollectionName::Expenses,
        CollectionName::Payments,
        CollectionName::Quotes,
        CollectionName::Employees,
        CollectionName::Appointments,
        CollectionName::Warranties,
        CollectionName::Categories,
        CollectionName::Settings,
    ];

    /// Returns the wire name used as the local cache key and remote field.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Inventory => "inventory",
            CollectionName::Customers => "customers",
            CollectionName::Invoices => "invoices",
            CollectionName::Repairs => "repairs",
            CollectionName::Suppliers => "suppliers",
            CollectionName::PurchaseOrders => "purchaseOrders",
            CollectionName::Expenses => "expenses",
            CollectionName::Payments => "payments",
            CollectionName::Quotes => "quotes",
            CollectionName::Employees => "employees",
            CollectionName::Appointments => "appointments",
            CollectionName::Warranties => "warranties",
            CollectionName::Categories => "categories",
            CollectionName::Settings => "settings",
        }
    }

    /// Iterates over every collection.
    pub fn iter() -> impl Iterator<Item = CollectionName> {
        Self::ALL.into_iter()
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CollectionName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CoreError::UnknownCollection(s.to_string()))
    }
}

// =============================================================================
// Sync Session
// =============================================================================

/// The currently authenticated identity.
///
/// Exactly one session is live at a time. Every remote write made while it is
/// live is attributed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SyncSession {
    /// Opaque subject id issued by the auth provider.
    pub subject_id: String,

    /// Display identity (usually an email).
    pub identity: Option<String>,

    /// When the session became active on this device.
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
}

impl SyncSession {
    /// Creates a session starting now.
    pub fn new(subject_id: impl Into<String>, identity: Option<String>) -> Self {
        SyncSession {
            subject_id: subject_id.into(),
            identity,
            started_at: Utc::now(),
        }
    }

    /// Returns the identity stamped onto remote writes.
    pub fn attributed_user(&self) -> AttributedUser {
        AttributedUser {
            uid: self.subject_id.clone(),
            email: self.identity.clone(),
        }
    }

    /// Human-readable label: the identity if known, else the subject id.
    pub fn display_name(&self) -> &str {
        self.identity.as_deref().unwrap_or(&self.subject_id)
    }
}

/// Identity stamped onto every remote write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AttributedUser {
    pub uid: String,
    pub email: Option<String>,
}

// =============================================================================
// Connectivity (sticky offline flag)
// =============================================================================

/// Tri-state reachability marker for the remote store.
///
/// Set to `Offline` by any operation that detects the store is unreachable and
/// cleared back to `Online` by the next successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Connectivity {
    /// No operation has observed the remote store yet.
    #[default]
    Unknown,
    /// The last observation found the store unreachable.
    Offline,
    /// The last observation reached the store.
    Online,
}

impl Connectivity {
    pub fn is_offline(&self) -> bool {
        matches!(self, Connectivity::Offline)
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Unknown => write!(f, "unknown"),
            Connectivity::Offline => write!(f, "offline"),
            Connectivity::Online => write!(f, "online"),
        }
    }
}

// =============================================================================
// Engine State
// =============================================================================

/// Orchestrator state machine.
///
/// ```text
///            run_cycle()                init budget exhausted
///   Idle ────────────────► Syncing     Idle/Syncing ──────────► Degraded
///    ▲                        │                                     │
///    └────── done/failed ─────┘         ◄──── setup succeeds ───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EngineState {
    #[default]
    Idle,
    Syncing,
    Degraded,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Syncing => write!(f, "syncing"),
            EngineState::Degraded => write!(f, "degraded"),
        }
    }
}

// =============================================================================
// Engine Status (DTO for the UI)
// =============================================================================

/// Snapshot of the engine exposed to UI and administrative callers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EngineStatus {
    /// Setup has finished (successfully or by falling back to degraded mode).
    pub initialized: bool,

    /// Display identity of the live session, if any.
    pub session_identity: Option<String>,

    /// Completion time of the last successful cycle.
    #[ts(as = "Option<String>")]
    pub last_cycle_time: Option<DateTime<Utc>>,

    /// A cycle is currently running.
    pub cycle_in_progress: bool,

    /// Sync-domain retry counter.
    pub retry_count: u32,

    /// The periodic timer is armed.
    pub periodic_active: bool,

    /// Init retries were exhausted; running local-cache-only with background
    /// reconnection.
    pub degraded: bool,

    /// Orchestrator state.
    pub state: EngineState,

    /// Sticky offline flag.
    pub connectivity: Connectivity,

    /// Init-domain retry counter.
    pub init_retry_count: u32,

    /// Message of the last surfaced error.
    pub last_error: Option<String>,
}

// =============================================================================
// Cached Credentials
// =============================================================================

/// Credential pair kept in the local cache for automatic sign-in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredentials {
    pub identity: String,
    pub secret: String,
}

impl CachedCredentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        CachedCredentials {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

// Secrets never reach the logs.
impl std::fmt::Debug for CachedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCredentials")
            .field("identity", &self.identity)
            .field("secret", &"***")
            .finish()
    }
}

// =============================================================================
// Local Cache Metadata Keys
// =============================================================================

/// Keys of the metadata entries stored next to the collections.
pub mod meta_keys {
    /// Subject id of the last session that was active on this device.
    pub const LAST_ACTIVE_SESSION: &str = "lastActiveSession";
    /// Identity half of the cached credential pair.
    pub const CACHED_IDENTITY: &str = "cachedIdentity";
    /// Secret half of the cached credential pair.
    pub const CACHED_SECRET: &str = "cachedSecret";
    /// RFC 3339 completion time of the last successful cycle.
    pub const LAST_SYNC: &str = "lastSync";
}
