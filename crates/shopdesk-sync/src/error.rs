//! # Sync Error Types
//!
//! Error types for the synchronization engine, and the classification the
//! orchestrator uses to decide how a failure is handled.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Remote      │  │        Auth             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Offline        │  │  AuthUnavailable        │ │
//! │  │  ConfigLoad     │  │  BadRequest     │  │  PrincipalNotFound      │ │
//! │  │  ConfigSave     │  │  PermissionDen. │  │  InvalidCredentials     │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Local Cache   │  │   Record Sets   │  │      Engine             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Cache          │  │  Core           │  │  NoSession              │ │
//! │  │                 │  │  (malformed)    │  │  CycleInProgress        │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Handling by Class
//! ```text
//! ErrorClass::TransientOffline  → sticky flag set, cycle deferred, silent
//! ErrorClass::MalformedChannel  → one reset + retry, then surfaced
//! ErrorClass::AuthUnavailable   → degraded mode, background recovery
//! ErrorClass::PerCollection     → logged, skipped, cycle continues
//! ErrorClass::Unclassified      → error notification + sync retry
//! ```

use thiserror::Error;

use crate::auth::AuthError;
use crate::remote::RemoteError;
use shopdesk_core::{CoreError, ValidationError};

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// How the engine reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Environment or transport reports no connectivity.
    TransientOffline,
    /// Bad-request style failure from the remote channel.
    MalformedChannel,
    /// The auth subsystem never became ready.
    AuthUnavailable,
    /// A single collection failed to read or write.
    PerCollection,
    /// Anything else.
    Unclassified,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::TransientOffline => write!(f, "transient_offline"),
            ErrorClass::MalformedChannel => write!(f, "malformed_channel"),
            ErrorClass::AuthUnavailable => write!(f, "auth_unavailable"),
            ErrorClass::PerCollection => write!(f, "per_collection"),
            ErrorClass::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Sync error type covering all engine failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote Store Errors
    // =========================================================================
    /// A remote read, write or reset failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The bulk data manager failed.
    #[error("Bulk data manager failed: {0}")]
    Bulk(String),

    // =========================================================================
    // Auth Errors
    // =========================================================================
    /// The auth provider did not report readiness within the setup window.
    #[error("Auth provider not ready after {0} seconds")]
    AuthUnavailable(u64),

    /// No auth provider was supplied to the engine.
    #[error("Auth provider not configured")]
    AuthNotConfigured,

    /// An auth provider call failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Credentials failed validation before reaching the provider.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(#[from] ValidationError),

    // =========================================================================
    // Local Cache / Record Errors
    // =========================================================================
    /// The local cache failed.
    #[error("Local cache error: {0}")]
    Cache(String),

    /// A record set could not be interpreted.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Failed to serialize a payload.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// The operation needs a live session.
    #[error("No active session")]
    NoSession,

    /// Another cycle holds the in-progress flag.
    #[error("A sync cycle is already in progress")]
    CycleInProgress,

    /// Engine is shutting down.
    #[error("Sync engine is shutting down")]
    ShuttingDown,

    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<shopdesk_db::DbError> for SyncError {
    fn from(err: shopdesk_db::DbError) -> Self {
        SyncError::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Classifies this error for the orchestrator.
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::Remote(err) => err.class(),
            SyncError::AuthUnavailable(_) => ErrorClass::AuthUnavailable,
            SyncError::Auth(AuthError::Unavailable(_)) => ErrorClass::AuthUnavailable,
            SyncError::Core(CoreError::MalformedRecordSet { .. }) => ErrorClass::PerCollection,
            _ => ErrorClass::Unclassified,
        }
    }

    /// Returns true if retrying the same operation later may succeed.
    ///
    /// ## Retryable Errors
    /// - Remote store failures (network, channel, server)
    /// - Auth readiness timeouts
    /// - Bulk manager and local cache failures
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Rejected credentials
    /// - Missing session, shutdown
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(err) => !matches!(err, RemoteError::PermissionDenied(_)),
            SyncError::Auth(err) => matches!(err, AuthError::Unavailable(_) | AuthError::Other(_)),
            SyncError::AuthUnavailable(_) | SyncError::Bulk(_) | SyncError::Cache(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
                | SyncError::AuthNotConfigured
        )
    }
}
