//! # Remote Store Interface
//!
//! The narrow set of primitives the engine needs from the remote document
//! store. The store's own wire protocol stays outside this crate.
//!
//! ## Remote Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Remote Documents                                │
//! │                                                                         │
//! │  CANONICAL: one aggregate document per session (written, read)         │
//! │  ──────────────────────────────────────────────                        │
//! │  userData/{subject_id}                                                 │
//! │  {                                                                      │
//! │    "inventory": { "items": [...], "lastUpdated": "2024-..." },         │
//! │    "repairs":   { "items": [...], "lastUpdated": "2024-..." },         │
//! │    ...                                                                  │
//! │    "lastUpdated": "2024-...",                                          │
//! │    "attributedUser": { "uid": "...", "email": "..." }                  │
//! │  }                                                                      │
//! │                                                                         │
//! │  LEGACY: one document per collection (read only, when the aggregate    │
//! │  has no entry for that collection)                                     │
//! │  ──────────────────────────────────────────────                        │
//! │  sharedData/{collection}                                               │
//! │  { "items": [...], "lastUpdated": "...", "attributedUser": {...} }     │
//! │                                                                         │
//! │  HEALTH: read by the connection probe; existence is irrelevant         │
//! │  _health/probe                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{ErrorClass, SyncResult};
use shopdesk_core::SyncSession;

/// A remote document body.
pub type Document = Map<String, Value>;

// =============================================================================
// Remote Errors
// =============================================================================

/// Failure reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The store (or the client's transport) is unreachable.
    #[error("Remote store unreachable: {0}")]
    Offline(String),

    /// The channel rejected the request as malformed.
    #[error("Bad request on remote channel: {0}")]
    BadRequest(String),

    /// The session may not access the document.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Any other failure.
    #[error("Remote store error: {0}")]
    Other(String),
}

impl RemoteError {
    /// Builds a RemoteError from a raw provider message.
    ///
    /// Providers that only report free-text failures are classified by the
    /// signals they are known to emit.
    ///
    /// ```rust
    /// use shopdesk_sync::remote::RemoteError;
    ///
    /// assert!(matches!(
    ///     RemoteError::from_message("Failed to get document because the client is offline."),
    ///     RemoteError::Offline(_)
    /// ));
    /// assert!(matches!(
    ///     RemoteError::from_message("400 Bad Request"),
    ///     RemoteError::BadRequest(_)
    /// ));
    /// ```
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("offline")
            || lower.contains("unavailable")
            || lower.contains("network")
            || lower.contains("failed to fetch")
        {
            RemoteError::Offline(message)
        } else if lower.contains("400")
            || lower.contains("bad request")
            || lower.contains("malformed")
            || lower.contains("invalid-argument")
        {
            RemoteError::BadRequest(message)
        } else if lower.contains("permission") || lower.contains("403") {
            RemoteError::PermissionDenied(message)
        } else {
            RemoteError::Other(message)
        }
    }

    /// Classifies this failure for the orchestrator.
    pub fn class(&self) -> ErrorClass {
        match self {
            RemoteError::Offline(_) => ErrorClass::TransientOffline,
            RemoteError::BadRequest(_) => ErrorClass::MalformedChannel,
            RemoteError::PermissionDenied(_) | RemoteError::Other(_) => ErrorClass::Unclassified,
        }
    }
}

// =============================================================================
// Write Options
// =============================================================================

/// Options for a document write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Merge top-level fields into the existing document instead of
    /// replacing it.
    pub merge: bool,
}

impl WriteOptions {
    /// Non-destructive merge.
    pub fn merge() -> Self {
        WriteOptions { merge: true }
    }

    /// Full overwrite.
    pub fn overwrite() -> Self {
        WriteOptions { merge: false }
    }
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Remote document store primitives.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads a document. `Ok(None)` when it does not exist.
    async fn read_document(&self, collection: &str, id: &str)
        -> Result<Option<Document>, RemoteError>;

    /// Writes a document.
    async fn write_document(
        &self,
        collection: &str,
        id: &str,
        payload: Document,
        options: WriteOptions,
    ) -> Result<(), RemoteError>;

    /// Whether [`reset_connection`](RemoteStore::reset_connection) does
    /// anything for this store.
    fn supports_reset(&self) -> bool {
        false
    }

    /// Tears down and re-establishes the underlying channel.
    async fn reset_connection(&self) -> Result<(), RemoteError> {
        Ok(())
    }
}

/// Optional richer collaborator that moves every collection at once.
#[async_trait]
pub trait BulkDataManager: Send + Sync {
    /// Pulls every collection for the session into the local cache.
    async fn pull_all_collections(&self, session: &SyncSession) -> SyncResult<()>;

    /// Pushes every local collection for the session to the remote store.
    async fn push_all_collections(&self, session: &SyncSession) -> SyncResult<()>;
}
