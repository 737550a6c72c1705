//! # Engine Events
//!
//! Notifications the engine pushes to its host, plus the per-collection
//! refresh callbacks UI views register to re-read the local cache.
//!
//! ```text
//! "sync://status"         - EngineStatus snapshot
//! "sync://data-refreshed" - { collection: "repairs" }
//! "sync://error"          - { message: "...", retryable: true }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use shopdesk_core::{CollectionName, EngineStatus};

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Trait for emitting engine events to the host application.
pub trait SyncEventEmitter: Send + Sync {
    /// Emits an engine status change.
    fn emit_status(&self, status: &EngineStatus);

    /// Emits a refresh notification after a collection's local copy changed.
    fn emit_data_refreshed(&self, collection: CollectionName);

    /// Emits a user-visible error notice.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for headless use.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &EngineStatus) {}
    fn emit_data_refreshed(&self, _collection: CollectionName) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Refresh Callbacks
// =============================================================================

/// Callback invoked with the name of a refreshed collection.
pub type RefreshCallback = Arc<dyn Fn(CollectionName) + Send + Sync>;

/// Registry of refresh callbacks keyed by collection.
#[derive(Default)]
pub struct RefreshCallbacks {
    callbacks: RwLock<HashMap<CollectionName, Vec<RefreshCallback>>>,
}

impl RefreshCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, collection: CollectionName, callback: RefreshCallback) {
        self.callbacks
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(callback);
    }

    /// Invokes every callback registered for `collection`.
    pub async fn notify(&self, collection: CollectionName) {
        // Cloned out so callbacks may register further callbacks.
        let callbacks = self
            .callbacks
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default();

        for callback in callbacks {
            callback(collection);
        }
    }
}
