//! # Data Access Adapter
//!
//! Moves collections between the local cache and the remote store.
//!
//! ## Variants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DataAdapter (trait)                              │
//! │                                                                         │
//! │  ┌───────────────────────────────┐   ┌───────────────────────────────┐ │
//! │  │     PerCollectionAdapter      │   │         BulkAdapter           │ │
//! │  │                               │   │                               │ │
//! │  │  pull_all: read aggregate,    │   │  pull_all → manager           │ │
//! │  │   fall back to legacy doc,    │   │  push_all → manager           │ │
//! │  │   write each name locally     │   │                               │ │
//! │  │  push_all: merge each local   │   │  pull_one / push_one fall     │ │
//! │  │   snapshot into aggregate     │   │  back to PerCollectionAdapter │ │
//! │  └───────────────────────────────┘   └───────────────────────────────┘ │
//! │                                                                         │
//! │  Picked once by SyncEngineBuilder; the orchestrator only sees the      │
//! │  trait.                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Policy
//! - A single collection failing to read, decode or write is logged and
//!   skipped. The rest of the pass continues.
//! - A malformed-channel failure is systemic and is returned to the caller.
//! - A collection absent on the remote side leaves the local copy untouched.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::LocalCache;
use crate::config::RemoteSettings;
use crate::error::{ErrorClass, SyncError, SyncResult};
use crate::remote::{BulkDataManager, Document, RemoteStore, WriteOptions};
use shopdesk_core::{CollectionName, CoreError, SyncSession};

// =============================================================================
// Outcomes
// =============================================================================

/// Which adapter variant is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    PerCollection,
    Bulk,
}

/// Per-collection result of a `pull_all` or `push_all` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Collections moved.
    pub transferred: Vec<CollectionName>,
    /// Collections with nothing to move (absent remotely or locally).
    pub skipped: Vec<CollectionName>,
    /// Collections that failed and were logged.
    pub failed: Vec<CollectionName>,
}

impl TransferReport {
    /// Report for a pass that moved every collection.
    pub fn all_transferred() -> Self {
        TransferReport {
            transferred: CollectionName::ALL.to_vec(),
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of pulling one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Local record set replaced with this many items.
    Replaced(usize),
    /// No remote copy exists; local copy left untouched.
    Absent,
}

/// Result of pushing one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Remote copy written with this many items.
    Written(usize),
    /// No local copy exists; nothing written.
    NoLocalData,
}

// =============================================================================
// Data Adapter Trait
// =============================================================================

/// Common pull/push contract the orchestrator depends on.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    /// Pulls every collection into the local cache.
    async fn pull_all(&self, session: &SyncSession) -> SyncResult<TransferReport>;

    /// Pushes every local collection to the remote store.
    async fn push_all(&self, session: &SyncSession) -> SyncResult<TransferReport>;

    /// Pulls a single collection. Errors are returned, not skipped.
    async fn pull_one(&self, session: &SyncSession, name: CollectionName)
        -> SyncResult<PullOutcome>;

    /// Pushes a single collection. Errors are returned, not skipped.
    async fn push_one(&self, session: &SyncSession, name: CollectionName)
        -> SyncResult<PushOutcome>;
}

// =============================================================================
// Per-Collection Adapter
// =============================================================================

/// Adapter built on raw remote-store primitives.
pub struct PerCollectionAdapter {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    settings: RemoteSettings,
}

impl PerCollectionAdapter {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
        settings: RemoteSettings,
    ) -> Self {
        PerCollectionAdapter {
            remote,
            cache,
            settings,
        }
    }

    /// Reads the session's aggregate document.
    async fn read_aggregate(&self, session: &SyncSession) -> SyncResult<Option<Document>> {
        Ok(self
            .remote
            .read_document(&self.settings.aggregate_collection, &session.subject_id)
            .await?)
    }

    /// Finds the remote record set for `name`: the aggregate entry first,
    /// then the legacy per-collection document.
    async fn locate(
        &self,
        aggregate: Option<&Document>,
        name: CollectionName,
    ) -> SyncResult<Option<Value>> {
        if let Some(entry) = aggregate.and_then(|doc| doc.get(name.as_str())) {
            return Ok(Some(entry.clone()));
        }

        if !self.settings.read_legacy_layout {
            return Ok(None);
        }

        let legacy = self
            .remote
            .read_document(&self.settings.legacy_collection, name.as_str())
            .await?;
        if legacy.is_some() {
            debug!(collection = %name, "Using legacy per-collection document");
        }
        Ok(legacy.map(Value::Object))
    }

    /// Pulls `name` given an already-read aggregate.
    async fn pull_from(
        &self,
        aggregate: Option<&Document>,
        name: CollectionName,
    ) -> SyncResult<PullOutcome> {
        let Some(entry) = self.locate(aggregate, name).await? else {
            return Ok(PullOutcome::Absent);
        };

        let items = extract_items(name, &entry)?;
        self.cache.write_named(name, &items).await?;
        Ok(PullOutcome::Replaced(items.len()))
    }

    /// Builds the merge payload for one collection.
    fn payload(session: &SyncSession, name: CollectionName, items: Vec<Value>) -> Document {
        let stamped_at = Utc::now().to_rfc3339();
        let mut payload = Document::new();
        payload.insert(
            name.as_str().to_string(),
            json!({ "items": items, "lastUpdated": stamped_at }),
        );
        payload.insert("lastUpdated".into(), json!(stamped_at));
        payload.insert(
            "attributedUser".into(),
            json!(session.attributed_user()),
        );
        payload
    }
}

/// Pulls the `items` array out of a remote record set.
fn extract_items(name: CollectionName, entry: &Value) -> SyncResult<Vec<Value>> {
    match entry.get("items") {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(CoreError::MalformedRecordSet {
            collection: name.to_string(),
            reason: format!("items is not an array: {}", type_name(other)),
        }
        .into()),
        None => Err(CoreError::MalformedRecordSet {
            collection: name.to_string(),
            reason: "missing items field".into(),
        }
        .into()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether a per-collection failure must abort the pass.
fn is_systemic(err: &SyncError) -> bool {
    matches!(
        err.class(),
        ErrorClass::MalformedChannel | ErrorClass::TransientOffline
    )
}

#[async_trait]
impl DataAdapter for PerCollectionAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::PerCollection
    }

    async fn pull_all(&self, session: &SyncSession) -> SyncResult<TransferReport> {
        let aggregate = match self.read_aggregate(session).await {
            Ok(doc) => doc,
            Err(e) if is_systemic(&e) => return Err(e),
            Err(e) => {
                warn!(error = %e, subject_id = %session.subject_id, "Aggregate read failed, trying legacy documents");
                None
            }
        };

        let mut report = TransferReport::default();
        for name in CollectionName::iter() {
            match self.pull_from(aggregate.as_ref(), name).await {
                Ok(PullOutcome::Replaced(count)) => {
                    debug!(collection = %name, count, "Pulled collection");
                    report.transferred.push(name);
                }
                Ok(PullOutcome::Absent) => {
                    debug!(collection = %name, "No remote copy, keeping local");
                    report.skipped.push(name);
                }
                Err(e) if is_systemic(&e) => return Err(e),
                Err(e) => {
                    warn!(collection = %name, error = %e, "Failed to pull collection, skipping");
                    report.failed.push(name);
                }
            }
        }

        info!(
            transferred = report.transferred.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Pull pass complete"
        );
        Ok(report)
    }

    async fn push_all(&self, session: &SyncSession) -> SyncResult<TransferReport> {
        let mut report = TransferReport::default();
        for name in CollectionName::iter() {
            match self.push_one(session, name).await {
                Ok(PushOutcome::Written(_)) => report.transferred.push(name),
                Ok(PushOutcome::NoLocalData) => report.skipped.push(name),
                Err(e) if is_systemic(&e) => return Err(e),
                Err(e) => {
                    warn!(collection = %name, error = %e, "Failed to push collection, skipping");
                    report.failed.push(name);
                }
            }
        }

        info!(
            transferred = report.transferred.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Push pass complete"
        );
        Ok(report)
    }

    async fn pull_one(
        &self,
        session: &SyncSession,
        name: CollectionName,
    ) -> SyncResult<PullOutcome> {
        let aggregate = self.read_aggregate(session).await?;
        self.pull_from(aggregate.as_ref(), name).await
    }

    async fn push_one(
        &self,
        session: &SyncSession,
        name: CollectionName,
    ) -> SyncResult<PushOutcome> {
        let Some(items) = self.cache.read_named(name).await? else {
            warn!(collection = %name, "No local data to push, skipping write");
            return Ok(PushOutcome::NoLocalData);
        };

        let count = items.len();
        let payload = Self::payload(session, name, items);
        self.remote
            .write_document(
                &self.settings.aggregate_collection,
                &session.subject_id,
                payload,
                WriteOptions::merge(),
            )
            .await?;

        debug!(collection = %name, count, "Pushed collection");
        Ok(PushOutcome::Written(count))
    }
}

// =============================================================================
// Bulk Adapter
// =============================================================================

/// Adapter that hands whole-store passes to a [`BulkDataManager`].
pub struct BulkAdapter {
    manager: Arc<dyn BulkDataManager>,
    fallback: PerCollectionAdapter,
}

impl BulkAdapter {
    pub fn new(manager: Arc<dyn BulkDataManager>, fallback: PerCollectionAdapter) -> Self {
        BulkAdapter { manager, fallback }
    }
}

#[async_trait]
impl DataAdapter for BulkAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Bulk
    }

    async fn pull_all(&self, session: &SyncSession) -> SyncResult<TransferReport> {
        self.manager.pull_all_collections(session).await?;
        Ok(TransferReport::all_transferred())
    }

    async fn push_all(&self, session: &SyncSession) -> SyncResult<TransferReport> {
        self.manager.push_all_collections(session).await?;
        Ok(TransferReport::all_transferred())
    }

    async fn pull_one(
        &self,
        session: &SyncSession,
        name: CollectionName,
    ) -> SyncResult<PullOutcome> {
        self.fallback.pull_one(session, name).await
    }

    async fn push_one(
        &self,
        session: &SyncSession,
        name: CollectionName,
    ) -> SyncResult<PushOutcome> {
        self.fallback.push_one(session, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBulkManager, MemoryCache, MemoryRemoteStore};
    use crate::remote::RemoteError;

    fn session() -> SyncSession {
        SyncSession::new("u1", Some("owner@shop.test".into()))
    }

    fn adapter(remote: Arc<MemoryRemoteStore>, cache: Arc<MemoryCache>) -> PerCollectionAdapter {
        PerCollectionAdapter::new(remote, cache, RemoteSettings::default())
    }

    #[tokio::test]
    async fn test_push_one_writes_stamped_merge_payload() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = Arc::new(MemoryCache::new());
        cache.insert(CollectionName::Repairs, vec![json!({"id": "r1"})]);

        let outcome = adapter(remote.clone(), cache)
            .push_one(&session(), CollectionName::Repairs)
            .await
            .unwrap();
        assert_eq!(outcome, PushOutcome::Written(1));

        let doc = remote.document("userData", "u1").unwrap();
        assert_eq!(doc["repairs"]["items"], json!([{"id": "r1"}]));
        assert!(doc["repairs"]["lastUpdated"].is_string());
        assert!(doc["lastUpdated"].is_string());
        assert_eq!(doc["attributedUser"]["uid"], json!("u1"));
        assert_eq!(doc["attributedUser"]["email"], json!("owner@shop.test"));
        assert!(remote.last_write_merged());
    }

    #[tokio::test]
    async fn test_push_one_without_local_data_skips() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let outcome = adapter(remote.clone(), Arc::new(MemoryCache::new()))
            .push_one(&session(), CollectionName::Quotes)
            .await
            .unwrap();
        assert_eq!(outcome, PushOutcome::NoLocalData);
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_push_merges_into_existing_aggregate() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = Arc::new(MemoryCache::new());
        cache.insert(CollectionName::Repairs, vec![json!({"id": "r1"})]);
        cache.insert(CollectionName::Invoices, vec![json!({"id": "i1"})]);
        let adapter = adapter(remote.clone(), cache);

        adapter.push_one(&session(), CollectionName::Repairs).await.unwrap();
        adapter.push_one(&session(), CollectionName::Invoices).await.unwrap();

        let doc = remote.document("userData", "u1").unwrap();
        assert!(doc.contains_key("repairs"));
        assert!(doc.contains_key("invoices"));
    }

    #[tokio::test]
    async fn test_pull_all_prefers_aggregate_then_legacy() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.put_document(
            "userData",
            "u1",
            json!({ "repairs": { "items": [{"id": "agg"}] } }),
        );
        remote.put_document("sharedData", "repairs", json!({ "items": [{"id": "legacy"}] }));
        remote.put_document("sharedData", "customers", json!({ "items": [{"id": "c1"}] }));

        let cache = Arc::new(MemoryCache::new());
        let report = adapter(remote, cache.clone())
            .pull_all(&session())
            .await
            .unwrap();

        assert_eq!(report.transferred.len(), 2);
        assert_eq!(report.skipped.len(), 12);
        assert!(report.is_clean());
        assert_eq!(
            cache.items(CollectionName::Repairs),
            Some(vec![json!({"id": "agg"})])
        );
        assert_eq!(
            cache.items(CollectionName::Customers),
            Some(vec![json!({"id": "c1"})])
        );
    }

    #[tokio::test]
    async fn test_pull_absent_keeps_local_copy() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = Arc::new(MemoryCache::new());
        cache.insert(CollectionName::Expenses, vec![json!({"id": "e1"})]);

        let outcome = adapter(remote, cache.clone())
            .pull_one(&session(), CollectionName::Expenses)
            .await
            .unwrap();

        assert_eq!(outcome, PullOutcome::Absent);
        assert_eq!(
            cache.items(CollectionName::Expenses),
            Some(vec![json!({"id": "e1"})])
        );
    }

    #[tokio::test]
    async fn test_pull_all_skips_malformed_record_set() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.put_document(
            "userData",
            "u1",
            json!({
                "repairs": { "items": "oops" },
                "inventory": { "items": [{"sku": "A1"}] }
            }),
        );

        let cache = Arc::new(MemoryCache::new());
        let report = adapter(remote, cache.clone())
            .pull_all(&session())
            .await
            .unwrap();

        assert_eq!(report.failed, vec![CollectionName::Repairs]);
        assert_eq!(report.transferred, vec![CollectionName::Inventory]);
        assert_eq!(cache.items(CollectionName::Repairs), None);
    }

    #[tokio::test]
    async fn test_pull_all_skips_per_collection_read_failure() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.fail_document(
            "sharedData",
            "repairs",
            RemoteError::PermissionDenied("denied".into()),
        );

        let report = adapter(remote, Arc::new(MemoryCache::new()))
            .pull_all(&session())
            .await
            .unwrap();

        assert_eq!(report.failed, vec![CollectionName::Repairs]);
        assert_eq!(report.skipped.len(), 13);
    }

    #[tokio::test]
    async fn test_pull_all_reraises_malformed_channel() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.fail_next_reads(1, RemoteError::BadRequest("400".into()));

        let err = adapter(remote, Arc::new(MemoryCache::new()))
            .pull_all(&session())
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::MalformedChannel);
    }

    #[tokio::test]
    async fn test_bulk_adapter_delegates_passes() {
        let manager = Arc::new(MemoryBulkManager::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let bulk = BulkAdapter::new(
            manager.clone(),
            adapter(remote.clone(), Arc::new(MemoryCache::new())),
        );

        assert_eq!(bulk.kind(), AdapterKind::Bulk);
        let report = bulk.pull_all(&session()).await.unwrap();
        assert_eq!(report.transferred.len(), 14);
        bulk.push_all(&session()).await.unwrap();

        assert_eq!(manager.pulls(), 1);
        assert_eq!(manager.pushes(), 1);
        assert_eq!(remote.read_count(), 0);
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_adapter_failure_propagates() {
        let manager = Arc::new(MemoryBulkManager::new());
        manager.fail_with("manager offline");
        let bulk = BulkAdapter::new(
            manager,
            adapter(Arc::new(MemoryRemoteStore::new()), Arc::new(MemoryCache::new())),
        );

        assert!(matches!(
            bulk.pull_all(&session()).await,
            Err(SyncError::Bulk(_))
        ));
    }
}
