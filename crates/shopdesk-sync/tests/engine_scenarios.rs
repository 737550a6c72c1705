//! Integration tests for the sync engine against in-memory collaborators.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use shopdesk_core::{meta_keys, CachedCredentials, CollectionName, Connectivity, EngineState};
use shopdesk_db::{Database, DbConfig};
use shopdesk_sync::adapter::PerCollectionAdapter;
use shopdesk_sync::config::RemoteSettings;
use shopdesk_sync::memory::{
    AuthCall, EngineEvent, MemoryAuthProvider, MemoryBulkManager, MemoryCache, MemoryRemoteStore,
    RecordingEmitter, RemoteOp,
};
use shopdesk_sync::{
    AuthError, AuthProvider, CycleOutcome, DataAdapter, Document, LocalCache, PullOutcome,
    PushOutcome, RemoteError, RemoteStore, SkipReason, SyncConfig, SyncEngine, SyncEngineBuilder,
    WriteOptions,
};

const OWNER: &str = "owner@shop.test";
const SECRET: &str = "secret1";

struct Rig {
    engine: SyncEngine,
    remote: Arc<MemoryRemoteStore>,
    auth: Arc<MemoryAuthProvider>,
    cache: Arc<MemoryCache>,
    emitter: Arc<RecordingEmitter>,
}

fn rig() -> Rig {
    rig_with_remote(Arc::new(MemoryRemoteStore::new()))
}

fn rig_with_remote(remote: Arc<MemoryRemoteStore>) -> Rig {
    let auth = Arc::new(MemoryAuthProvider::new());
    auth.add_account(OWNER, SECRET);
    let cache = Arc::new(MemoryCache::new());
    let emitter = Arc::new(RecordingEmitter::new());

    let engine = SyncEngineBuilder::new(SyncConfig::default())
        .with_remote(remote.clone())
        .with_cache(cache.clone())
        .with_auth(auth.clone())
        .with_emitter(emitter.clone())
        .build()
        .unwrap();

    Rig {
        engine,
        remote,
        auth,
        cache,
        emitter,
    }
}

/// Lets spawned tasks run without reaching any engine timer.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn owner_uid() -> String {
    MemoryAuthProvider::uid_for(OWNER)
}

/// Aggregate document with one item in every collection.
fn full_aggregate() -> Value {
    let mut doc = Map::new();
    for name in CollectionName::iter() {
        doc.insert(
            name.as_str().to_string(),
            json!({
                "items": [{ "id": format!("{}-1", name) }],
                "lastUpdated": "2024-01-01T00:00:00Z"
            }),
        );
    }
    Value::Object(doc)
}

async fn start_and_sign_in(rig: &Rig) {
    rig.engine.start().await.unwrap();
    rig.auth.sign_in(OWNER, SECRET).await.unwrap();
    settle().await;
}

// =============================================================================
// Session gain runs a full cycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_session_gain_runs_full_cycle() {
    let rig = rig();
    rig.remote
        .put_document("userData", &owner_uid(), full_aggregate());

    start_and_sign_in(&rig).await;

    let status = rig.engine.status().await;
    assert!(status.initialized);
    assert!(status.last_cycle_time.is_some());
    assert!(!status.cycle_in_progress);
    assert!(status.periodic_active);
    assert_eq!(status.state, EngineState::Idle);
    assert_eq!(status.session_identity.as_deref(), Some(OWNER));

    // Probe, then pull, then push.
    let ops = rig.remote.ops();
    assert_eq!(
        ops[0],
        RemoteOp::Read {
            collection: "_health".into(),
            id: "probe".into()
        }
    );
    let first_write = ops
        .iter()
        .position(|op| matches!(op, RemoteOp::Write { .. }))
        .unwrap();
    assert!(ops[first_write..]
        .iter()
        .all(|op| matches!(op, RemoteOp::Write { merge: true, .. })));
    assert_eq!(rig.remote.write_count(), 14);

    for name in CollectionName::iter() {
        assert_eq!(
            rig.cache.items(name),
            Some(vec![json!({ "id": format!("{}-1", name) })])
        );
    }

    let refreshed = rig.emitter.refreshed();
    assert_eq!(refreshed.len(), 14);
    assert!(CollectionName::iter().all(|name| refreshed.contains(&name)));
    assert!(rig.emitter.errors().is_empty());

    assert_eq!(
        rig.cache.meta(meta_keys::LAST_ACTIVE_SESSION),
        Some(owner_uid())
    );
    assert!(rig.cache.meta(meta_keys::LAST_SYNC).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_pushed_documents_carry_attribution() {
    let rig = rig();
    rig.cache
        .insert(CollectionName::Invoices, vec![json!({"id": "inv-1"})]);

    start_and_sign_in(&rig).await;

    let doc = rig.remote.document("userData", &owner_uid()).unwrap();
    assert_eq!(doc["invoices"]["items"], json!([{"id": "inv-1"}]));
    assert_eq!(doc["attributedUser"]["uid"], json!(owner_uid()));
    assert_eq!(doc["attributedUser"]["email"], json!(OWNER));
    assert!(doc["lastUpdated"].is_string());
}

// =============================================================================
// Malformed channel: reset and one re-run
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_malformed_probe_recovers_with_one_reset() {
    let rig = rig();
    rig.remote
        .fail_next_reads(1, RemoteError::BadRequest("400 Bad Request".into()));

    start_and_sign_in(&rig).await;

    assert_eq!(rig.remote.reset_count(), 1);
    assert!(rig.engine.status().await.last_cycle_time.is_some());
    assert!(rig.emitter.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_cycle_reruns_after_delay() {
    let rig = rig();
    rig.remote
        .fail_next_reads(2, RemoteError::BadRequest("400 Bad Request".into()));

    start_and_sign_in(&rig).await;

    // Probe reset + orchestrator reset; re-run pending.
    assert_eq!(rig.remote.reset_count(), 2);
    assert!(rig.engine.status().await.last_cycle_time.is_none());

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;

    assert!(rig.engine.status().await.last_cycle_time.is_some());
    assert!(rig.emitter.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_persistent_malformed_channel_is_surfaced_once() {
    let rig = rig();
    rig.remote
        .fail_reads(Some(RemoteError::BadRequest("400 Bad Request".into())));

    start_and_sign_in(&rig).await;
    assert!(rig.emitter.errors().is_empty());

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(rig.emitter.errors().len(), 1);
    let status = rig.engine.status().await;
    assert!(status.last_cycle_time.is_none());
    assert!(status.last_error.is_some());
    assert_eq!(status.retry_count, 0);
}

// =============================================================================
// Transient offline: quiet deferral
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_offline_probe_defers_quietly() {
    let rig = rig();
    start_and_sign_in(&rig).await;
    let first_cycle = rig.engine.status().await.last_cycle_time;

    rig.remote
        .fail_next_reads(1, RemoteError::Offline("client is offline".into()));
    let outcome = rig.engine.run_manual_cycle().await;

    assert!(matches!(outcome, CycleOutcome::Deferred(_)));
    let status = rig.engine.status().await;
    assert_eq!(status.connectivity, Connectivity::Offline);
    assert_eq!(status.retry_count, 0);
    assert!(status.periodic_active);
    assert_eq!(status.last_cycle_time, first_cycle);
    assert!(rig.emitter.errors().is_empty());

    // Next periodic tick resets the connection and clears the flag.
    tokio::time::sleep(Duration::from_secs(300)).await;
    settle().await;

    let status = rig.engine.status().await;
    assert_eq!(status.connectivity, Connectivity::Online);
    assert_ne!(status.last_cycle_time, first_cycle);
    assert_eq!(rig.remote.reset_count(), 1);
}

// =============================================================================
// Startup retries and degraded mode
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_init_exhaustion_enters_degraded_and_recovers() {
    let rig = rig();
    rig.auth
        .set_failing(AuthError::Unavailable("auth backend not loaded".into()));

    rig.engine.start().await.unwrap();

    let status = rig.engine.status().await;
    assert!(status.initialized);
    assert!(status.degraded);
    assert_eq!(status.state, EngineState::Degraded);
    assert_eq!(status.init_retry_count, 3);
    assert_eq!(rig.emitter.errors().len(), 1);

    rig.auth.set_ready();

    tokio::time::sleep(Duration::from_secs(119)).await;
    assert!(rig.engine.status().await.degraded);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;

    let status = rig.engine.status().await;
    assert!(!status.degraded);
    assert_eq!(status.state, EngineState::Idle);

    // Binder is live again: a sign-in now syncs.
    rig.auth.sign_in(OWNER, SECRET).await.unwrap();
    settle().await;
    assert!(rig.engine.status().await.last_cycle_time.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_init_retry_counter_stays_within_budget() {
    let rig = rig();
    rig.auth
        .set_failing(AuthError::Unavailable("auth backend not loaded".into()));

    rig.engine.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(600)).await;

    let max_seen = rig
        .emitter
        .events()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Status(s) => Some(s.init_retry_count),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    assert_eq!(max_seen, 3);
    assert!(rig.engine.status().await.degraded);
}

#[tokio::test(start_paused = true)]
async fn test_init_retry_counter_resets_after_successful_start() {
    let rig = rig();
    rig.auth
        .set_failing(AuthError::Unavailable("auth backend not loaded".into()));

    // Setup fails at 0s and 2s, then succeeds at 6s.
    let auth = rig.auth.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        auth.set_ready();
    });
    rig.engine.start().await.unwrap();

    let status = rig.engine.status().await;
    assert!(status.initialized);
    assert!(!status.degraded);
    assert_eq!(status.init_retry_count, 0);

    let max_seen = rig
        .emitter
        .events()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Status(s) => Some(s.init_retry_count),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    assert_eq!(max_seen, 2);
}

// =============================================================================
// Automatic sign-in from cached credentials
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_session_loss_provisions_then_discards_on_failure() {
    let rig = rig();
    start_and_sign_in(&rig).await;

    rig.cache
        .store_credentials(&CachedCredentials::new("fallback@shop.test", "secret2"))
        .await
        .unwrap();
    rig.auth
        .fail_provisioning(Some(AuthError::Other("provisioning disabled".into())));

    rig.auth.sign_out().await.unwrap();
    settle().await;

    let calls = rig.auth.calls();
    assert_eq!(
        &calls[calls.len() - 3..],
        &[
            AuthCall::SignOut,
            AuthCall::SignIn("fallback@shop.test".into()),
            AuthCall::Provision("fallback@shop.test".into()),
        ]
    );
    assert!(rig.cache.cached_credentials().await.unwrap().is_none());

    let status = rig.engine.status().await;
    assert!(status.session_identity.is_none());
    assert!(!status.periodic_active);
}

#[tokio::test(start_paused = true)]
async fn test_startup_provisions_cached_identity() {
    let rig = rig();
    rig.cache
        .store_credentials(&CachedCredentials::new("new@shop.test", "secret2"))
        .await
        .unwrap();

    rig.engine.start().await.unwrap();
    settle().await;

    assert_eq!(
        rig.auth.calls(),
        vec![
            AuthCall::SignIn("new@shop.test".into()),
            AuthCall::Provision("new@shop.test".into()),
        ]
    );
    let session = rig.engine.session().await.unwrap();
    assert_eq!(session.subject_id, MemoryAuthProvider::uid_for("new@shop.test"));
    assert!(rig.engine.status().await.last_cycle_time.is_some());
    assert!(rig.cache.cached_credentials().await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_enable_session_bootstrap_signs_in_fallback_identity() {
    let mut config = SyncConfig::default();
    config.bootstrap.identity = Some("frontdesk@shop.test".into());
    config.bootstrap.secret = Some("change-me".into());

    let auth = Arc::new(MemoryAuthProvider::new());
    let cache = Arc::new(MemoryCache::new());
    let engine = SyncEngineBuilder::new(config)
        .with_remote(Arc::new(MemoryRemoteStore::new()))
        .with_cache(cache.clone())
        .with_auth(auth.clone())
        .build()
        .unwrap();

    engine.start().await.unwrap();
    settle().await;

    let outcome = engine.enable_session_bootstrap().await.unwrap();
    assert!(matches!(outcome, shopdesk_sync::AutoSignIn::Provisioned(_)));
    settle().await;

    assert_eq!(
        engine.status().await.session_identity.as_deref(),
        Some("frontdesk@shop.test")
    );
    assert!(cache.cached_credentials().await.unwrap().is_some());

    engine.clear_cached_credentials().await.unwrap();
    assert!(cache.cached_credentials().await.unwrap().is_none());
}

// =============================================================================
// Invariants
// =============================================================================

/// Remote store whose health read is slow.
struct SlowProbeRemote {
    inner: Arc<MemoryRemoteStore>,
    delay: Duration,
}

impl SlowProbeRemote {
    fn new(delay: Duration) -> Self {
        SlowProbeRemote {
            inner: Arc::new(MemoryRemoteStore::new()),
            delay,
        }
    }
}

#[async_trait]
impl RemoteStore for SlowProbeRemote {
    async fn read_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RemoteError> {
        if collection == "_health" {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.read_document(collection, id).await
    }

    async fn write_document(
        &self,
        collection: &str,
        id: &str,
        payload: Document,
        options: WriteOptions,
    ) -> Result<(), RemoteError> {
        self.inner
            .write_document(collection, id, payload, options)
            .await
    }
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_cycle_runs() {
    let auth = Arc::new(MemoryAuthProvider::new());
    auth.add_account(OWNER, SECRET);
    let engine = SyncEngineBuilder::new(SyncConfig::default())
        .with_remote(Arc::new(SlowProbeRemote::new(Duration::from_secs(1))))
        .with_cache(Arc::new(MemoryCache::new()))
        .with_auth(auth.clone())
        .build()
        .unwrap();

    engine.start().await.unwrap();
    auth.sign_in(OWNER, SECRET).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(engine.status().await.last_cycle_time.is_some());

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run_manual_cycle().await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    let skipped = outcomes
        .iter()
        .filter(|o| **o == CycleOutcome::Skipped(SkipReason::InProgress))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(skipped, 4);
    assert!(!engine.status().await.cycle_in_progress);
}

#[tokio::test(start_paused = true)]
async fn test_no_periodic_cycles_after_session_loss() {
    let rig = rig();
    start_and_sign_in(&rig).await;
    assert!(rig.engine.status().await.periodic_active);

    rig.auth.sign_out().await.unwrap();
    settle().await;
    let reads_at_loss = rig.remote.read_count();
    assert!(!rig.engine.status().await.periodic_active);

    tokio::time::sleep(Duration::from_secs(900)).await;
    assert_eq!(rig.remote.read_count(), reads_at_loss);

    // Re-armed on the next gain.
    rig.auth.sign_in(OWNER, SECRET).await.unwrap();
    settle().await;
    assert!(rig.engine.status().await.periodic_active);
}

#[tokio::test(start_paused = true)]
async fn test_sync_retries_stay_within_budget() {
    let rig = rig();
    rig.remote
        .fail_reads(Some(RemoteError::PermissionDenied("denied".into())));

    start_and_sign_in(&rig).await;
    assert_eq!(rig.engine.status().await.retry_count, 1);

    // Retries after 5s, 10s and 20s, then the budget is spent.
    tokio::time::sleep(Duration::from_secs(40)).await;

    let max_seen = rig
        .emitter
        .events()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Status(s) => Some(s.retry_count),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    assert_eq!(max_seen, 3);
    assert_eq!(rig.engine.status().await.retry_count, 0);
    assert_eq!(rig.emitter.errors().len(), 4);
}

#[tokio::test]
async fn test_push_all_is_idempotent() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let cache = Arc::new(MemoryCache::new());
    cache.insert(CollectionName::Inventory, vec![json!({"sku": "A1", "qty": 3})]);
    cache.insert(CollectionName::Repairs, vec![json!({"id": "r1"}), json!({"id": "r2"})]);

    let adapter = PerCollectionAdapter::new(remote.clone(), cache, RemoteSettings::default());
    let session = shopdesk_core::SyncSession::new("u1", None);

    adapter.push_all(&session).await.unwrap();
    let first = remote.document("userData", "u1").unwrap();
    adapter.push_all(&session).await.unwrap();
    let second = remote.document("userData", "u1").unwrap();

    for name in CollectionName::iter() {
        let key = name.as_str();
        assert_eq!(
            first.get(key).map(|v| &v["items"]),
            second.get(key).map(|v| &v["items"])
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_push_one_then_pull_one_round_trips() {
    let rig = rig();
    start_and_sign_in(&rig).await;

    let records = vec![json!({"id": "c1", "name": "Ada"}), json!({"id": "c2"})];
    rig.cache.insert(CollectionName::Customers, records.clone());

    assert_eq!(
        rig.engine
            .push_collection(CollectionName::Customers)
            .await
            .unwrap(),
        PushOutcome::Written(2)
    );

    rig.cache.insert(CollectionName::Customers, vec![]);
    assert_eq!(
        rig.engine
            .pull_collection(CollectionName::Customers)
            .await
            .unwrap(),
        PullOutcome::Replaced(2)
    );
    assert_eq!(rig.cache.items(CollectionName::Customers), Some(records));
}

#[tokio::test(start_paused = true)]
async fn test_force_pull_overwrites_local() {
    let rig = rig();
    start_and_sign_in(&rig).await;

    rig.remote.put_document(
        "userData",
        &owner_uid(),
        json!({ "settings": { "items": [{"currency": "EUR"}] } }),
    );
    rig.cache
        .insert(CollectionName::Settings, vec![json!({"currency": "USD"})]);

    let report = rig.engine.force_pull_overwrite_local().await.unwrap();
    assert_eq!(report.transferred, vec![CollectionName::Settings]);
    assert_eq!(
        rig.cache.items(CollectionName::Settings),
        Some(vec![json!({"currency": "EUR"})])
    );
}

#[tokio::test(start_paused = true)]
async fn test_refresh_callbacks_fire_after_cycle() {
    let rig = rig();
    let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = hits.clone();
    rig.engine
        .register_refresh_callback(CollectionName::Repairs, move |name| {
            assert_eq!(name, CollectionName::Repairs);
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
        .await;

    start_and_sign_in(&rig).await;
    rig.engine.run_manual_cycle().await;

    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_bulk_manager_handles_cycle_passes() {
    let auth = Arc::new(MemoryAuthProvider::new());
    auth.add_account(OWNER, SECRET);
    let manager = Arc::new(MemoryBulkManager::new());
    let remote = Arc::new(MemoryRemoteStore::new());
    let engine = SyncEngineBuilder::new(SyncConfig::default())
        .with_remote(remote.clone())
        .with_cache(Arc::new(MemoryCache::new()))
        .with_auth(auth.clone())
        .with_bulk_manager(manager.clone())
        .build()
        .unwrap();

    engine.start().await.unwrap();
    auth.sign_in(OWNER, SECRET).await.unwrap();
    settle().await;

    assert_eq!(manager.pulls(), 1);
    assert_eq!(manager.pushes(), 1);
    // Only the probe touched the store.
    assert_eq!(remote.ops().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_timers_and_subscription() {
    let rig = rig();
    start_and_sign_in(&rig).await;

    rig.engine.shutdown().await;
    assert!(!rig.engine.status().await.periodic_active);

    let reads = rig.remote.read_count();
    rig.auth.sign_out().await.unwrap();
    rig.auth.sign_in(OWNER, SECRET).await.unwrap();
    tokio::time::sleep(Duration::from_secs(900)).await;
    assert_eq!(rig.remote.read_count(), reads);
}

fn slow_engine(delay: Duration) -> (SyncEngine, Arc<MemoryRemoteStore>, Arc<MemoryAuthProvider>) {
    let remote = SlowProbeRemote::new(delay);
    let store = remote.inner.clone();
    let auth = Arc::new(MemoryAuthProvider::new());
    auth.add_account(OWNER, SECRET);
    let engine = SyncEngineBuilder::new(SyncConfig::default())
        .with_remote(Arc::new(remote))
        .with_cache(Arc::new(MemoryCache::new()))
        .with_auth(auth.clone())
        .build()
        .unwrap();
    (engine, store, auth)
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_lets_running_cycle_finish() {
    let (engine, store, auth) = slow_engine(Duration::from_secs(5));
    store.put_document("userData", &owner_uid(), full_aggregate());
    engine.start().await.unwrap();
    auth.sign_in(OWNER, SECRET).await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(engine.status().await.cycle_in_progress);

    engine.shutdown().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let status = engine.status().await;
    assert!(!status.cycle_in_progress);
    assert!(status.last_cycle_time.is_some());
    assert!(!status.periodic_active);
    assert_eq!(store.write_count(), 14);

    // The finished cycle did not re-arm the timer.
    let reads = store.read_count();
    tokio::time::sleep(Duration::from_secs(900)).await;
    assert_eq!(store.read_count(), reads);
}

#[tokio::test(start_paused = true)]
async fn test_session_loss_during_first_cycle_leaves_timer_off() {
    let (engine, store, auth) = slow_engine(Duration::from_secs(5));
    engine.start().await.unwrap();
    auth.sign_in(OWNER, SECRET).await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    auth.sign_out().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let status = engine.status().await;
    assert!(!status.cycle_in_progress);
    assert!(status.session_identity.is_none());
    assert!(!status.periodic_active);

    let reads = store.read_count();
    tokio::time::sleep(Duration::from_secs(900)).await;
    assert_eq!(store.read_count(), reads);
}

// =============================================================================
// SQLite-backed cache
// =============================================================================

#[tokio::test]
async fn test_cycle_against_sqlite_cache() {
    let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
    db.write_named(CollectionName::Inventory, &[json!({"sku": "A1"})])
        .await
        .unwrap();

    let remote = Arc::new(MemoryRemoteStore::new());
    remote.put_document(
        "userData",
        &owner_uid(),
        json!({ "repairs": { "items": [{"id": "r1"}] } }),
    );
    let auth = Arc::new(MemoryAuthProvider::new());
    auth.add_account(OWNER, SECRET);

    let engine = SyncEngineBuilder::new(SyncConfig::default())
        .with_remote(remote.clone())
        .with_cache(db.clone())
        .with_auth(auth.clone())
        .build()
        .unwrap();

    engine.start().await.unwrap();
    auth.sign_in(OWNER, SECRET).await.unwrap();

    for _ in 0..200 {
        if engine.status().await.last_cycle_time.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(engine.status().await.last_cycle_time.is_some());

    assert_eq!(
        db.read_named(CollectionName::Repairs).await.unwrap(),
        Some(vec![json!({"id": "r1"})])
    );
    let doc = remote.document("userData", &owner_uid()).unwrap();
    assert_eq!(doc["inventory"]["items"], json!([{"sku": "A1"}]));
    assert!(db.read_meta(meta_keys::LAST_SYNC).await.unwrap().is_some());

    engine.shutdown().await;
}
