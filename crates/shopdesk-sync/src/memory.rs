//! # In-Memory Collaborators
//!
//! Scriptable stand-ins for the remote store, auth provider, bulk manager,
//! local cache, network monitor and event sink. Used by the unit and
//! integration tests, and handy for running the engine without a backend.
//!
//! ```text
//! MemoryRemoteStore   documents in a HashMap, shallow merge, failure
//!                     injection, read/write/reset counters
//! MemoryAuthProvider  watch-backed session, account table, readiness and
//!                     provisioning knobs, call log
//! MemoryCache         LocalCache over two HashMaps
//! MemoryBulkManager   counts passes, optional failure
//! ManualNetwork       toggled host connectivity
//! RecordingEmitter    records every event
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::auth::{AuthError, AuthProvider, AuthUser, SessionSubscription};
use crate::cache::LocalCache;
use crate::error::{SyncError, SyncResult};
use crate::events::SyncEventEmitter;
use crate::probe::NetworkMonitor;
use crate::remote::{BulkDataManager, Document, RemoteError, RemoteStore, WriteOptions};
use shopdesk_core::{CollectionName, EngineStatus, SyncSession};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Remote Store
// =============================================================================

/// One call made against [`MemoryRemoteStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    Read { collection: String, id: String },
    Write { collection: String, id: String, merge: bool },
    Reset,
}

#[derive(Default)]
struct RemoteState {
    documents: HashMap<(String, String), Document>,
    queued_read_failures: VecDeque<RemoteError>,
    read_failure: Option<RemoteError>,
    document_failures: HashMap<(String, String), RemoteError>,
    write_failure: Option<RemoteError>,
    reset_fails: bool,
    ops: Vec<RemoteOp>,
}

/// Remote store holding documents in memory.
pub struct MemoryRemoteStore {
    state: Mutex<RemoteState>,
    supports_reset: bool,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    /// A store that supports connection resets.
    pub fn new() -> Self {
        MemoryRemoteStore {
            state: Mutex::new(RemoteState::default()),
            supports_reset: true,
        }
    }

    /// A store with no reset collaborator.
    pub fn without_reset() -> Self {
        MemoryRemoteStore {
            supports_reset: false,
            ..Self::new()
        }
    }

    /// Stores `body` (must be a JSON object) as a document.
    pub fn put_document(&self, collection: &str, id: &str, body: Value) {
        if let Value::Object(doc) = body {
            lock(&self.state)
                .documents
                .insert((collection.to_string(), id.to_string()), doc);
        }
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        lock(&self.state)
            .documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Fails the next `count` reads, whatever they target.
    pub fn fail_next_reads(&self, count: usize, err: RemoteError) {
        let mut state = lock(&self.state);
        for _ in 0..count {
            state.queued_read_failures.push_back(err.clone());
        }
    }

    /// Fails every read until cleared with `None`.
    pub fn fail_reads(&self, err: Option<RemoteError>) {
        lock(&self.state).read_failure = err;
    }

    /// Fails every read of one document.
    pub fn fail_document(&self, collection: &str, id: &str, err: RemoteError) {
        lock(&self.state)
            .document_failures
            .insert((collection.to_string(), id.to_string()), err);
    }

    /// Fails every write until cleared with `None`.
    pub fn fail_writes(&self, err: Option<RemoteError>) {
        lock(&self.state).write_failure = err;
    }

    pub fn fail_resets(&self, fail: bool) {
        lock(&self.state).reset_fails = fail;
    }

    pub fn ops(&self) -> Vec<RemoteOp> {
        lock(&self.state).ops.clone()
    }

    pub fn read_count(&self) -> usize {
        self.count(|op| matches!(op, RemoteOp::Read { .. }))
    }

    pub fn write_count(&self) -> usize {
        self.count(|op| matches!(op, RemoteOp::Write { .. }))
    }

    pub fn reset_count(&self) -> usize {
        self.count(|op| matches!(op, RemoteOp::Reset))
    }

    /// Whether the most recent write used merge semantics.
    pub fn last_write_merged(&self) -> bool {
        lock(&self.state)
            .ops
            .iter()
            .rev()
            .find_map(|op| match op {
                RemoteOp::Write { merge, .. } => Some(*merge),
                _ => None,
            })
            .unwrap_or(false)
    }

    fn count(&self, pred: impl Fn(&RemoteOp) -> bool) -> usize {
        lock(&self.state).ops.iter().filter(|op| pred(op)).count()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn read_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RemoteError> {
        let mut state = lock(&self.state);
        state.ops.push(RemoteOp::Read {
            collection: collection.to_string(),
            id: id.to_string(),
        });

        if let Some(err) = state.queued_read_failures.pop_front() {
            return Err(err);
        }
        if let Some(err) = &state.read_failure {
            return Err(err.clone());
        }

        let key = (collection.to_string(), id.to_string());
        if let Some(err) = state.document_failures.get(&key) {
            return Err(err.clone());
        }
        Ok(state.documents.get(&key).cloned())
    }

    async fn write_document(
        &self,
        collection: &str,
        id: &str,
        payload: Document,
        options: WriteOptions,
    ) -> Result<(), RemoteError> {
        let mut state = lock(&self.state);
        state.ops.push(RemoteOp::Write {
            collection: collection.to_string(),
            id: id.to_string(),
            merge: options.merge,
        });

        if let Some(err) = &state.write_failure {
            return Err(err.clone());
        }

        let key = (collection.to_string(), id.to_string());
        if options.merge {
            let doc = state.documents.entry(key).or_default();
            for (field, value) in payload {
                doc.insert(field, value);
            }
        } else {
            state.documents.insert(key, payload);
        }
        Ok(())
    }

    fn supports_reset(&self) -> bool {
        self.supports_reset
    }

    async fn reset_connection(&self) -> Result<(), RemoteError> {
        let mut state = lock(&self.state);
        state.ops.push(RemoteOp::Reset);
        if state.reset_fails {
            return Err(RemoteError::Offline("connection reset failed".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Auth Provider
// =============================================================================

/// One call made against [`MemoryAuthProvider`], with its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCall {
    SignIn(String),
    Provision(String),
    SignOut,
}

#[derive(Debug, Clone)]
enum Readiness {
    Ready,
    Failing(AuthError),
    Never,
}

struct AuthState {
    accounts: HashMap<String, String>,
    readiness: Readiness,
    provision_failure: Option<AuthError>,
    calls: Vec<AuthCall>,
}

/// Auth provider with an in-memory account table.
///
/// Subject ids are derived from the identity (`uid:<identity>`) so tests can
/// predict them.
pub struct MemoryAuthProvider {
    session: watch::Sender<Option<AuthUser>>,
    state: Mutex<AuthState>,
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        MemoryAuthProvider {
            session,
            state: Mutex::new(AuthState {
                accounts: HashMap::new(),
                readiness: Readiness::Ready,
                provision_failure: None,
                calls: Vec::new(),
            }),
        }
    }

    pub fn uid_for(identity: &str) -> String {
        format!("uid:{}", identity)
    }

    pub fn add_account(&self, identity: &str, secret: &str) {
        lock(&self.state)
            .accounts
            .insert(identity.to_string(), secret.to_string());
    }

    pub fn set_ready(&self) {
        lock(&self.state).readiness = Readiness::Ready;
    }

    /// `wait_ready` fails immediately with `err`.
    pub fn set_failing(&self, err: AuthError) {
        lock(&self.state).readiness = Readiness::Failing(err);
    }

    /// `wait_ready` never resolves.
    pub fn set_never_ready(&self) {
        lock(&self.state).readiness = Readiness::Never;
    }

    pub fn fail_provisioning(&self, err: Option<AuthError>) {
        lock(&self.state).provision_failure = err;
    }

    /// Reports a session change as the provider would.
    pub fn set_session(&self, user: Option<AuthUser>) {
        self.session.send_replace(user);
    }

    pub fn calls(&self) -> Vec<AuthCall> {
        lock(&self.state).calls.clone()
    }

    fn signed_in(&self, identity: &str) -> AuthUser {
        let user = AuthUser::new(Self::uid_for(identity), Some(identity.to_string()));
        self.session.send_replace(Some(user.clone()));
        user
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn wait_ready(&self) -> Result<(), AuthError> {
        let readiness = lock(&self.state).readiness.clone();
        match readiness {
            Readiness::Ready => Ok(()),
            Readiness::Failing(err) => Err(err),
            Readiness::Never => std::future::pending().await,
        }
    }

    fn on_session_change(&self) -> SessionSubscription {
        SessionSubscription::new(self.session.subscribe())
    }

    async fn sign_in(&self, identity: &str, secret: &str) -> Result<AuthUser, AuthError> {
        let known = {
            let mut state = lock(&self.state);
            state.calls.push(AuthCall::SignIn(identity.to_string()));
            state.accounts.get(identity).cloned()
        };

        match known {
            None => Err(AuthError::PrincipalNotFound(identity.to_string())),
            Some(expected) if expected != secret => {
                Err(AuthError::InvalidCredentials(identity.to_string()))
            }
            Some(_) => Ok(self.signed_in(identity)),
        }
    }

    async fn provision_account(
        &self,
        identity: &str,
        secret: &str,
    ) -> Result<AuthUser, AuthError> {
        {
            let mut state = lock(&self.state);
            state.calls.push(AuthCall::Provision(identity.to_string()));
            if let Some(err) = state.provision_failure.clone() {
                return Err(err);
            }
            if state.accounts.contains_key(identity) {
                return Err(AuthError::Other(format!("{} already exists", identity)));
            }
            state
                .accounts
                .insert(identity.to_string(), secret.to_string());
        }
        Ok(self.signed_in(identity))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        lock(&self.state).calls.push(AuthCall::SignOut);
        self.session.send_replace(None);
        Ok(())
    }

    fn current_session(&self) -> Option<AuthUser> {
        self.session.borrow().clone()
    }
}

// =============================================================================
// Local Cache
// =============================================================================

/// Local cache over two HashMaps.
#[derive(Default)]
pub struct MemoryCache {
    collections: Mutex<HashMap<CollectionName, Vec<Value>>>,
    meta: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: CollectionName, items: Vec<Value>) {
        lock(&self.collections).insert(name, items);
    }

    pub fn items(&self, name: CollectionName) -> Option<Vec<Value>> {
        lock(&self.collections).get(&name).cloned()
    }

    pub fn meta(&self, key: &str) -> Option<String> {
        lock(&self.meta).get(key).cloned()
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn read_named(&self, name: CollectionName) -> SyncResult<Option<Vec<Value>>> {
        Ok(self.items(name))
    }

    async fn write_named(&self, name: CollectionName, items: &[Value]) -> SyncResult<()> {
        self.insert(name, items.to_vec());
        Ok(())
    }

    async fn read_meta(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.meta(key))
    }

    async fn write_meta(&self, key: &str, value: &str) -> SyncResult<()> {
        lock(&self.meta).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_meta(&self, key: &str) -> SyncResult<()> {
        lock(&self.meta).remove(key);
        Ok(())
    }
}

// =============================================================================
// Bulk Data Manager
// =============================================================================

/// Bulk manager that counts passes.
#[derive(Default)]
pub struct MemoryBulkManager {
    pulls: AtomicUsize,
    pushes: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl MemoryBulkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every pass with `message`.
    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    fn check(&self) -> SyncResult<()> {
        match lock(&self.failure).clone() {
            Some(message) => Err(SyncError::Bulk(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BulkDataManager for MemoryBulkManager {
    async fn pull_all_collections(&self, _session: &SyncSession) -> SyncResult<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.check()
    }

    async fn push_all_collections(&self, _session: &SyncSession) -> SyncResult<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        self.check()
    }
}

// =============================================================================
// Network Monitor
// =============================================================================

/// Host connectivity that tests switch on and off.
pub struct ManualNetwork {
    online: AtomicBool,
}

impl ManualNetwork {
    pub fn new(online: bool) -> Self {
        ManualNetwork {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl NetworkMonitor for ManualNetwork {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Recording Emitter
// =============================================================================

/// An event seen by [`RecordingEmitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Status(EngineStatus),
    DataRefreshed(CollectionName),
    Error { message: String, retryable: bool },
}

/// Emitter that records every event.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        lock(&self.events).clone()
    }

    pub fn refreshed(&self) -> Vec<CollectionName> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                EngineEvent::DataRefreshed(name) => Some(*name),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Error { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl SyncEventEmitter for RecordingEmitter {
    fn emit_status(&self, status: &EngineStatus) {
        lock(&self.events).push(EngineEvent::Status(status.clone()));
    }

    fn emit_data_refreshed(&self, collection: CollectionName) {
        lock(&self.events).push(EngineEvent::DataRefreshed(collection));
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        lock(&self.events).push(EngineEvent::Error {
            message: message.to_string(),
            retryable,
        });
    }
}
