//! # Local Cache Interface
//!
//! What the engine reads from and writes to the device-local cache. The
//! SQLite-backed [`shopdesk_db::Database`] implements it; tests use
//! [`MemoryCache`](crate::memory::MemoryCache).

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::SyncResult;
use shopdesk_core::{meta_keys, CachedCredentials, CollectionName};
use shopdesk_db::Database;

/// Local cache primitives.
#[async_trait]
pub trait LocalCache: Send + Sync {
    /// Reads a collection's item array, `None` if never written.
    async fn read_named(&self, name: CollectionName) -> SyncResult<Option<Vec<Value>>>;

    /// Replaces a collection's item array.
    async fn write_named(&self, name: CollectionName, items: &[Value]) -> SyncResult<()>;

    async fn read_meta(&self, key: &str) -> SyncResult<Option<String>>;

    async fn write_meta(&self, key: &str, value: &str) -> SyncResult<()>;

    async fn remove_meta(&self, key: &str) -> SyncResult<()>;

    /// The cached credential pair, if both halves are present.
    async fn cached_credentials(&self) -> SyncResult<Option<CachedCredentials>> {
        let identity = self.read_meta(meta_keys::CACHED_IDENTITY).await?;
        let secret = self.read_meta(meta_keys::CACHED_SECRET).await?;

        Ok(match (identity, secret) {
            (Some(identity), Some(secret)) => Some(CachedCredentials { identity, secret }),
            _ => None,
        })
    }

    async fn store_credentials(&self, credentials: &CachedCredentials) -> SyncResult<()> {
        self.write_meta(meta_keys::CACHED_IDENTITY, &credentials.identity)
            .await?;
        self.write_meta(meta_keys::CACHED_SECRET, &credentials.secret)
            .await
    }

    async fn clear_credentials(&self) -> SyncResult<()> {
        debug!("Clearing cached credentials");
        self.remove_meta(meta_keys::CACHED_IDENTITY).await?;
        self.remove_meta(meta_keys::CACHED_SECRET).await
    }
}

#[async_trait]
impl LocalCache for Database {
    async fn read_named(&self, name: CollectionName) -> SyncResult<Option<Vec<Value>>> {
        Ok(self.collections().read(name).await?)
    }

    async fn write_named(&self, name: CollectionName, items: &[Value]) -> SyncResult<()> {
        Ok(self.collections().write(name, items).await?)
    }

    async fn read_meta(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.meta().get(key).await?)
    }

    async fn write_meta(&self, key: &str, value: &str) -> SyncResult<()> {
        Ok(self.meta().set(key, value).await?)
    }

    async fn remove_meta(&self, key: &str) -> SyncResult<()> {
        Ok(self.meta().remove(key).await?)
    }
}
