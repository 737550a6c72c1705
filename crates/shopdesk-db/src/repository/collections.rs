//! # Collection Repository
//!
//! Each collection is cached as one JSON array. A pull replaces the whole
//! array, a push reads the whole array; there is no per-record merge.
//!
//! A collection that has never been written has no row at all, which is
//! distinct from an empty array: `read` returns `None` for the former.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use shopdesk_core::CollectionName;

/// Row summary used by diagnostics and the seed tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub name: String,
    pub item_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Repository for cached collection arrays.
#[derive(Debug, Clone)]
pub struct CollectionRepository {
    pool: SqlitePool,
}

impl CollectionRepository {
    /// Creates a new CollectionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CollectionRepository { pool }
    }

    /// Reads the cached array for a collection.
    ///
    /// ## Returns
    /// * `Ok(Some(items))` - The collection has been written before
    /// * `Ok(None)` - Nothing cached for this collection yet
    /// * `Err(DbError::Corrupt)` - The stored text is not a JSON array
    pub async fn read(&self, name: CollectionName) -> DbResult<Option<Vec<Value>>> {
        let row = sqlx::query("SELECT items FROM collections WHERE name = ?1")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.try_get("items")?;
        let items: Vec<Value> =
            serde_json::from_str(&raw).map_err(|e| DbError::corrupt(name.as_str(), e))?;

        Ok(Some(items))
    }

    /// Replaces the cached array for a collection.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let items = vec![serde_json::json!({"id": "r-1", "status": "open"})];
    /// db.collections().write(CollectionName::Repairs, &items).await?;
    /// ```
    pub async fn write(&self, name: CollectionName, items: &[Value]) -> DbResult<()> {
        let raw = serde_json::to_string(items).map_err(|e| DbError::Internal(e.to_string()))?;
        let count = items.len() as i64;
        let now = Utc::now().to_rfc3339();

        debug!(collection = %name, items = count, "Writing cached collection");

        sqlx::query(
            r#"
            INSERT INTO collections (name, items, item_count, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
                items = excluded.items,
                item_count = excluded.item_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name.as_str())
        .bind(raw)
        .bind(count)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists every cached collection with its item count, ordered by name.
    pub async fn summaries(&self) -> DbResult<Vec<CollectionSummary>> {
        let rows = sqlx::query(
            "SELECT name, item_count, updated_at FROM collections ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> DbResult<CollectionSummary> {
                let name: String = row.try_get("name")?;
                let item_count: i64 = row.try_get("item_count")?;
                let updated_raw: String = row.try_get("updated_at")?;
                let updated_at = DateTime::parse_from_rfc3339(&updated_raw)
                    .map_err(|e| DbError::corrupt(name.clone(), e))?
                    .with_timezone(&Utc);

                Ok(CollectionSummary {
                    name,
                    item_count,
                    updated_at,
                })
            })
            .collect()
    }

    /// Removes the cached array for a collection.
    ///
    /// ## Returns
    /// `true` if a row was removed.
    pub async fn clear(&self, name: CollectionName) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(name.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts cached collections.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
