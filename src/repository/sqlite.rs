use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::{timestamp_key, KeyValueStore, StoredRecord};
use crate::error::StoreError;

/// Per-connection pragmas, applied from `after_connect`.
async fn configure_sqlite_pragmas(conn: &mut sqlx::SqliteConnection, in_memory: bool) -> Result<(), sqlx::Error> {
    use sqlx::Executor;

    if !in_memory {
        conn.execute("PRAGMA journal_mode = WAL").await?;
        conn.execute("PRAGMA synchronous = NORMAL").await?;
    }
    conn.execute("PRAGMA busy_timeout = 5000").await?;
    conn.execute("PRAGMA temp_store = MEMORY").await?;
    Ok(())
}

/// `KeyValueStore` over a single sqlite table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and run the embedded migrations. `sqlite::memory:` keeps a single
    /// connection alive so every query sees the same database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .idle_timeout(Duration::from_secs(600))
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    configure_sqlite_pragmas(conn, in_memory).await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;

        sqlx::migrate!().run(&pool).await?;
        tracing::info!("Record store ready at {}", url);
        Ok(Self { pool })
    }

    /// Wrap an existing pool; the caller is responsible for migrations.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_record(row: &SqliteRow) -> Result<StoredRecord, StoreError> {
    let payload: String = row.try_get("payload")?;
    let updated_at: String = row.try_get("updated_at")?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Unavailable(format!("corrupt timestamp {updated_at}: {e}")))?;
    Ok(StoredRecord {
        id: row.try_get("id")?,
        collection: row.try_get("collection")?,
        parent_key: row.try_get("parent_key")?,
        payload: serde_json::from_str(&payload)?,
        updated_at,
    })
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn create(&self, record: StoredRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&record.payload)?;
        let result = sqlx::query(
            "INSERT INTO records (collection, id, parent_key, payload, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.collection)
        .bind(&record.id)
        .bind(&record.parent_key)
        .bind(payload)
        .bind(timestamp_key(&record.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::Conflict(format!("{}/{}", record.collection, record.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT collection, id, parent_key, payload, updated_at FROM records WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_latest_by_parent(
        &self,
        collection: &str,
        parent_key: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT collection, id, parent_key, payload, updated_at FROM records
             WHERE collection = ? AND parent_key = ?
             ORDER BY updated_at DESC, rowid DESC
             LIMIT 1",
        )
        .bind(collection)
        .bind(parent_key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn upsert(&self, record: StoredRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&record.payload)?;
        sqlx::query(
            "INSERT INTO records (collection, id, parent_key, payload, updated_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET
                parent_key = excluded.parent_key,
                payload = excluded.payload,
                updated_at = excluded.updated_at",
        )
        .bind(&record.collection)
        .bind(&record.id)
        .bind(&record.parent_key)
        .bind(payload)
        .bind(timestamp_key(&record.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_parent(&self, collection: &str, parent_key: &str) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND parent_key = ?")
            .bind(collection)
            .bind(parent_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn record(id: &str, parent: &str, hour: u32) -> StoredRecord {
        StoredRecord::new("things", id, json!({ "id": id, "nested": { "n": hour } }))
            .with_parent(parent)
            .updated_at(Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn create_and_find_by_id() {
        let store = store().await;
        store.create(record("a", "p", 1)).await.unwrap();
        let found = store.find_by_id("things", "a").await.unwrap().unwrap();
        assert_eq!(found, record("a", "p", 1));
        assert!(store.find_by_id("things", "missing").await.unwrap().is_none());
        assert!(store.find_by_id("other", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_a_conflict() {
        let store = store().await;
        store.create(record("a", "p", 1)).await.unwrap();
        let err = store.create(record("a", "p", 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn latest_by_parent_and_upsert() {
        let store = store().await;
        store.create(record("old", "p", 1)).await.unwrap();
        store.create(record("new", "p", 4)).await.unwrap();
        assert_eq!(store.find_latest_by_parent("things", "p").await.unwrap().unwrap().id, "new");

        store.upsert(record("old", "p", 8)).await.unwrap();
        assert_eq!(store.find_latest_by_parent("things", "p").await.unwrap().unwrap().id, "old");
        assert!(store.find_latest_by_parent("things", "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deletes_report_what_they_removed() {
        let store = store().await;
        store.create(record("a", "p", 1)).await.unwrap();
        store.create(record("b", "p", 2)).await.unwrap();
        store.create(record("c", "q", 3)).await.unwrap();

        assert!(store.delete("things", "c").await.unwrap());
        assert!(!store.delete("things", "c").await.unwrap());
        assert_eq!(store.delete_by_parent("things", "p").await.unwrap(), 2);
        assert!(store.find_latest_by_parent("things", "p").await.unwrap().is_none());
    }
}
