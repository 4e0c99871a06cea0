//! Persistence collaborator: a keyed document store and the typed repositories on top.
//!
//! The store is treated as eventually consistent key-value storage. Records live in
//! named collections and may point at a parent key (a page URL, a domain/project
//! pair) so the latest record for a parent can be found without secondary indexes.

pub mod memory;
pub mod records;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use records::{DomainAnalysisRepository, PageScoreRepository};
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub collection: String,
    pub parent_key: Option<String>,
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(collection: &str, id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            collection: collection.to_string(),
            parent_key: None,
            payload,
            updated_at: Utc::now(),
        }
    }

    pub fn with_parent(mut self, parent_key: impl Into<String>) -> Self {
        self.parent_key = Some(parent_key.into());
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Fixed-width UTC timestamp so stored values sort lexically in time order.
pub(crate) fn timestamp_key(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Insert a new record; fails with `Conflict` if the id already exists.
    async fn create(&self, record: StoredRecord) -> Result<(), StoreError>;

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// Most recently updated record under `parent_key`.
    async fn find_latest_by_parent(
        &self,
        collection: &str,
        parent_key: &str,
    ) -> Result<Option<StoredRecord>, StoreError>;

    async fn upsert(&self, record: StoredRecord) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Remove every record under `parent_key`, returning how many were removed.
    async fn delete_by_parent(&self, collection: &str, parent_key: &str) -> Result<usize, StoreError>;
}
