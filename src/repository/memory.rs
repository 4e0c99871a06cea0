use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{KeyValueStore, StoredRecord};
use crate::error::StoreError;

struct Slot {
    record: StoredRecord,
    /// Write sequence, breaks ties between equal timestamps.
    seq: u64,
}

/// In-process store for tests and single-run CLI use.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<(String, String), Slot>,
    seq: AtomicU64,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads succeed, every write fails with `Unavailable`.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::Unavailable("memory store is read-only".to_string()));
        }
        Ok(())
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn create(&self, record: StoredRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        let key = (record.collection.clone(), record.id.clone());
        match self.records.entry(key) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!("{}/{}", record.collection, record.id))),
            Entry::Vacant(slot) => {
                let seq = self.next_seq();
                slot.insert(Slot { record, seq });
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self
            .records
            .get(&(collection.to_string(), id.to_string()))
            .map(|slot| slot.record.clone()))
    }

    async fn find_latest_by_parent(
        &self,
        collection: &str,
        parent_key: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let latest = self
            .records
            .iter()
            .filter(|entry| {
                let record = &entry.value().record;
                record.collection == collection && record.parent_key.as_deref() == Some(parent_key)
            })
            .max_by_key(|entry| (entry.value().record.updated_at, entry.value().seq))
            .map(|entry| entry.value().record.clone());
        Ok(latest)
    }

    async fn upsert(&self, record: StoredRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        let seq = self.next_seq();
        self.records
            .insert((record.collection.clone(), record.id.clone()), Slot { record, seq });
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self
            .records
            .remove(&(collection.to_string(), id.to_string()))
            .is_some())
    }

    async fn delete_by_parent(&self, collection: &str, parent_key: &str) -> Result<usize, StoreError> {
        self.check_writable()?;
        let before = self.records.len();
        self.records.retain(|_, slot| {
            !(slot.record.collection == collection && slot.record.parent_key.as_deref() == Some(parent_key))
        });
        Ok(before.saturating_sub(self.records.len()))
    }
}
