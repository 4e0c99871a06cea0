//! Single-flight caches shared across concurrent runs.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::service::rules::domain_authority::AuthorityClassification;

/// Key -> shared cell. Concurrent first lookups for one key run `init` once
/// and every caller observes the same value.
pub struct SingleFlight<V> {
    cells: DashMap<String, Arc<OnceCell<V>>>,
}

impl<V: Clone> SingleFlight<V> {
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    pub async fn get_or_init<F, Fut>(&self, key: &str, init: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        // Clone the cell out so the shard lock is released before awaiting.
        let cell = self
            .cells
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        cell.get_or_init(init).await.clone()
    }

    /// The value if it has already been computed.
    pub fn get(&self, key: &str) -> Option<V> {
        self.cells.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Forget one key; returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.cells.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.iter().filter(|entry| entry.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for SingleFlight<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of researching one domain's authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainResearch {
    pub classification: AuthorityClassification,
    pub raw_text: String,
    pub researched_at: DateTime<Utc>,
    /// The research call failed and the classification is the UNKNOWN fallback.
    pub failed: bool,
}

/// Per-domain research results for the lifetime of the process.
#[derive(Default)]
pub struct DomainResearchCache {
    inner: SingleFlight<DomainResearch>,
}

impl DomainResearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_research<F, Fut>(&self, domain: &str, research: F) -> DomainResearch
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DomainResearch>,
    {
        let key = domain.trim().to_ascii_lowercase();
        if let Some(hit) = self.inner.get(&key) {
            tracing::debug!("Domain research cache hit for {}", key);
            return hit;
        }
        self.inner.get_or_init(&key, research).await
    }

    pub fn get(&self, domain: &str) -> Option<DomainResearch> {
        self.inner.get(&domain.trim().to_ascii_lowercase())
    }

    pub fn invalidate(&self, domain: &str) -> bool {
        self.inner.remove(&domain.trim().to_ascii_lowercase())
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
