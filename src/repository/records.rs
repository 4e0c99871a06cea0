//! Typed repositories for the two things the engine persists.

use std::sync::Arc;

use crate::domain::{DomainAnalysisResult, PageScore};
use crate::error::StoreError;

use super::{KeyValueStore, StoredRecord};

pub const DOMAIN_ANALYSIS_COLLECTION: &str = "domain_analyses";
pub const PAGE_SCORE_COLLECTION: &str = "page_scores";

/// Domain analyses keyed by `domain::project`.
#[derive(Clone)]
pub struct DomainAnalysisRepository {
    store: Arc<dyn KeyValueStore>,
}

impl DomainAnalysisRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn cache_key(domain: &str, project_id: &str) -> String {
        format!("{}::{}", domain.trim().to_ascii_lowercase(), project_id.trim())
    }

    pub async fn find_latest(
        &self,
        domain: &str,
        project_id: &str,
    ) -> Result<Option<DomainAnalysisResult>, StoreError> {
        let key = Self::cache_key(domain, project_id);
        match self.store.find_latest_by_parent(DOMAIN_ANALYSIS_COLLECTION, &key).await? {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<DomainAnalysisResult>, StoreError> {
        match self.store.find_by_id(DOMAIN_ANALYSIS_COLLECTION, id).await? {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, result: &DomainAnalysisResult) -> Result<(), StoreError> {
        let record = StoredRecord::new(DOMAIN_ANALYSIS_COLLECTION, result.id.clone(), serde_json::to_value(result)?)
            .with_parent(Self::cache_key(&result.domain, &result.project_id))
            .updated_at(result.metadata.completed_at);
        self.store.upsert(record).await
    }

    /// Drop every cached analysis for the domain/project pair.
    pub async fn invalidate(&self, domain: &str, project_id: &str) -> Result<usize, StoreError> {
        let key = Self::cache_key(domain, project_id);
        let removed = self.store.delete_by_parent(DOMAIN_ANALYSIS_COLLECTION, &key).await?;
        tracing::debug!("Invalidated {} cached analyses for {}", removed, key);
        Ok(removed)
    }
}

/// Page scores, one record per evaluation, parented by URL.
#[derive(Clone)]
pub struct PageScoreRepository {
    store: Arc<dyn KeyValueStore>,
}

impl PageScoreRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist a score, returning the new record id.
    pub async fn save(&self, score: &PageScore) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let record = StoredRecord::new(PAGE_SCORE_COLLECTION, id.clone(), serde_json::to_value(score)?)
            .with_parent(score.url.clone())
            .updated_at(score.timestamp);
        self.store.create(record).await?;
        Ok(id)
    }

    pub async fn find_latest(&self, url: &str) -> Result<Option<PageScore>, StoreError> {
        match self.store.find_latest_by_parent(PAGE_SCORE_COLLECTION, url).await? {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<PageScore>, StoreError> {
        match self.store.find_by_id(PAGE_SCORE_COLLECTION, id).await? {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }
}
