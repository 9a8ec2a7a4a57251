//! Mistakes service
//!
//! High-level operations on mistake records.

use crate::error::{AppError, Result};
use crate::store::{CascadeReport, MistakeDraft, MistakeRecord, SharedStore};

/// Service for managing mistake records
#[derive(Clone)]
pub struct MistakesService {
    store: SharedStore,
}

impl MistakesService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Create a new mistake under a subject and chapter
    pub async fn create_mistake(
        &self,
        subject: &str,
        chapter: &str,
        draft: MistakeDraft,
    ) -> Result<MistakeRecord> {
        let record = self
            .store
            .write()
            .await
            .add_mistake(subject, chapter, draft)
            .await?;

        tracing::info!("Mistake created: {} ({})", record.id, record.title);

        Ok(record)
    }

    /// Get a mistake by ID
    pub async fn get_mistake(&self, id: &str) -> Result<MistakeRecord> {
        self.store
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::MistakeNotFound(id.to_string()))
    }

    /// Mistakes filed under a subject and chapter, oldest first
    pub async fn list_mistakes(&self, subject: &str, chapter: &str) -> Vec<MistakeRecord> {
        self.store
            .read()
            .await
            .list_mistakes(subject, chapter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn update_mistake(&self, id: &str, draft: MistakeDraft) -> Result<MistakeRecord> {
        tracing::debug!("Updating mistake: {}", id);

        let record = self.store.write().await.update_mistake(id, draft).await?;

        tracing::info!("Mistake updated: {}", id);

        Ok(record)
    }

    /// Delete a mistake and its images
    pub async fn delete_mistake(&self, id: &str) -> Result<CascadeReport> {
        tracing::info!("Deleting mistake: {}", id);

        self.store.write().await.delete_mistake(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ImageStore;
    use crate::store::{Documents, RecordStore};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::RwLock;

    async fn create_test_service() -> (MistakesService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let images = ImageStore::new(temp_dir.path().join("images"));
        let store = RecordStore::open(Documents::new(temp_dir.path().to_path_buf()), images).await;
        (MistakesService::new(Arc::new(RwLock::new(store))), temp_dir)
    }

    #[tokio::test]
    async fn test_create_and_get_mistake() {
        let (service, _temp) = create_test_service().await;

        let record = service
            .create_mistake("物理", "力学", MistakeDraft::new("斜面", "受力分析", "mg sinθ"))
            .await
            .unwrap();

        let fetched = service.get_mistake(&record.id).await.unwrap();

        assert_eq!(fetched, record);
        assert_eq!(fetched.subject, "物理");
        assert_eq!(fetched.chapter, "力学");
        assert!(!fetched.date.is_empty());
    }

    #[tokio::test]
    async fn test_delete_mistake() {
        let (service, _temp) = create_test_service().await;

        let record = service
            .create_mistake("物理", "力学", MistakeDraft::new("t", "d", ""))
            .await
            .unwrap();
        service.delete_mistake(&record.id).await.unwrap();

        assert!(matches!(
            service.get_mistake(&record.id).await,
            Err(AppError::MistakeNotFound(_))
        ));
        assert!(service.list_mistakes("物理", "力学").await.is_empty());
    }
}
