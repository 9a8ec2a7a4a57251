//! Catalog service
//!
//! Subjects and the chapters filed under them.

use crate::error::Result;
use crate::store::{CascadeReport, SharedStore};

/// Service for managing subjects and chapters
#[derive(Clone)]
pub struct CatalogService {
    store: SharedStore,
}

impl CatalogService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Subjects in display order
    pub async fn list_subjects(&self) -> Vec<String> {
        self.store.read().await.subjects().to_vec()
    }

    /// Chapters of a subject in display order
    pub async fn list_chapters(&self, subject: &str) -> Vec<String> {
        self.store.read().await.chapters(subject).to_vec()
    }

    pub async fn add_subject(&self, name: &str) -> Result<()> {
        self.store.write().await.add_subject(name).await?;
        tracing::info!("Subject added: {}", name.trim());
        Ok(())
    }

    /// Delete a subject together with its chapters and mistakes
    pub async fn delete_subject(&self, name: &str) -> Result<CascadeReport> {
        tracing::info!("Deleting subject: {}", name);
        self.store.write().await.delete_subject(name).await
    }

    pub async fn add_chapter(&self, subject: &str, name: &str) -> Result<()> {
        self.store.write().await.add_chapter(subject, name).await?;
        tracing::info!("Chapter added: {} / {}", subject, name.trim());
        Ok(())
    }

    /// Delete a chapter together with its mistakes
    pub async fn delete_chapter(&self, subject: &str, chapter: &str) -> Result<CascadeReport> {
        tracing::info!("Deleting chapter: {} / {}", subject, chapter);
        self.store
            .write()
            .await
            .delete_chapter(subject, chapter)
            .await
    }
}
