//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config::AppConfig;
use crate::error::Result;
use crate::services::{ArchiveService, CatalogService, ImagesService, MistakesService};
use crate::storage::ImageStore;
use crate::store::{Documents, RecordStore, SharedStore};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: SharedStore,
    pub catalog_service: CatalogService,
    pub mistakes_service: MistakesService,
    pub images_service: ImagesService,
    pub archive_service: ArchiveService,
}

impl AppState {
    pub fn new(config: AppConfig, store: RecordStore) -> Self {
        let store: SharedStore = Arc::new(RwLock::new(store));

        Self {
            catalog_service: CatalogService::new(store.clone()),
            mistakes_service: MistakesService::new(store.clone()),
            images_service: ImagesService::new(store.clone()),
            archive_service: ArchiveService::new(store.clone(), config.data_dir.clone()),
            config,
            store,
        }
    }
}

/// Application setup - called once on startup
pub async fn setup(config: AppConfig) -> Result<AppState> {
    tracing::info!("Initializing mistake notebook");
    tracing::info!("Data directory: {:?}", config.data_dir());

    // Create necessary directories
    tokio::fs::create_dir_all(config.data_dir()).await?;

    let images = ImageStore::new(config.images_dir());
    images.initialize().await?;

    let store = RecordStore::open(Documents::new(config.data_dir.clone()), images).await;

    tracing::info!("Mistake notebook initialized successfully");

    Ok(AppState::new(config, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_setup_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::resolve(Some(temp_dir.path().join("notebook"))).unwrap();

        let state = setup(config).await.unwrap();

        assert!(temp_dir.path().join("notebook/images").is_dir());
        assert_eq!(state.catalog_service.list_subjects().await.len(), 6);
        // Nothing is written until the first mutation
        assert!(!temp_dir.path().join("notebook/subjects.json").exists());
    }
}
