//! Images service
//!
//! Attaches image files to mistakes and removes them again. Adding is
//! committed one file at a time: every image that was copied is also saved
//! before the next one is tried, and failures are reported per file.

use crate::error::{AppError, Result};
use crate::store::SharedStore;
use std::path::PathBuf;

/// Result of attaching a batch of images
#[derive(Debug, Default)]
pub struct AddImagesReport {
    /// Stored paths, in the order they were appended
    pub added: Vec<PathBuf>,
    /// Sources that could not be copied, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Image count of the record afterwards
    pub image_count: usize,
}

/// Result of removing one image
#[derive(Debug)]
pub struct DeleteImageReport {
    pub removed: PathBuf,
    /// The file was deleted from disk by this call
    pub file_deleted: bool,
    /// Set when the file could not be deleted
    pub file_error: Option<String>,
    pub remaining: usize,
}

/// Service for managing the images of mistakes
#[derive(Clone)]
pub struct ImagesService {
    store: SharedStore,
}

impl ImagesService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Copy `sources` into the image directory and append them to the
    /// mistake. Returns an error only if the mistake is unknown or saving
    /// fails; individual copy failures are listed in the report.
    pub async fn add_images(&self, id: &str, sources: &[PathBuf]) -> Result<AddImagesReport> {
        let mut store = self.store.write().await;

        let mut report = AddImagesReport {
            image_count: store
                .get(id)
                .map(|m| m.images.len())
                .ok_or_else(|| AppError::MistakeNotFound(id.to_string()))?,
            ..Default::default()
        };

        for source in sources {
            match store.images().import(id, source).await {
                Ok(stored) => {
                    report.image_count = store.attach_image(id, stored.clone()).await?;
                    report.added.push(stored);
                }
                Err(e) => {
                    tracing::warn!("Failed to add image {:?}: {}", source, e);
                    report.failed.push((source.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            "Added {} images to {} ({} failed)",
            report.added.len(),
            id,
            report.failed.len()
        );

        Ok(report)
    }

    /// Remove the image at `index` from the mistake. The list entry is
    /// dropped even when deleting the file fails.
    pub async fn delete_image(&self, id: &str, index: usize) -> Result<DeleteImageReport> {
        let mut store = self.store.write().await;

        let record = store
            .get(id)
            .ok_or_else(|| AppError::MistakeNotFound(id.to_string()))?;

        if record.images.is_empty() {
            return Err(AppError::validation("This mistake has no images"));
        }
        let Some(path) = record.images.get(index).cloned() else {
            return Err(AppError::validation(format!(
                "No image at position {} (mistake has {})",
                index + 1,
                record.images.len()
            )));
        };

        let (file_deleted, file_error) = match store.images().remove(&path).await {
            Ok(deleted) => (deleted, None),
            Err(e) => {
                tracing::warn!("Failed to delete image file {:?}: {}", path, e);
                (false, Some(e.to_string()))
            }
        };

        let (removed, remaining) = store.detach_image(id, index).await?;

        tracing::info!("Removed image {:?} from {}", removed, id);

        Ok(DeleteImageReport {
            removed,
            file_deleted,
            file_error,
            remaining,
        })
    }
}
