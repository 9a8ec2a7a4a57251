//! Managed image directory
//!
//! Images attached to a mistake are copied into a single flat directory and
//! named `{record_id}_{original_file_name}`. Records refer to them by
//! absolute path.
//!
//! Example: `photo.png` added to record `20240101120000123456` is stored at
//! `images/20240101120000123456_photo.png`.

use crate::config::MAX_IMAGE_NAME_LENGTH;
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Directory of images owned by mistake records
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Create an image store at the given root directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Initialize the image store (create directory if needed)
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::debug!("Image store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Where `source` lands when attached to `record_id`
    pub fn destination_for(&self, record_id: &str, source: &Path) -> Result<PathBuf> {
        let original = source
            .file_name()
            .map(|name| name.to_string_lossy())
            .ok_or_else(|| AppError::Image(format!("Not a file: {}", source.display())))?;

        let safe_name = sanitize_filename(&format!("{}_{}", record_id, original));
        Ok(self.root.join(safe_name))
    }

    /// Copy `source` into the store for `record_id`, replacing any image of
    /// the same name. Returns the stored path.
    pub async fn import(&self, record_id: &str, source: &Path) -> Result<PathBuf> {
        let dest = self.destination_for(record_id, source)?;

        if !fs::metadata(source).await?.is_file() {
            return Err(AppError::Image(format!("Not a file: {}", source.display())));
        }

        fs::create_dir_all(&self.root).await?;

        // Copy to temp file first, then rename over the destination
        let mut temp = dest.as_os_str().to_owned();
        temp.push(".tmp");
        let temp_path = PathBuf::from(temp);

        let size = fs::copy(source, &temp_path).await?;
        if let Err(e) = fs::rename(&temp_path, &dest).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!("Copied image {:?} -> {:?} ({} bytes)", source, dest, size);

        Ok(dest)
    }

    /// Whether `path` points inside the managed directory
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
            && path
                .strip_prefix(&self.root)
                .map(|rel| {
                    rel.components()
                        .all(|c| matches!(c, std::path::Component::Normal(_)))
                })
                .unwrap_or(false)
    }

    /// Delete a stored image. Returns `false` when there was nothing to
    /// delete. Paths outside the managed directory are never touched.
    pub async fn remove(&self, path: &Path) -> Result<bool> {
        if !self.contains(path) {
            return Err(AppError::Image(format!(
                "Refusing to delete file outside the image directory: {}",
                path.display()
            )));
        }

        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!("Deleted image: {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Map a path that no longer resolves onto the file of the same name in
    /// this store, if one exists there.
    pub fn rebase(&self, path: &Path) -> Option<PathBuf> {
        if path.exists() {
            return None;
        }

        let candidate = self.root.join(path.file_name()?);
        (candidate != path && candidate.is_file()).then_some(candidate)
    }

    /// Every file under the store, relative to its root (for export)
    pub fn list_all(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if !self.root.exists() {
            return Ok(files);
        }

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                files.push(rel.to_path_buf());
            }
        }

        Ok(files)
    }

    /// Get image store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Strip path separators and NUL bytes so a name cannot leave the directory
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .take(MAX_IMAGE_NAME_LENGTH)
        .collect()
}
