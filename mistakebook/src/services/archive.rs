//! Archive service
//!
//! Exports the notebook (the three documents plus the image directory) as a
//! single ZIP file with a manifest and checksums, and imports such a file
//! back. Both run on background tasks; only one may run at a time.
//!
//! Import never touches live data until the archive has been extracted into
//! a staging directory and its documents have been validated. The live
//! documents are then copied to `backup/` and the staged data is swapped in.
//! The image directory is replaced only together with the mistake list, since
//! the list is what refers to the images. If anything fails from that point
//! on, both the documents and the image directory are put back.

use crate::config::{ARCHIVE_MANIFEST, BACKUP_DIR, DOCUMENT_FILES, IMAGES_DIR, MISTAKES_FILE};
use crate::error::{AppError, Result};
use crate::store::{Documents, RecordStore, SharedStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

/// Archive manifest structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub version: String,
    pub timestamp: String,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub checksum: String,
}

/// What a successful import brought in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub subjects: usize,
    pub mistakes: usize,
    pub images: usize,
}

/// How far an import got in replacing live data
#[derive(Debug, Default)]
struct SwapProgress {
    images_retired: bool,
    images_installed: bool,
}

/// Archive service
#[derive(Clone)]
pub struct ArchiveService {
    store: SharedStore,
    data_dir: PathBuf,
    busy: Arc<Mutex<()>>,
}

impl ArchiveService {
    pub fn new(store: SharedStore, data_dir: PathBuf) -> Self {
        Self {
            store,
            data_dir,
            busy: Arc::new(Mutex::new(())),
        }
    }

    /// Run [`export_archive`](Self::export_archive) on a background task
    pub fn spawn_export(&self, dest: PathBuf) -> JoinHandle<Result<PathBuf>> {
        let service = self.clone();
        tokio::spawn(async move { service.export_archive(&dest).await })
    }

    /// Run [`import_archive`](Self::import_archive) on a background task
    pub fn spawn_import(&self, src: PathBuf) -> JoinHandle<Result<ImportSummary>> {
        let service = self.clone();
        tokio::spawn(async move { service.import_archive(&src).await })
    }

    /// Write the notebook to `dest`. The archive is assembled in a temporary
    /// file next to `dest` and renamed into place once complete.
    pub async fn export_archive(&self, dest: &Path) -> Result<PathBuf> {
        let _guard = self.busy.try_lock().map_err(|_| AppError::ArchiveBusy)?;

        tracing::info!("Exporting notebook to {:?}", dest);

        // Hold the store still while its files are read
        let store = self.store.read().await;
        let images = store.images().list_all()?;

        let data_dir = self.data_dir.clone();
        let dest = dest.to_path_buf();
        let result =
            tokio::task::spawn_blocking(move || write_archive(&data_dir, &images, &dest)).await?;
        drop(store);

        match result {
            Ok(path) => {
                tracing::info!("Export completed: {:?}", path);
                Ok(path)
            }
            Err(e) => {
                tracing::error!("Export failed: {}", e);
                Err(AppError::Export(e.to_string()))
            }
        }
    }

    /// Replace the notebook with the contents of the archive at `src`
    pub async fn import_archive(&self, src: &Path) -> Result<ImportSummary> {
        let _guard = self.busy.try_lock().map_err(|_| AppError::ArchiveBusy)?;

        tracing::info!("Importing notebook from {:?}", src);

        let staging = self
            .data_dir
            .join(format!(".import-{}", Uuid::new_v4().simple()));

        let result = self.import_via_staging(src, &staging).await;

        if let Err(e) = fs::remove_dir_all(&staging).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to clean up staging directory {:?}: {}", staging, e);
            }
        }

        match result {
            Ok(summary) => {
                tracing::info!(
                    "Import completed: {} subjects, {} mistakes, {} images",
                    summary.subjects,
                    summary.mistakes,
                    summary.images
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("Import failed: {}", e);
                Err(match e {
                    AppError::Import(_) => e,
                    other => AppError::Import(other.to_string()),
                })
            }
        }
    }

    async fn import_via_staging(&self, src: &Path, staging: &Path) -> Result<ImportSummary> {
        // Extract and validate without touching live data
        let src_owned = src.to_path_buf();
        let staging_owned = staging.to_path_buf();
        let extracted =
            tokio::task::spawn_blocking(move || extract_archive(&src_owned, &staging_owned))
                .await?
                .map_err(|e| match e {
                    AppError::Import(_) => e,
                    other => AppError::Import(format!("Cannot read archive: {}", other)),
                })?;

        tracing::debug!("Extracted {} entries into {:?}", extracted, staging);

        validate_staged(&Documents::new(staging.to_path_buf())).await?;

        // From here on the live data is being replaced
        let mut store = self.store.write().await;

        let backup_dir = self.data_dir.join(BACKUP_DIR);
        store.documents().backup_to(&backup_dir).await?;

        let retired = self
            .data_dir
            .join(format!("{}.replaced-{}", IMAGES_DIR, Uuid::new_v4().simple()));
        let mut progress = SwapProgress::default();

        match self
            .swap_in(&mut store, staging, &retired, &mut progress)
            .await
        {
            Ok(summary) => {
                if progress.images_retired {
                    if let Err(e) = fs::remove_dir_all(&retired).await {
                        tracing::warn!("Failed to remove replaced images {:?}: {}", retired, e);
                    }
                }
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!("Rolling back import: {}", e);
                roll_back(&store, &backup_dir, &retired, &progress).await;
                Err(e)
            }
        }
    }

    async fn swap_in(
        &self,
        store: &mut RecordStore,
        staging: &Path,
        retired: &Path,
        progress: &mut SwapProgress,
    ) -> Result<ImportSummary> {
        let live_images = store.images().root().to_path_buf();
        let staged_images = staging.join(IMAGES_DIR);

        // Images belong to the mistake list; without one the live images stay
        if fs::try_exists(staging.join(MISTAKES_FILE)).await? {
            if fs::try_exists(&live_images).await? {
                fs::rename(&live_images, retired).await?;
                progress.images_retired = true;
            }

            if fs::try_exists(&staged_images).await? {
                fs::rename(&staged_images, &live_images).await?;
            } else {
                fs::create_dir_all(&live_images).await?;
            }
            progress.images_installed = true;
        } else if fs::try_exists(&staged_images).await? {
            tracing::warn!("Archive has images but no mistake list, keeping current images");
        }

        // Documents missing from the archive keep their current content
        for name in DOCUMENT_FILES {
            let staged = staging.join(name);
            if fs::try_exists(&staged).await? {
                fs::rename(&staged, self.data_dir.join(name)).await?;
            }
        }

        store.reload().await?;

        Ok(ImportSummary {
            subjects: store.subjects().len(),
            mistakes: store.mistake_count(),
            images: store.images().list_all()?.len(),
        })
    }
}

/// Put documents and images back the way they were before the swap started
async fn roll_back(store: &RecordStore, backup_dir: &Path, retired: &Path, progress: &SwapProgress) {
    if let Err(e) = store.documents().restore_from(backup_dir).await {
        tracing::error!("Failed to restore documents from backup: {}", e);
    }

    let live_images = store.images().root();

    if progress.images_installed {
        if let Err(e) = fs::remove_dir_all(live_images).await {
            tracing::error!("Failed to remove imported images: {}", e);
        }
    }

    if progress.images_retired {
        match fs::rename(retired, live_images).await {
            Ok(()) => tracing::info!("Image directory restored"),
            Err(e) => tracing::error!(
                "Failed to restore image directory from {:?}: {}",
                retired,
                e
            ),
        }
    } else if let Err(e) = fs::create_dir_all(live_images).await {
        tracing::error!("Failed to recreate image directory: {}", e);
    }
}

async fn validate_staged(staged: &Documents) -> Result<()> {
    let subjects = staged.read_subjects().await;
    let chapters = staged.read_chapters().await;
    let mistakes = staged.read_mistakes().await;

    let invalid = |name: &str, e: AppError| {
        AppError::Import(format!("Archive contains an invalid {}: {}", name, e))
    };

    let subjects = subjects.map_err(|e| invalid("subject list", e))?;
    let chapters = chapters.map_err(|e| invalid("chapter list", e))?;
    let mistakes = mistakes.map_err(|e| invalid("mistake list", e))?;

    if subjects.is_none() && chapters.is_none() && mistakes.is_none() {
        return Err(AppError::Import(
            "Archive does not contain any notebook data".to_string(),
        ));
    }

    Ok(())
}

// ===== Blocking archive I/O =====

fn write_archive(data_dir: &Path, images: &[PathBuf], dest: &Path) -> Result<PathBuf> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut partial = dest.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    if let Err(e) = pack(data_dir, images, &partial) {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    std::fs::rename(&partial, dest)?;
    Ok(dest.to_path_buf())
}

fn pack(data_dir: &Path, images: &[PathBuf], out: &Path) -> Result<()> {
    let file = File::create(out)?;
    let mut zip = ZipWriter::new(file);
    let options =
        FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

    let mut manifest = ArchiveManifest {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        files: Vec::new(),
    };

    // Documents that have never been saved are simply absent
    for name in DOCUMENT_FILES {
        let path = data_dir.join(name);
        if !path.exists() {
            continue;
        }

        let data = std::fs::read(&path)?;
        zip.start_file(name, options)?;
        zip.write_all(&data)?;
        manifest.files.push(FileEntry {
            path: name.to_string(),
            size: data.len() as u64,
            checksum: calculate_checksum(&data),
        });
    }

    let images_root = data_dir.join(IMAGES_DIR);
    for rel in images {
        let data = std::fs::read(images_root.join(rel))?;
        let entry = entry_name(&Path::new(IMAGES_DIR).join(rel));

        zip.start_file(entry.as_str(), options)?;
        zip.write_all(&data)?;
        manifest.files.push(FileEntry {
            path: entry,
            size: data.len() as u64,
            checksum: calculate_checksum(&data),
        });
    }

    tracing::debug!("Packed {} files", manifest.files.len());

    let manifest_json = serde_json::to_vec_pretty(&manifest)?;
    zip.start_file(ARCHIVE_MANIFEST, options)?;
    zip.write_all(&manifest_json)?;

    zip.finish()?;
    Ok(())
}

/// Extract notebook entries of the archive at `src` into `staging`.
/// Returns the number of files written.
fn extract_archive(src: &Path, staging: &Path) -> Result<usize> {
    let file = File::open(src)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    std::fs::create_dir_all(staging)?;

    let manifest = read_manifest(&mut archive)?;
    let mut checksums: HashMap<String, String> = HashMap::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let raw_name = entry.name().to_string();
        let rel = entry
            .enclosed_name()
            .ok_or_else(|| AppError::Import(format!("Unsafe path in archive: {}", raw_name)))?;

        if !is_notebook_entry(&rel) {
            tracing::debug!("Skipping archive entry: {}", raw_name);
            continue;
        }

        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;

        let target = staging.join(&rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &data)?;

        checksums.insert(entry_name(&rel), calculate_checksum(&data));
    }

    if let Some(manifest) = manifest {
        tracing::debug!(
            "Archive version: {}, timestamp: {}, files: {}",
            manifest.version,
            manifest.timestamp,
            manifest.files.len()
        );

        for listed in &manifest.files {
            match checksums.get(&listed.path) {
                Some(actual) if *actual == listed.checksum => {}
                Some(actual) => {
                    return Err(AppError::Import(format!(
                        "Checksum mismatch for {}: expected {}, got {}",
                        listed.path, listed.checksum, actual
                    )))
                }
                None => {
                    return Err(AppError::Import(format!(
                        "Archive is missing {}",
                        listed.path
                    )))
                }
            }
        }
    }

    Ok(checksums.len())
}

fn read_manifest<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Option<ArchiveManifest>> {
    let mut manifest_data = String::new();
    match archive.by_name(ARCHIVE_MANIFEST) {
        Ok(mut file) => {
            file.read_to_string(&mut manifest_data)?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    Ok(Some(serde_json::from_str(&manifest_data)?))
}

/// Only the three documents and files below `images/` are restored
fn is_notebook_entry(rel: &Path) -> bool {
    let parts: Vec<&std::ffi::OsStr> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();

    match parts.as_slice() {
        [name] => DOCUMENT_FILES.iter().any(|doc| *name == *doc),
        [dir, _, ..] => *dir == IMAGES_DIR,
        [] => false,
    }
}

/// Archive entry name for a relative path, always `/`-separated
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
