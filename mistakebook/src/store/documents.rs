//! JSON document persistence
//!
//! Reads and writes the three documents that live at the root of a data
//! directory. Strict readers report every problem and are used to validate
//! staged imports; the lenient loaders used at startup never fail and fall
//! back to seed data instead. Every write goes to a temporary file that is
//! renamed over the target.

use super::models::MistakeRecord;
use crate::config::{
    CHAPTERS_FILE, DEFAULT_CATALOG, DOCUMENT_FILES, MISTAKES_FILE, QUARANTINE_SUFFIX,
    SUBJECTS_FILE,
};
use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Subject name -> ordered chapter names
pub type ChapterMap = BTreeMap<String, Vec<String>>;

/// Seed subjects for a fresh install
pub fn default_subjects() -> Vec<String> {
    DEFAULT_CATALOG
        .iter()
        .map(|(subject, _)| subject.to_string())
        .collect()
}

/// Seed chapters for a fresh install
pub fn default_chapters() -> ChapterMap {
    DEFAULT_CATALOG
        .iter()
        .map(|(subject, chapters)| {
            (
                subject.to_string(),
                chapters.iter().map(|c| c.to_string()).collect(),
            )
        })
        .collect()
}

/// The JSON documents of one data directory
#[derive(Debug, Clone)]
pub struct Documents {
    root: PathBuf,
}

impl Documents {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    // ===== Strict reads =====

    /// `Ok(None)` when the document does not exist.
    pub async fn read_subjects(&self) -> Result<Option<Vec<String>>> {
        read_document(&self.path(SUBJECTS_FILE)).await
    }

    pub async fn read_chapters(&self) -> Result<Option<ChapterMap>> {
        read_document(&self.path(CHAPTERS_FILE)).await
    }

    pub async fn read_mistakes(&self) -> Result<Option<Vec<MistakeRecord>>> {
        read_document(&self.path(MISTAKES_FILE)).await
    }

    // ===== Lenient loads =====

    /// Load subjects, seeding the defaults when the document is missing or
    /// unreadable.
    pub async fn load_subjects(&self) -> Vec<String> {
        self.load_or_else(SUBJECTS_FILE, default_subjects).await
    }

    pub async fn load_chapters(&self) -> ChapterMap {
        self.load_or_else(CHAPTERS_FILE, default_chapters).await
    }

    pub async fn load_mistakes(&self) -> Vec<MistakeRecord> {
        self.load_or_else(MISTAKES_FILE, Vec::new).await
    }

    async fn load_or_else<T, F>(&self, name: &str, default: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        let path = self.path(name);

        match read_document(&path).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                tracing::debug!("{} not found, using defaults", name);
                default()
            }
            Err(AppError::Serialization(e)) => {
                tracing::warn!("{} is not valid: {}", name, e);
                quarantine(&path).await;
                default()
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", name, e);
                default()
            }
        }
    }

    // ===== Writes =====

    pub async fn save_subjects(&self, subjects: &[String]) -> Result<()> {
        let content = serde_json::to_vec(subjects)?;
        write_atomic(&self.path(SUBJECTS_FILE), &content).await
    }

    pub async fn save_chapters(&self, chapters: &ChapterMap) -> Result<()> {
        let content = serde_json::to_vec(chapters)?;
        write_atomic(&self.path(CHAPTERS_FILE), &content).await
    }

    pub async fn save_mistakes<T: Serialize>(&self, mistakes: &[T]) -> Result<()> {
        let content = serde_json::to_vec_pretty(mistakes)?;
        write_atomic(&self.path(MISTAKES_FILE), &content).await
    }

    // ===== Backup copies =====

    /// Copy the documents that currently exist into `dir`, replacing whatever
    /// an earlier backup left there. Returns how many documents were copied.
    pub async fn backup_to(&self, dir: &Path) -> Result<usize> {
        if fs::try_exists(dir).await? {
            fs::remove_dir_all(dir).await?;
        }
        fs::create_dir_all(dir).await?;

        let mut copied = 0;
        for name in DOCUMENT_FILES {
            let src = self.path(name);
            if fs::try_exists(&src).await? {
                fs::copy(&src, dir.join(name)).await?;
                copied += 1;
            }
        }

        tracing::debug!("Backed up {} documents to {:?}", copied, dir);
        Ok(copied)
    }

    /// Put the documents back exactly as `backup_to` found them: copied ones
    /// are restored, ones that did not exist are removed again.
    pub async fn restore_from(&self, dir: &Path) -> Result<()> {
        for name in DOCUMENT_FILES {
            let saved = dir.join(name);
            let live = self.path(name);

            if fs::try_exists(&saved).await? {
                let content = fs::read(&saved).await?;
                write_atomic(&live, &content).await?;
            } else if fs::try_exists(&live).await? {
                fs::remove_file(&live).await?;
            }
        }

        tracing::info!("Documents restored from {:?}", dir);
        Ok(())
    }
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(serde_json::from_str(&content)?))
}

/// Move an unreadable document aside so the next save cannot overwrite it.
async fn quarantine(path: &Path) {
    let mut target = path.as_os_str().to_owned();
    target.push(".");
    target.push(QUARANTINE_SUFFIX);
    let target = PathBuf::from(target);

    match fs::rename(path, &target).await {
        Ok(()) => tracing::warn!("Moved unreadable document to {:?}", target),
        Err(e) => tracing::error!("Failed to quarantine {:?}: {}", path, e),
    }
}

/// Write to `<path>.tmp`, sync, and rename over `path`.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp_path = PathBuf::from(temp);

    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    tracing::debug!("Wrote {:?} ({} bytes)", path, data.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_documents() -> (Documents, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        (Documents::new(temp_dir.path().to_path_buf()), temp_dir)
    }

    #[tokio::test]
    async fn test_fresh_install_seeds_defaults() {
        let (docs, _temp) = create_test_documents();

        let subjects = docs.load_subjects().await;
        let chapters = docs.load_chapters().await;
        let mistakes = docs.load_mistakes().await;

        assert_eq!(subjects, vec!["数学", "物理", "化学", "生物", "英语", "语文"]);
        assert_eq!(chapters["数学"], vec!["代数", "几何", "函数", "概率统计"]);
        assert_eq!(chapters.len(), 6);
        assert!(mistakes.is_empty());

        // Loading never creates files
        assert!(docs.read_subjects().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_read_back() {
        let (docs, _temp) = create_test_documents();

        docs.save_subjects(&["数学".to_string()]).await.unwrap();
        let mut chapters = ChapterMap::new();
        chapters.insert("数学".to_string(), vec!["代数".to_string()]);
        docs.save_chapters(&chapters).await.unwrap();

        assert_eq!(docs.read_subjects().await.unwrap(), Some(vec!["数学".to_string()]));
        assert_eq!(docs.read_chapters().await.unwrap(), Some(chapters));

        // Non-ASCII is written as-is and no temp file is left behind
        let raw = std::fs::read_to_string(docs.path(SUBJECTS_FILE)).unwrap();
        assert_eq!(raw, r#"["数学"]"#);
        assert!(!docs.path("subjects.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_mistakes_are_pretty_printed() {
        let (docs, _temp) = create_test_documents();

        let records: Vec<MistakeRecord> = serde_json::from_str(
            r#"[{"id":"1","subject":"s","chapter":"c","title":"t","description":"d"}]"#,
        )
        .unwrap();
        docs.save_mistakes(&records).await.unwrap();

        let raw = std::fs::read_to_string(docs.path(MISTAKES_FILE)).unwrap();
        assert!(raw.contains("\n  {"));
        assert_eq!(docs.read_mistakes().await.unwrap(), Some(records));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_quarantined() {
        let (docs, _temp) = create_test_documents();

        std::fs::write(docs.path(MISTAKES_FILE), "[{ not json").unwrap();

        assert!(docs.read_mistakes().await.is_err());

        let mistakes = docs.load_mistakes().await;
        assert!(mistakes.is_empty());
        assert!(!docs.path(MISTAKES_FILE).exists());

        let quarantined = std::fs::read_to_string(docs.path("mistakes.json.corrupt")).unwrap();
        assert_eq!(quarantined, "[{ not json");
    }

    #[tokio::test]
    async fn test_backup_and_restore() {
        let (docs, temp) = create_test_documents();
        let backup_dir = temp.path().join("backup");

        docs.save_subjects(&["A".to_string()]).await.unwrap();
        assert_eq!(docs.backup_to(&backup_dir).await.unwrap(), 1);

        // Changes made after the backup
        docs.save_subjects(&["B".to_string()]).await.unwrap();
        docs.save_chapters(&ChapterMap::new()).await.unwrap();

        docs.restore_from(&backup_dir).await.unwrap();

        assert_eq!(docs.read_subjects().await.unwrap(), Some(vec!["A".to_string()]));
        assert!(docs.read_chapters().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backup_replaces_previous_backup() {
        let (docs, temp) = create_test_documents();
        let backup_dir = temp.path().join("backup");

        docs.save_chapters(&ChapterMap::new()).await.unwrap();
        docs.backup_to(&backup_dir).await.unwrap();
        assert!(backup_dir.join(CHAPTERS_FILE).exists());

        std::fs::remove_file(docs.path(CHAPTERS_FILE)).unwrap();
        docs.backup_to(&backup_dir).await.unwrap();
        assert!(!backup_dir.join(CHAPTERS_FILE).exists());
    }
}
