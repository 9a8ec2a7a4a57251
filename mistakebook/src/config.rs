//! Application configuration
//!
//! Central location for file layout constants, seed data, and timestamp
//! formats, plus resolution of the data root at startup.

use std::path::{Path, PathBuf};

// ===== Data Root Layout =====

/// Ordered list of subject names
pub const SUBJECTS_FILE: &str = "subjects.json";
/// Subject name -> ordered chapter names
pub const CHAPTERS_FILE: &str = "chapters.json";
/// Mistake records, pretty-printed
pub const MISTAKES_FILE: &str = "mistakes.json";

/// The three documents, in the order they are written to archives and backups.
pub const DOCUMENT_FILES: [&str; 3] = [SUBJECTS_FILE, CHAPTERS_FILE, MISTAKES_FILE];

/// Managed image directory, relative to the data root
pub const IMAGES_DIR: &str = "images";
/// Pre-import copies of the documents, relative to the data root
pub const BACKUP_DIR: &str = "backup";

/// Suffix appended to a document that failed to parse on load
pub const QUARANTINE_SUFFIX: &str = "corrupt";

/// Folder used when no data root is configured
pub const DEFAULT_DATA_DIR: &str = "mistakes_data";
/// Environment variable overriding the data root
pub const DATA_DIR_ENV: &str = "MISTAKEBOOK_DATA_DIR";

// ===== Archives =====

/// Manifest entry written at the root of every exported archive
pub const ARCHIVE_MANIFEST: &str = "manifest.json";

// ===== Timestamps =====

/// Record id format: local time down to microseconds
pub const ID_FORMAT: &str = "%Y%m%d%H%M%S%6f";
/// Human-readable `date` field format
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ===== Limits =====

/// Longest file name kept when copying an image into the managed directory
pub const MAX_IMAGE_NAME_LENGTH: usize = 255;

// ===== Seed Data =====

/// Subjects offered on a fresh install, paired with their starter chapters.
pub const DEFAULT_CATALOG: &[(&str, &[&str])] = &[
    ("数学", &["代数", "几何", "函数", "概率统计"]),
    ("物理", &["力学", "电磁学", "光学", "热学"]),
    ("化学", &["无机化学", "有机化学", "物理化学", "分析化学"]),
    ("生物", &["细胞生物学", "遗传学", "生态学", "生理学"]),
    ("英语", &["语法", "阅读理解", "写作", "听力"]),
    ("语文", &["文言文", "现代文阅读", "作文", "基础知识"]),
];

/// Runtime configuration resolved once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Resolve the data root: explicit value, then `MISTAKEBOOK_DATA_DIR`,
    /// then `./mistakes_data`. The result is always absolute.
    pub fn resolve(explicit: Option<PathBuf>) -> std::io::Result<Self> {
        let data_dir = explicit
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Ok(Self {
            data_dir: std::path::absolute(&data_dir)?,
        })
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join(IMAGES_DIR)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(BACKUP_DIR)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_dir_is_made_absolute() {
        let config = AppConfig::resolve(Some(PathBuf::from("some/relative"))).unwrap();

        assert!(config.data_dir.is_absolute());
        assert!(config.data_dir.ends_with("some/relative"));
        assert_eq!(config.images_dir(), config.data_dir.join("images"));
        assert_eq!(config.backup_dir(), config.data_dir.join("backup"));
    }

    #[test]
    fn test_default_catalog_has_six_subjects() {
        assert_eq!(DEFAULT_CATALOG.len(), 6);
        assert!(DEFAULT_CATALOG.iter().all(|(_, chapters)| chapters.len() == 4));
    }
}
