//! Record models
//!
//! Rust structs for the entities kept in the JSON documents.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single logged mistake with its images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRecord")]
pub struct MistakeRecord {
    pub id: String,
    pub subject: String,
    pub chapter: String,
    pub title: String,
    pub description: String,
    pub answer: String,
    /// Set on creation and refreshed on every update
    pub date: String,
    /// Absolute paths into the managed image directory, in display order
    pub images: Vec<PathBuf>,
}

/// Editable fields of a mistake, as collected from the user
#[derive(Debug, Clone, Default)]
pub struct MistakeDraft {
    pub title: String,
    pub description: String,
    pub answer: String,
}

impl MistakeDraft {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            answer: answer.into(),
        }
    }
}

/// On-disk shape of a record, including the single-image field written by
/// older versions.
#[derive(Debug, Deserialize)]
struct StoredRecord {
    #[serde(default)]
    id: String,
    subject: String,
    chapter: String,
    title: String,
    description: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    images: Option<Vec<PathBuf>>,
    #[serde(default)]
    image: Option<PathBuf>,
}

impl From<StoredRecord> for MistakeRecord {
    fn from(stored: StoredRecord) -> Self {
        let images = match (stored.images, stored.image) {
            (Some(images), _) => images,
            (None, Some(legacy)) if !legacy.as_os_str().is_empty() => vec![legacy],
            (None, _) => Vec::new(),
        };

        Self {
            id: stored.id,
            subject: stored.subject,
            chapter: stored.chapter,
            title: stored.title,
            description: stored.description,
            answer: stored.answer,
            date: stored.date,
            images,
        }
    }
}
