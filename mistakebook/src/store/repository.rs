//! Record store
//!
//! Owns the live, in-memory copy of the three collections and persists them
//! after every mutation by rewriting the affected documents in full. Records
//! are keyed by id, with a separate insertion-order index for display.
//!
//! Every path that removes records goes through [`RecordStore::cascade`],
//! which also deletes the image files those records owned.

use super::documents::{default_chapters, default_subjects, ChapterMap, Documents};
use super::models::{MistakeDraft, MistakeRecord};
use crate::config::{DATE_FORMAT, ID_FORMAT};
use crate::error::{AppError, Result};
use crate::storage::ImageStore;
use chrono::Local;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The store as shared between the UI task and archive workers
pub type SharedStore = Arc<RwLock<RecordStore>>;

/// Outcome of removing records together with their images
#[derive(Debug, Default)]
pub struct CascadeReport {
    pub records: Vec<MistakeRecord>,
    pub images_removed: usize,
    /// Image files that could not be deleted, with the reason
    pub image_failures: Vec<(PathBuf, String)>,
}

/// In-memory collections backed by JSON documents
#[derive(Debug)]
pub struct RecordStore {
    documents: Documents,
    images: ImageStore,
    subjects: Vec<String>,
    chapters: ChapterMap,
    records: HashMap<String, MistakeRecord>,
    order: Vec<String>,
}

impl RecordStore {
    /// Load everything from disk. Missing or unreadable documents fall back
    /// to seed data, so this never fails.
    pub async fn open(documents: Documents, images: ImageStore) -> Self {
        let subjects = documents.load_subjects().await;
        let chapters = documents.load_chapters().await;
        let mistakes = documents.load_mistakes().await;

        let mut store = Self {
            documents,
            images,
            subjects: Vec::new(),
            chapters: ChapterMap::new(),
            records: HashMap::new(),
            order: Vec::new(),
        };
        store.install(subjects, chapters, mistakes);

        tracing::info!(
            "Loaded {} subjects and {} mistakes from {:?}",
            store.subjects.len(),
            store.order.len(),
            store.documents.root()
        );

        store
    }

    /// Re-read all documents, failing on any document that does not parse.
    /// On error the in-memory collections are left untouched.
    pub async fn reload(&mut self) -> Result<()> {
        let subjects = self
            .documents
            .read_subjects()
            .await?
            .unwrap_or_else(default_subjects);
        let chapters = self
            .documents
            .read_chapters()
            .await?
            .unwrap_or_else(default_chapters);
        let mistakes = self.documents.read_mistakes().await?.unwrap_or_default();

        self.install(subjects, chapters, mistakes);

        tracing::info!(
            "Reloaded {} subjects and {} mistakes",
            self.subjects.len(),
            self.order.len()
        );

        Ok(())
    }

    /// Replace the collections with freshly loaded ones, normalizing them on
    /// the way in. Nothing is written back.
    fn install(
        &mut self,
        subjects: Vec<String>,
        chapters: ChapterMap,
        mistakes: Vec<MistakeRecord>,
    ) {
        let mut seen = HashSet::new();
        self.subjects = subjects
            .into_iter()
            .filter(|subject| seen.insert(subject.clone()))
            .collect();
        self.chapters = chapters;
        self.records.clear();
        self.order.clear();

        for mut record in mistakes {
            if record.id.is_empty() || self.records.contains_key(&record.id) {
                let fresh = self.next_id();
                tracing::warn!(
                    "Record '{}' has a missing or duplicate id '{}', assigned {}",
                    record.title,
                    record.id,
                    fresh
                );
                record.id = fresh;
            }

            for path in record.images.iter_mut() {
                if let Some(rebased) = self.images.rebase(path) {
                    tracing::debug!("Rebased image {:?} -> {:?}", path, rebased);
                    *path = rebased;
                }
            }

            self.order.push(record.id.clone());
            self.records.insert(record.id.clone(), record);
        }
    }

    // ===== Accessors =====

    pub fn documents(&self) -> &Documents {
        &self.documents
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn has_subject(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }

    /// Chapters of `subject`, empty when it has none
    pub fn chapters(&self, subject: &str) -> &[String] {
        self.chapters.get(subject).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn chapter_map(&self) -> &ChapterMap {
        &self.chapters
    }

    pub fn has_chapter(&self, subject: &str, chapter: &str) -> bool {
        self.chapters(subject).iter().any(|c| c == chapter)
    }

    /// All records in creation order
    pub fn mistakes(&self) -> impl Iterator<Item = &MistakeRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn mistake_count(&self) -> usize {
        self.order.len()
    }

    pub fn get(&self, id: &str) -> Option<&MistakeRecord> {
        self.records.get(id)
    }

    /// Records filed under exactly (`subject`, `chapter`), in creation order
    pub fn list_mistakes(&self, subject: &str, chapter: &str) -> Vec<&MistakeRecord> {
        self.mistakes()
            .filter(|m| m.subject == subject && m.chapter == chapter)
            .collect()
    }

    // ===== Persistence =====

    pub async fn save_subjects(&self) -> Result<()> {
        self.documents.save_subjects(&self.subjects).await
    }

    pub async fn save_chapters(&self) -> Result<()> {
        self.documents.save_chapters(&self.chapters).await
    }

    pub async fn save_mistakes(&self) -> Result<()> {
        let ordered: Vec<&MistakeRecord> = self.mistakes().collect();
        self.documents.save_mistakes(&ordered).await
    }

    // ===== Subjects and chapters =====

    pub async fn add_subject(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Subject name cannot be empty"));
        }
        if self.has_subject(name) {
            return Err(AppError::validation(format!(
                "Subject '{}' already exists",
                name
            )));
        }

        self.subjects.push(name.to_string());
        self.chapters.insert(name.to_string(), Vec::new());

        self.save_subjects().await?;
        self.save_chapters().await?;

        tracing::debug!("Added subject: {}", name);
        Ok(())
    }

    /// Remove a subject, its chapters, and every record filed under it
    pub async fn delete_subject(&mut self, name: &str) -> Result<CascadeReport> {
        if !self.has_subject(name) {
            return Err(AppError::validation(format!("Unknown subject '{}'", name)));
        }

        self.subjects.retain(|s| s != name);
        self.chapters.remove(name);

        self.save_subjects().await?;
        self.save_chapters().await?;

        self.cascade(|m| m.subject == name).await
    }

    pub async fn add_chapter(&mut self, subject: &str, name: &str) -> Result<()> {
        if subject.is_empty() {
            return Err(AppError::validation("Select a subject first"));
        }
        if !self.has_subject(subject) {
            return Err(AppError::validation(format!(
                "Unknown subject '{}'",
                subject
            )));
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Chapter name cannot be empty"));
        }

        let chapters = self.chapters.entry(subject.to_string()).or_default();
        if chapters.iter().any(|c| c == name) {
            return Err(AppError::validation(format!(
                "Chapter '{}' already exists in '{}'",
                name, subject
            )));
        }
        chapters.push(name.to_string());

        self.save_chapters().await?;

        tracing::debug!("Added chapter: {} / {}", subject, name);
        Ok(())
    }

    /// Remove a chapter and every record filed under it
    pub async fn delete_chapter(&mut self, subject: &str, chapter: &str) -> Result<CascadeReport> {
        if !self.has_chapter(subject, chapter) {
            return Err(AppError::validation(format!(
                "Unknown chapter '{}' in '{}'",
                chapter, subject
            )));
        }

        if let Some(chapters) = self.chapters.get_mut(subject) {
            chapters.retain(|c| c != chapter);
        }

        self.save_chapters().await?;

        self.cascade(|m| m.subject == subject && m.chapter == chapter)
            .await
    }

    // ===== Mistakes =====

    pub async fn add_mistake(
        &mut self,
        subject: &str,
        chapter: &str,
        draft: MistakeDraft,
    ) -> Result<MistakeRecord> {
        if subject.is_empty() || chapter.is_empty() {
            return Err(AppError::validation("Select a subject and chapter first"));
        }
        validate_draft(&draft)?;
        if !self.has_chapter(subject, chapter) {
            return Err(AppError::validation(format!(
                "Unknown chapter '{}' in '{}'",
                chapter, subject
            )));
        }

        let record = MistakeRecord {
            id: self.next_id(),
            subject: subject.to_string(),
            chapter: chapter.to_string(),
            title: draft.title,
            description: draft.description,
            answer: draft.answer,
            date: now_date(),
            images: Vec::new(),
        };

        self.order.push(record.id.clone());
        self.records.insert(record.id.clone(), record.clone());

        self.save_mistakes().await?;

        tracing::debug!("Added mistake: {}", record.id);
        Ok(record)
    }

    pub async fn update_mistake(&mut self, id: &str, draft: MistakeDraft) -> Result<MistakeRecord> {
        validate_draft(&draft)?;

        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| AppError::MistakeNotFound(id.to_string()))?;

        record.title = draft.title;
        record.description = draft.description;
        record.answer = draft.answer;
        record.date = now_date();
        let updated = record.clone();

        self.save_mistakes().await?;

        tracing::debug!("Updated mistake: {}", id);
        Ok(updated)
    }

    /// Remove one record and its images
    pub async fn delete_mistake(&mut self, id: &str) -> Result<CascadeReport> {
        if !self.records.contains_key(id) {
            return Err(AppError::MistakeNotFound(id.to_string()));
        }

        self.cascade(|m| m.id == id).await
    }

    /// Append a stored image path to a record and persist. Returns the new
    /// image count.
    pub async fn attach_image(&mut self, id: &str, path: PathBuf) -> Result<usize> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| AppError::MistakeNotFound(id.to_string()))?;

        record.images.push(path);
        let count = record.images.len();

        self.save_mistakes().await?;
        Ok(count)
    }

    /// Drop the image entry at `index` and persist. Returns the removed path
    /// and the remaining image count.
    pub async fn detach_image(&mut self, id: &str, index: usize) -> Result<(PathBuf, usize)> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| AppError::MistakeNotFound(id.to_string()))?;

        if index >= record.images.len() {
            return Err(AppError::validation(format!(
                "No image at position {} (record has {})",
                index + 1,
                record.images.len()
            )));
        }

        let removed = record.images.remove(index);
        let remaining = record.images.len();

        self.save_mistakes().await?;
        Ok((removed, remaining))
    }

    /// Remove every record matching `doomed`, persist, then delete the image
    /// files the removed records referenced. Image deletion is best-effort.
    async fn cascade<F>(&mut self, doomed: F) -> Result<CascadeReport>
    where
        F: Fn(&MistakeRecord) -> bool,
    {
        let removed_ids: Vec<String> = self
            .mistakes()
            .filter(|m| doomed(m))
            .map(|m| m.id.clone())
            .collect();

        let mut report = CascadeReport::default();
        if removed_ids.is_empty() {
            return Ok(report);
        }

        self.order.retain(|id| !removed_ids.contains(id));
        report.records = removed_ids
            .iter()
            .filter_map(|id| self.records.remove(id))
            .collect();

        self.save_mistakes().await?;

        for path in report.records.iter().flat_map(|m| m.images.iter()) {
            match self.images.remove(path).await {
                Ok(true) => report.images_removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Failed to delete image {:?}: {}", path, e);
                    report.image_failures.push((path.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            "Removed {} mistakes and {} images",
            report.records.len(),
            report.images_removed
        );

        Ok(report)
    }

    /// Timestamp id, suffixed with a counter if the clock has not advanced
    /// since the last record was created.
    fn next_id(&self) -> String {
        let base = Local::now().format(ID_FORMAT).to_string();
        if !self.records.contains_key(&base) {
            return base;
        }

        let mut n = 1u32;
        loop {
            let candidate = format!("{}-{}", base, n);
            if !self.records.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn validate_draft(draft: &MistakeDraft) -> Result<()> {
    if draft.title.trim().is_empty() || draft.description.trim().is_empty() {
        return Err(AppError::validation(
            "Title and description cannot be empty",
        ));
    }
    Ok(())
}

fn now_date() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IMAGES_DIR, MISTAKES_FILE};
    use std::path::Path;
    use tempfile::TempDir;

    async fn create_test_store() -> (RecordStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = open_at(temp_dir.path()).await;
        (store, temp_dir)
    }

    async fn open_at(root: &Path) -> RecordStore {
        let images = ImageStore::new(root.join(IMAGES_DIR));
        images.initialize().await.unwrap();
        RecordStore::open(Documents::new(root.to_path_buf()), images).await
    }

    async fn empty_store() -> (RecordStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("subjects.json"), "[]").unwrap();
        std::fs::write(temp_dir.path().join("chapters.json"), "{}").unwrap();
        let store = open_at(temp_dir.path()).await;
        (store, temp_dir)
    }

    fn draft(title: &str) -> MistakeDraft {
        MistakeDraft::new(title, "description", "answer")
    }

    #[tokio::test]
    async fn test_scenario_subject_chapter_mistake_cascade() {
        let (mut store, _temp) = empty_store().await;

        store.add_subject("数学").await.unwrap();
        assert_eq!(store.subjects(), ["数学"]);
        assert_eq!(store.chapter_map().get("数学"), Some(&Vec::new()));

        store.add_chapter("数学", "代数").await.unwrap();
        assert_eq!(store.chapters("数学"), ["代数"]);

        let record = store
            .add_mistake("数学", "代数", MistakeDraft::new("title", "desc", "ans"))
            .await
            .unwrap();
        assert!(!record.id.is_empty());
        assert!(record.images.is_empty());
        assert_eq!(store.mistake_count(), 1);

        store.delete_chapter("数学", "代数").await.unwrap();
        assert_eq!(store.mistake_count(), 0);
        assert_eq!(store.chapter_map().get("数学"), Some(&Vec::new()));
    }

    #[tokio::test]
    async fn test_add_subject_rejects_empty_and_duplicates() {
        let (mut store, _temp) = create_test_store().await;
        let before = store.subjects().to_vec();

        assert!(store.add_subject("").await.unwrap_err().is_validation());
        assert!(store.add_subject("  ").await.unwrap_err().is_validation());
        assert!(store.add_subject("数学").await.unwrap_err().is_validation());

        assert_eq!(store.subjects(), before.as_slice());
    }

    #[tokio::test]
    async fn test_subjects_never_duplicate() {
        let (mut store, _temp) = empty_store().await;

        for name in ["A", "B", "A", "C", "B"] {
            let _ = store.add_subject(name).await;
        }
        store.delete_subject("B").await.unwrap();
        let _ = store.add_subject("C").await;
        store.add_subject("B").await.unwrap();

        assert_eq!(store.subjects(), ["A", "C", "B"]);
    }

    #[tokio::test]
    async fn test_delete_subject_cascades() {
        let (mut store, _temp) = create_test_store().await;

        store.add_mistake("数学", "代数", draft("m1")).await.unwrap();
        store.add_mistake("数学", "几何", draft("m2")).await.unwrap();
        store.add_mistake("物理", "力学", draft("p1")).await.unwrap();

        let report = store.delete_subject("数学").await.unwrap();

        assert_eq!(report.records.len(), 2);
        assert!(!store.has_subject("数学"));
        assert!(store.chapter_map().get("数学").is_none());
        assert!(store.mistakes().all(|m| m.subject != "数学"));
        assert_eq!(store.mistake_count(), 1);

        // Persisted
        let reopened = RecordStore::open(store.documents().clone(), store.images().clone()).await;
        assert!(!reopened.has_subject("数学"));
        assert_eq!(reopened.mistake_count(), 1);
    }

    #[tokio::test]
    async fn test_add_chapter_validation() {
        let (mut store, _temp) = create_test_store().await;

        assert!(store.add_chapter("", "x").await.unwrap_err().is_validation());
        assert!(store.add_chapter("历史", "x").await.unwrap_err().is_validation());
        assert!(store.add_chapter("数学", "").await.unwrap_err().is_validation());
        assert!(store.add_chapter("数学", "代数").await.unwrap_err().is_validation());

        store.add_chapter("数学", "数列").await.unwrap();
        assert_eq!(store.chapters("数学").last().map(String::as_str), Some("数列"));
    }

    #[tokio::test]
    async fn test_add_mistake_validation_leaves_collection_unchanged() {
        let (mut store, _temp) = create_test_store().await;

        let empty_title = MistakeDraft::new("", "desc", "ans");
        let empty_desc = MistakeDraft::new("title", " ", "ans");

        assert!(store
            .add_mistake("数学", "代数", empty_title)
            .await
            .unwrap_err()
            .is_validation());
        assert!(store
            .add_mistake("数学", "代数", empty_desc)
            .await
            .unwrap_err()
            .is_validation());
        assert!(store
            .add_mistake("", "代数", draft("t"))
            .await
            .unwrap_err()
            .is_validation());
        assert!(store
            .add_mistake("数学", "力学", draft("t"))
            .await
            .unwrap_err()
            .is_validation());

        assert_eq!(store.mistake_count(), 0);
        assert!(!store.documents().path(MISTAKES_FILE).exists());
    }

    #[tokio::test]
    async fn test_answer_may_be_empty() {
        let (mut store, _temp) = create_test_store().await;

        let record = store
            .add_mistake("数学", "代数", MistakeDraft::new("t", "d", ""))
            .await
            .unwrap();

        assert_eq!(record.answer, "");
    }

    #[tokio::test]
    async fn test_ids_are_unique_within_one_tick() {
        let (mut store, _temp) = create_test_store().await;

        let mut ids = HashSet::new();
        for i in 0..50 {
            let record = store
                .add_mistake("数学", "代数", draft(&format!("m{}", i)))
                .await
                .unwrap();
            assert!(ids.insert(record.id));
        }
    }

    #[tokio::test]
    async fn test_update_mistake() {
        let (mut store, _temp) = create_test_store().await;
        let record = store.add_mistake("数学", "代数", draft("old")).await.unwrap();

        let updated = store
            .update_mistake(&record.id, MistakeDraft::new("new", "new desc", ""))
            .await
            .unwrap();

        assert_eq!(updated.id, record.id);
        assert_eq!(updated.title, "new");
        assert_eq!(store.get(&record.id).unwrap().description, "new desc");

        assert!(store
            .update_mistake(&record.id, MistakeDraft::new("", "d", ""))
            .await
            .unwrap_err()
            .is_validation());
        assert!(matches!(
            store.update_mistake("missing", draft("t")).await,
            Err(AppError::MistakeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_mistakes_filters_in_creation_order() {
        let (mut store, _temp) = create_test_store().await;

        store.add_mistake("数学", "代数", draft("first")).await.unwrap();
        store.add_mistake("数学", "几何", draft("other")).await.unwrap();
        store.add_mistake("数学", "代数", draft("second")).await.unwrap();

        let titles: Vec<_> = store
            .list_mistakes("数学", "代数")
            .iter()
            .map(|m| m.title.as_str())
            .collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_delete_mistake_removes_its_images() {
        let (mut store, temp) = create_test_store().await;
        let record = store.add_mistake("数学", "代数", draft("t")).await.unwrap();

        let source = temp.path().join("photo.png");
        std::fs::write(&source, b"img").unwrap();
        let stored = store.images().import(&record.id, &source).await.unwrap();
        store.attach_image(&record.id, stored.clone()).await.unwrap();

        let report = store.delete_mistake(&record.id).await.unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.images_removed, 1);
        assert!(!stored.exists());
        assert!(store.get(&record.id).is_none());
    }

    #[tokio::test]
    async fn test_legacy_records_normalized_on_every_load() {
        let temp_dir = TempDir::new().unwrap();
        let legacy = r#"[{"id":"1","subject":"数学","chapter":"代数","title":"t",
            "description":"d","answer":"","date":"","image":"/x/a.png"}]"#;
        std::fs::write(temp_dir.path().join(MISTAKES_FILE), legacy).unwrap();

        let mut store = open_at(temp_dir.path()).await;
        assert_eq!(store.get("1").unwrap().images, vec![PathBuf::from("/x/a.png")]);

        // Not written back until something else saves
        let raw = std::fs::read_to_string(temp_dir.path().join(MISTAKES_FILE)).unwrap();
        assert!(raw.contains("\"image\""));

        store.reload().await.unwrap();
        assert_eq!(store.get("1").unwrap().images.len(), 1);

        store.update_mistake("1", draft("t")).await.unwrap();
        let raw = std::fs::read_to_string(temp_dir.path().join(MISTAKES_FILE)).unwrap();
        assert!(!raw.contains("\"image\""));
        assert!(raw.contains("\"images\""));
    }

    #[tokio::test]
    async fn test_duplicate_ids_reassigned_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let records = r#"[
            {"id":"7","subject":"s","chapter":"c","title":"a","description":"d"},
            {"id":"7","subject":"s","chapter":"c","title":"b","description":"d"},
            {"subject":"s","chapter":"c","title":"c","description":"d"}
        ]"#;
        std::fs::write(temp_dir.path().join(MISTAKES_FILE), records).unwrap();

        let store = open_at(temp_dir.path()).await;

        assert_eq!(store.mistake_count(), 3);
        let ids: HashSet<_> = store.mistakes().map(|m| m.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(store.get("7").unwrap().title, "a");
    }

    #[tokio::test]
    async fn test_reload_fails_on_invalid_document_and_keeps_state() {
        let (mut store, temp) = create_test_store().await;
        store.add_mistake("数学", "代数", draft("t")).await.unwrap();

        std::fs::write(temp.path().join(MISTAKES_FILE), "garbage").unwrap();

        assert!(store.reload().await.is_err());
        assert_eq!(store.mistake_count(), 1);
    }
}
