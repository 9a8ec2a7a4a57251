//! View state
//!
//! Which subject, chapter and mistake are current, and which image of the
//! current mistake is shown. Everything here is derived from the record
//! store and is never persisted.

use crate::store::{MistakeRecord, RecordStore};
use std::path::Path;

/// Position in a mistake's image list. `None` means there is nothing to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageCursor {
    index: Option<usize>,
}

impl ImageCursor {
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// First image, or nothing when `len` is zero
    pub fn reset(&mut self, len: usize) {
        self.index = (len > 0).then_some(0);
    }

    /// Last image, or nothing when `len` is zero
    pub fn last(&mut self, len: usize) {
        self.index = len.checked_sub(1);
    }

    /// Point at `index`. Returns false and leaves the cursor alone when
    /// `index` is outside a list of `len` images.
    pub fn seek(&mut self, index: usize, len: usize) -> bool {
        if index >= len {
            return false;
        }
        self.index = Some(index);
        true
    }

    pub fn next(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.index = Some(self.index.map_or(0, |i| (i + 1) % len));
    }

    pub fn prev(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.index = Some(self.index.map_or(len - 1, |i| (i + len - 1) % len));
    }

    /// Keep the cursor inside a list that may have shrunk
    pub fn clamp(&mut self, len: usize) {
        self.index = match self.index {
            _ if len == 0 => None,
            Some(i) if i >= len => Some(len - 1),
            None => Some(0),
            other => other,
        };
    }

    /// One-based "i/n" position, `0/0` when the list is empty
    pub fn label(&self, len: usize) -> String {
        match self.index {
            Some(i) if len > 0 => format!("{}/{}", i.min(len - 1) + 1, len),
            _ => "0/0".to_string(),
        }
    }
}

/// Current subject, chapter and mistake
#[derive(Debug, Clone, Default)]
pub struct Selection {
    subject: Option<String>,
    chapter: Option<String>,
    mistake: Option<String>,
    cursor: ImageCursor,
}

impl Selection {
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn chapter(&self) -> Option<&str> {
        self.chapter.as_deref()
    }

    pub fn mistake_id(&self) -> Option<&str> {
        self.mistake.as_deref()
    }

    pub fn cursor(&self) -> ImageCursor {
        self.cursor
    }

    /// Select a subject and its first chapter. Unknown subjects clear the
    /// selection.
    pub fn select_subject(&mut self, store: &RecordStore, subject: &str) {
        self.mistake = None;
        self.cursor = ImageCursor::default();

        if store.has_subject(subject) {
            self.subject = Some(subject.to_string());
            self.chapter = store.chapters(subject).first().cloned();
        } else {
            self.subject = None;
            self.chapter = None;
        }
    }

    pub fn select_chapter(&mut self, store: &RecordStore, chapter: &str) {
        self.mistake = None;
        self.cursor = ImageCursor::default();

        self.chapter = self
            .subject
            .as_deref()
            .filter(|subject| store.has_chapter(subject, chapter))
            .map(|_| chapter.to_string());
    }

    /// Select a mistake of the current chapter and show its first image.
    /// Returns false when the mistake is not listed under the selection.
    pub fn select_mistake(&mut self, store: &RecordStore, id: &str) -> bool {
        let Some(record) = store.get(id).filter(|r| self.lists(r)) else {
            return false;
        };

        self.cursor.reset(record.images.len());
        self.mistake = Some(record.id.clone());
        true
    }

    pub fn clear_mistake(&mut self) {
        self.mistake = None;
        self.cursor = ImageCursor::default();
    }

    /// Drop whatever no longer exists after the store changed and clamp the
    /// image cursor.
    pub fn refresh(&mut self, store: &RecordStore) {
        if let Some(subject) = self.subject.as_deref() {
            if !store.has_subject(subject) {
                self.subject = None;
            }
        }

        let chapter_known = match (self.subject.as_deref(), self.chapter.as_deref()) {
            (Some(subject), Some(chapter)) => store.has_chapter(subject, chapter),
            _ => false,
        };
        if !chapter_known {
            self.chapter = self
                .subject
                .as_deref()
                .and_then(|subject| store.chapters(subject).first().cloned());
        }

        let images = self
            .current_mistake(store)
            .map(|record| record.images.len());
        match images {
            Some(len) => self.cursor.clamp(len),
            None => self.clear_mistake(),
        }
    }

    /// Mistakes under the selected subject and chapter
    pub fn visible_mistakes<'a>(&self, store: &'a RecordStore) -> Vec<&'a MistakeRecord> {
        match (self.subject.as_deref(), self.chapter.as_deref()) {
            (Some(subject), Some(chapter)) => store.list_mistakes(subject, chapter),
            _ => Vec::new(),
        }
    }

    pub fn current_mistake<'a>(&self, store: &'a RecordStore) -> Option<&'a MistakeRecord> {
        self.mistake
            .as_deref()
            .and_then(|id| store.get(id))
            .filter(|record| self.lists(record))
    }

    /// Path of the image under the cursor
    pub fn current_image<'a>(&self, store: &'a RecordStore) -> Option<&'a Path> {
        let record = self.current_mistake(store)?;
        record
            .images
            .get(self.cursor.index()?)
            .map(|path| path.as_path())
    }

    pub fn image_label(&self, store: &RecordStore) -> String {
        let len = self
            .current_mistake(store)
            .map_or(0, |record| record.images.len());
        self.cursor.label(len)
    }

    pub fn next_image(&mut self, store: &RecordStore) {
        let len = self.image_count(store);
        self.cursor.next(len);
    }

    pub fn prev_image(&mut self, store: &RecordStore) {
        let len = self.image_count(store);
        self.cursor.prev(len);
    }

    /// Show the image at a zero-based `index` of the current mistake
    pub fn show_image(&mut self, store: &RecordStore, index: usize) -> bool {
        let len = self.image_count(store);
        self.cursor.seek(index, len)
    }

    /// Show the last image, used after images were appended
    pub fn show_last_image(&mut self, store: &RecordStore) {
        let len = self.image_count(store);
        self.cursor.last(len);
    }

    fn image_count(&self, store: &RecordStore) -> usize {
        self.current_mistake(store)
            .map_or(0, |record| record.images.len())
    }

    fn lists(&self, record: &MistakeRecord) -> bool {
        self.subject.as_deref() == Some(record.subject.as_str())
            && self.chapter.as_deref() == Some(record.chapter.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ImageStore;
    use crate::store::{Documents, MistakeDraft};
    use std::path::PathBuf;
    use tempfile::TempDir;

    async fn create_test_store() -> (RecordStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let images = ImageStore::new(temp_dir.path().join("images"));
        images.initialize().await.unwrap();
        let store = RecordStore::open(Documents::new(temp_dir.path().to_path_buf()), images).await;
        (store, temp_dir)
    }

    async fn record_with_images(store: &mut RecordStore, count: usize) -> String {
        let record = store
            .add_mistake("数学", "代数", MistakeDraft::new("t", "d", ""))
            .await
            .unwrap();
        for i in 0..count {
            store
                .attach_image(&record.id, PathBuf::from(format!("/img/{}.png", i)))
                .await
                .unwrap();
        }
        record.id
    }

    #[test]
    fn test_next_len_times_is_identity() {
        for len in 1..6 {
            for start in 0..len {
                let mut cursor = ImageCursor { index: Some(start) };
                for _ in 0..len {
                    cursor.next(len);
                }
                assert_eq!(cursor.index(), Some(start));
            }
        }
    }

    #[test]
    fn test_next_then_prev_is_identity() {
        for len in 1..6 {
            for start in 0..len {
                let mut cursor = ImageCursor { index: Some(start) };
                cursor.next(len);
                cursor.prev(len);
                assert_eq!(cursor.index(), Some(start));
            }
        }
    }

    #[test]
    fn test_cursor_empty_list() {
        let mut cursor = ImageCursor::default();
        cursor.next(0);
        cursor.prev(0);
        assert_eq!(cursor.index(), None);
        assert_eq!(cursor.label(0), "0/0");

        cursor.last(0);
        assert_eq!(cursor.index(), None);
    }

    #[test]
    fn test_cursor_seek_bounds() {
        let mut cursor = ImageCursor { index: Some(1) };

        assert!(!cursor.seek(2, 2));
        assert!(!cursor.seek(0, 0));
        assert_eq!(cursor.index(), Some(1));

        assert!(cursor.seek(0, 2));
        assert_eq!(cursor.index(), Some(0));
    }

    #[test]
    fn test_cursor_clamp() {
        let mut cursor = ImageCursor { index: Some(2) };
        cursor.clamp(2);
        assert_eq!(cursor.index(), Some(1));
        assert_eq!(cursor.label(2), "2/2");

        cursor.clamp(0);
        assert_eq!(cursor.index(), None);
        assert_eq!(cursor.label(0), "0/0");
    }

    #[tokio::test]
    async fn test_select_subject_picks_first_chapter() {
        let (store, _temp) = create_test_store().await;
        let mut selection = Selection::default();

        selection.select_subject(&store, "物理");
        assert_eq!(selection.subject(), Some("物理"));
        assert_eq!(selection.chapter(), store.chapters("物理").first().map(String::as_str));

        selection.select_subject(&store, "不存在");
        assert_eq!(selection.subject(), None);
        assert_eq!(selection.chapter(), None);
    }

    #[tokio::test]
    async fn test_select_mistake_resets_cursor() {
        let (mut store, _temp) = create_test_store().await;
        let id = record_with_images(&mut store, 3).await;

        let mut selection = Selection::default();
        selection.select_subject(&store, "数学");
        selection.select_chapter(&store, "代数");

        assert!(selection.select_mistake(&store, &id));
        assert_eq!(selection.cursor().index(), Some(0));
        assert_eq!(selection.image_label(&store), "1/3");
        assert_eq!(selection.current_image(&store), Some(Path::new("/img/0.png")));

        selection.prev_image(&store);
        assert_eq!(selection.image_label(&store), "3/3");

        selection.select_chapter(&store, "几何");
        assert!(!selection.select_mistake(&store, &id));
    }

    #[tokio::test]
    async fn test_refresh_after_deletions() {
        let (mut store, _temp) = create_test_store().await;
        let id = record_with_images(&mut store, 2).await;

        let mut selection = Selection::default();
        selection.select_subject(&store, "数学");
        selection.select_chapter(&store, "代数");
        selection.select_mistake(&store, &id);
        selection.show_last_image(&store);
        assert_eq!(selection.cursor().index(), Some(1));

        store.detach_image(&id, 1).await.unwrap();
        selection.refresh(&store);
        assert_eq!(selection.cursor().index(), Some(0));

        store.delete_chapter("数学", "代数").await.unwrap();
        selection.refresh(&store);
        assert_eq!(selection.mistake_id(), None);
        assert_eq!(selection.chapter(), store.chapters("数学").first().map(String::as_str));

        store.delete_subject("数学").await.unwrap();
        selection.refresh(&store);
        assert_eq!(selection.subject(), None);
        assert_eq!(selection.chapter(), None);
        assert_eq!(selection.image_label(&store), "0/0");
    }
}
