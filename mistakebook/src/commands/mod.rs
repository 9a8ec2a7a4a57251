//! User-facing commands
//!
//! A [`Session`] is what a front end drives: it holds the application state,
//! the current selection, and an [`Interaction`] used to ask the user for
//! names, confirmations and files. Every handler returns an [`Outcome`] with
//! a message that can be shown as-is.
//!
//! Handlers are grouped into submodules:
//! - `catalog`: subject and chapter operations
//! - `mistakes`: mistake operations
//! - `images`: image operations and the image cursor
//! - `archive`: export and import

pub mod archive;
pub mod catalog;
pub mod images;
pub mod mistakes;

use crate::app::AppState;
use crate::error::AppError;
use crate::selection::Selection;
use crate::store::MistakeRecord;
use std::path::PathBuf;

/// Questions a handler may ask the user
pub trait Interaction {
    /// Yes/no question. Returning false cancels the action.
    fn confirm(&mut self, title: &str, question: &str) -> bool;

    /// Short text answer, `None` when the user cancels
    fn ask_text(&mut self, title: &str, prompt: &str) -> Option<String>;

    /// Zero or more files to open
    fn pick_open_files(&mut self, title: &str) -> Vec<PathBuf>;

    /// One file to save to, `None` when the user cancels
    fn pick_save_file(&mut self, title: &str) -> Option<PathBuf>;

    /// Progress and completion messages from long-running actions
    fn status(&mut self, message: &str);
}

/// Result of a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub ok: bool,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::failure("Cancelled")
    }

    /// Failed action. Validation errors are expected and not logged.
    pub fn from_error(action: &str, error: AppError) -> Self {
        if !error.is_validation() {
            tracing::error!("{} failed: {}", action, error);
        }
        Self::failure(error.to_string())
    }
}

/// The currently selected mistake as a front end shows it
#[derive(Debug, Clone)]
pub struct MistakeView {
    pub record: MistakeRecord,
    /// Image under the cursor
    pub image: Option<PathBuf>,
    /// "i/n" position of the cursor
    pub image_label: String,
}

/// One user's session against the notebook
pub struct Session<I: Interaction> {
    state: AppState,
    selection: Selection,
    ui: I,
}

impl<I: Interaction> Session<I> {
    pub fn new(state: AppState, ui: I) -> Self {
        Self {
            state,
            selection: Selection::default(),
            ui,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn interaction(&self) -> &I {
        &self.ui
    }

    pub fn interaction_mut(&mut self) -> &mut I {
        &mut self.ui
    }

    // ===== Selection =====

    pub async fn select_subject(&mut self, subject: &str) -> Outcome {
        let store = self.state.store.read().await;
        self.selection.select_subject(&store, subject);

        match self.selection.subject() {
            Some(_) => Outcome::success(format!("Subject: {}", subject)),
            None => Outcome::failure(format!("Unknown subject '{}'", subject)),
        }
    }

    pub async fn select_chapter(&mut self, chapter: &str) -> Outcome {
        let store = self.state.store.read().await;
        self.selection.select_chapter(&store, chapter);

        match (self.selection.subject(), self.selection.chapter()) {
            (None, _) => Outcome::failure("Select a subject first"),
            (Some(_), Some(_)) => Outcome::success(format!("Chapter: {}", chapter)),
            (Some(subject), None) => Outcome::failure(format!(
                "Unknown chapter '{}' in '{}'",
                chapter, subject
            )),
        }
    }

    pub async fn select_mistake(&mut self, id: &str) -> Outcome {
        let store = self.state.store.read().await;

        if self.selection.select_mistake(&store, id) {
            Outcome::success(format!("Mistake: {}", id))
        } else {
            Outcome::failure(format!("No mistake '{}' in the selected chapter", id))
        }
    }

    /// Mistakes of the selected chapter, oldest first
    pub async fn visible_mistakes(&self) -> Vec<MistakeRecord> {
        let store = self.state.store.read().await;
        self.selection
            .visible_mistakes(&store)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn current_view(&self) -> Option<MistakeView> {
        let store = self.state.store.read().await;
        let record = self.selection.current_mistake(&store)?;

        Some(MistakeView {
            record: record.clone(),
            image: self.selection.current_image(&store).map(PathBuf::from),
            image_label: self.selection.image_label(&store),
        })
    }

    /// Re-derive the selection after the store changed
    async fn refresh(&mut self) {
        let store = self.state.store.read().await;
        self.selection.refresh(&store);
    }

    /// Selected subject, or a validation error naming what is missing
    fn require_subject(&self) -> Result<String, AppError> {
        self.selection
            .subject()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("Select a subject first"))
    }

    fn require_chapter(&self) -> Result<(String, String), AppError> {
        let subject = self.require_subject()?;
        let chapter = self
            .selection
            .chapter()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("Select a chapter first"))?;
        Ok((subject, chapter))
    }

    fn require_mistake(&self) -> Result<String, AppError> {
        self.selection
            .mistake_id()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("Select a mistake first"))
    }
}

/// Summary line for records and images removed by a cascade
fn describe_removal(records: usize, images: usize, failures: &[(PathBuf, String)]) -> String {
    let mut message = format!("{} mistakes and {} images removed", records, images);
    if !failures.is_empty() {
        message.push_str(&format!(
            "; {} image files could not be deleted",
            failures.len()
        ));
    }
    message
}
