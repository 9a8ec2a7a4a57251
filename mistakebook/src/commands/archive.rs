//! Export and import commands
//!
//! Both run on a background task; the session waits for the completion
//! handoff and reports it through the status sink.

use super::{Interaction, Outcome, Session};
use crate::error::AppError;

impl<I: Interaction> Session<I> {
    /// Pick a destination and write the whole notebook there
    pub async fn export_archive(&mut self) -> Outcome {
        let Some(dest) = self.ui.pick_save_file("Export notebook") else {
            return Outcome::cancelled();
        };

        self.ui
            .status(&format!("Exporting to {}...", dest.display()));

        let handle = self.state.archive_service.spawn_export(dest);
        let result = handle.await.unwrap_or_else(|e| Err(AppError::from(e)));

        let outcome = match result {
            Ok(path) => Outcome::success(format!("Exported to {}", path.display())),
            Err(e) => Outcome::from_error("Export", e),
        };
        self.ui.status(&outcome.message);
        outcome
    }

    /// Pick an archive and replace the notebook with its contents
    pub async fn import_archive(&mut self) -> Outcome {
        let Some(src) = self
            .ui
            .pick_open_files("Import notebook")
            .into_iter()
            .next()
        else {
            return Outcome::cancelled();
        };

        if !self.ui.confirm(
            "Import notebook",
            "Importing replaces all subjects, chapters, mistakes and images. Continue?",
        ) {
            return Outcome::cancelled();
        }

        self.ui
            .status(&format!("Importing from {}...", src.display()));

        let handle = self.state.archive_service.spawn_import(src);
        let result = handle.await.unwrap_or_else(|e| Err(AppError::from(e)));
        self.refresh().await;

        let outcome = match result {
            Ok(summary) => Outcome::success(format!(
                "Imported {} subjects, {} mistakes and {} images",
                summary.subjects, summary.mistakes, summary.images
            )),
            Err(e) => Outcome::from_error("Import", e),
        };
        self.ui.status(&outcome.message);
        outcome
    }
}
