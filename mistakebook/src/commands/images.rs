//! Image commands

use super::{Interaction, Outcome, Session};
use crate::error::AppError;

impl<I: Interaction> Session<I> {
    /// Pick image files and attach them to the selected mistake. The cursor
    /// moves to the last image afterwards.
    pub async fn add_images(&mut self) -> Outcome {
        let id = match self.require_mistake() {
            Ok(id) => id,
            Err(e) => return Outcome::from_error("Add images", e),
        };

        let sources = self.ui.pick_open_files("Select images");
        if sources.is_empty() {
            return Outcome::cancelled();
        }

        let result = self.state.images_service.add_images(&id, &sources).await;

        {
            let store = self.state.store.read().await;
            self.selection.show_last_image(&store);
        }

        match result {
            Ok(report) if report.failed.is_empty() => {
                Outcome::success(format!("Added {} images", report.added.len()))
            }
            Ok(report) => {
                let failures: Vec<String> = report
                    .failed
                    .iter()
                    .map(|(path, reason)| format!("{}: {}", path.display(), reason))
                    .collect();
                Outcome::failure(format!(
                    "Added {} of {} images; failed: {}",
                    report.added.len(),
                    sources.len(),
                    failures.join("; ")
                ))
            }
            Err(e) => Outcome::from_error("Add images", e),
        }
    }

    /// Remove the image under the cursor
    pub async fn delete_image(&mut self) -> Outcome {
        let id = match self.require_mistake() {
            Ok(id) => id,
            Err(e) => return Outcome::from_error("Delete image", e),
        };

        let Some(index) = self.selection.cursor().index() else {
            return Outcome::from_error(
                "Delete image",
                AppError::validation("This mistake has no images"),
            );
        };

        let result = self.state.images_service.delete_image(&id, index).await;
        self.refresh().await;

        match result {
            Ok(report) => match report.file_error {
                None => Outcome::success(format!(
                    "Image removed, {} remaining",
                    report.remaining
                )),
                Some(reason) => Outcome::failure(format!(
                    "Image removed from the mistake, but the file could not be deleted: {}",
                    reason
                )),
            },
            Err(e) => Outcome::from_error("Delete image", e),
        }
    }

    /// Show the image at a 1-based `position`. Positions outside the image
    /// list fail and leave the cursor where it was.
    pub async fn show_image(&mut self, position: usize) -> Outcome {
        if let Err(e) = self.require_mistake() {
            return Outcome::from_error("Show image", e);
        }

        let store = self.state.store.read().await;
        let shown = position
            .checked_sub(1)
            .is_some_and(|index| self.selection.show_image(&store, index));

        if shown {
            Outcome::success(self.selection.image_label(&store))
        } else {
            let count = self
                .selection
                .current_mistake(&store)
                .map_or(0, |record| record.images.len());
            Outcome::from_error(
                "Show image",
                AppError::validation(format!(
                    "No image at position {} (mistake has {})",
                    position, count
                )),
            )
        }
    }

    /// Show the next image, wrapping to the first. Returns the new "i/n" label.
    pub async fn next_image(&mut self) -> String {
        let store = self.state.store.read().await;
        self.selection.next_image(&store);
        self.selection.image_label(&store)
    }

    /// Show the previous image, wrapping to the last. Returns the new "i/n" label.
    pub async fn prev_image(&mut self) -> String {
        let store = self.state.store.read().await;
        self.selection.prev_image(&store);
        self.selection.image_label(&store)
    }
}
