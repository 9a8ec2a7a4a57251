//! Subject and chapter commands

use super::{describe_removal, Interaction, Outcome, Session};

impl<I: Interaction> Session<I> {
    /// Ask for a name and add it as a subject, then select it
    pub async fn add_subject(&mut self) -> Outcome {
        let Some(name) = self.ui.ask_text("Add subject", "Subject name:") else {
            return Outcome::cancelled();
        };

        if let Err(e) = self.state.catalog_service.add_subject(&name).await {
            return Outcome::from_error("Add subject", e);
        }

        let name = name.trim();
        self.select_subject(name).await;
        Outcome::success(format!("Subject '{}' added", name))
    }

    /// Delete the selected subject with its chapters and mistakes
    pub async fn delete_subject(&mut self) -> Outcome {
        let subject = match self.require_subject() {
            Ok(subject) => subject,
            Err(e) => return Outcome::from_error("Delete subject", e),
        };

        let question = format!(
            "Delete subject '{}' together with all its chapters and mistakes?",
            subject
        );
        if !self.ui.confirm("Delete subject", &question) {
            return Outcome::cancelled();
        }

        let result = self.state.catalog_service.delete_subject(&subject).await;
        self.refresh().await;

        match result {
            Ok(report) => Outcome::success(format!(
                "Subject '{}' deleted: {}",
                subject,
                describe_removal(
                    report.records.len(),
                    report.images_removed,
                    &report.image_failures
                )
            )),
            Err(e) => Outcome::from_error("Delete subject", e),
        }
    }

    /// Ask for a name and add it as a chapter of the selected subject
    pub async fn add_chapter(&mut self) -> Outcome {
        let subject = match self.require_subject() {
            Ok(subject) => subject,
            Err(e) => return Outcome::from_error("Add chapter", e),
        };

        let prompt = format!("Chapter name for '{}':", subject);
        let Some(name) = self.ui.ask_text("Add chapter", &prompt) else {
            return Outcome::cancelled();
        };

        if let Err(e) = self.state.catalog_service.add_chapter(&subject, &name).await {
            return Outcome::from_error("Add chapter", e);
        }

        let name = name.trim();
        self.select_chapter(name).await;
        Outcome::success(format!("Chapter '{}' added to '{}'", name, subject))
    }

    /// Delete the selected chapter with its mistakes
    pub async fn delete_chapter(&mut self) -> Outcome {
        let (subject, chapter) = match self.require_chapter() {
            Ok(selected) => selected,
            Err(e) => return Outcome::from_error("Delete chapter", e),
        };

        let question = format!(
            "Delete chapter '{}' of '{}' together with all its mistakes?",
            chapter, subject
        );
        if !self.ui.confirm("Delete chapter", &question) {
            return Outcome::cancelled();
        }

        let result = self
            .state
            .catalog_service
            .delete_chapter(&subject, &chapter)
            .await;
        self.refresh().await;

        match result {
            Ok(report) => Outcome::success(format!(
                "Chapter '{}' deleted: {}",
                chapter,
                describe_removal(
                    report.records.len(),
                    report.images_removed,
                    &report.image_failures
                )
            )),
            Err(e) => Outcome::from_error("Delete chapter", e),
        }
    }
}
