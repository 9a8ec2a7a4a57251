//! Mistake commands

use super::{describe_removal, Interaction, Outcome, Session};
use crate::store::MistakeDraft;

impl<I: Interaction> Session<I> {
    /// File a new mistake under the selected chapter and select it
    pub async fn add_mistake(&mut self, draft: MistakeDraft) -> Outcome {
        let subject = self.selection.subject().unwrap_or_default().to_string();
        let chapter = self.selection.chapter().unwrap_or_default().to_string();

        match self
            .state
            .mistakes_service
            .create_mistake(&subject, &chapter, draft)
            .await
        {
            Ok(record) => {
                self.select_mistake(&record.id).await;
                Outcome::success(format!("Mistake '{}' added ({})", record.title, record.id))
            }
            Err(e) => Outcome::from_error("Add mistake", e),
        }
    }

    /// Replace the text of the selected mistake
    pub async fn update_mistake(&mut self, draft: MistakeDraft) -> Outcome {
        let id = match self.require_mistake() {
            Ok(id) => id,
            Err(e) => return Outcome::from_error("Update mistake", e),
        };

        match self.state.mistakes_service.update_mistake(&id, draft).await {
            Ok(record) => Outcome::success(format!("Mistake '{}' updated", record.title)),
            Err(e) => Outcome::from_error("Update mistake", e),
        }
    }

    /// Delete the selected mistake and its images
    pub async fn delete_mistake(&mut self) -> Outcome {
        let id = match self.require_mistake() {
            Ok(id) => id,
            Err(e) => return Outcome::from_error("Delete mistake", e),
        };

        if !self
            .ui
            .confirm("Delete mistake", "Delete the selected mistake and its images?")
        {
            return Outcome::cancelled();
        }

        let result = self.state.mistakes_service.delete_mistake(&id).await;
        self.refresh().await;

        match result {
            Ok(report) => Outcome::success(format!(
                "Mistake deleted: {}",
                describe_removal(
                    report.records.len(),
                    report.images_removed,
                    &report.image_failures
                )
            )),
            Err(e) => Outcome::from_error("Delete mistake", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::tests::{create_test_session, session_with_mistake};
    use crate::store::MistakeDraft;

    #[tokio::test]
    async fn test_add_mistake_without_selection() {
        let (mut session, _temp) = create_test_session().await;

        let outcome = session.add_mistake(MistakeDraft::new("t", "d", "")).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.message, "Select a subject and chapter first");
    }

    #[tokio::test]
    async fn test_add_mistake_with_empty_title_changes_nothing() {
        let (mut session, _id, _temp) = session_with_mistake().await;

        let outcome = session.add_mistake(MistakeDraft::new("  ", "d", "")).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.message, "Title and description cannot be empty");
        assert_eq!(session.state().store.read().await.mistake_count(), 1);
    }

    #[tokio::test]
    async fn test_update_mistake() {
        let (mut session, id, _temp) = session_with_mistake().await;

        let outcome = session
            .update_mistake(MistakeDraft::new("平方差", "x²-1", "(x+1)(x-1)"))
            .await;

        assert!(outcome.ok, "{}", outcome.message);
        let store = session.state().store.read().await;
        assert_eq!(store.get(&id).unwrap().title, "平方差");
    }

    #[tokio::test]
    async fn test_update_requires_selected_mistake() {
        let (mut session, _temp) = create_test_session().await;

        let outcome = session
            .update_mistake(MistakeDraft::new("t", "d", ""))
            .await;

        assert_eq!(outcome.message, "Select a mistake first");
    }

    #[tokio::test]
    async fn test_delete_mistake() {
        let (mut session, id, _temp) = session_with_mistake().await;

        session.interaction_mut().confirms.push_back(true);
        let outcome = session.delete_mistake().await;

        assert!(outcome.ok, "{}", outcome.message);
        assert!(session.state().store.read().await.get(&id).is_none());
        assert_eq!(session.selection().mistake_id(), None);
        assert!(session.visible_mistakes().await.is_empty());
    }
}
