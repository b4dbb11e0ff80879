//! Collection synchronizer - keeps the flat question-text list and the rich
//! question list consistent in both directions.
//!
//! Each `on_*` handler reacts to a change already made to one list and
//! mirrors it onto the other. Mirroring a change fires the opposite list's
//! handler, so every handler runs under a reentrancy guard: while one
//! propagation pass is in progress, any other handler call is ignored.
//!
//! After every pass the normalized text sets of both lists are equal, and the
//! flat list is written through the [`SessionStore`]. Write failures never
//! propagate; they are queued as warnings for the session to surface.

use crate::domain::clarification::{same_text, Question, StatusMessage};
use crate::domain::foundation::{QuestionId, ValidationError};

use super::store::SessionStore;

/// Flat and rich views of the same question set.
#[derive(Default)]
pub struct CollectionSynchronizer {
    flat: Vec<String>,
    rich: Vec<Question>,
    syncing: bool,
    store: Option<SessionStore>,
    warnings: Vec<StatusMessage>,
}

impl CollectionSynchronizer {
    /// Creates an unpersisted synchronizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists through `store` after every mutation.
    pub fn with_store(store: SessionStore) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    pub fn flat(&self) -> &[String] {
        &self.flat
    }

    pub fn rich(&self) -> &[Question] {
        &self.rich
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    pub fn find(&self, id: QuestionId) -> Option<&Question> {
        self.rich.iter().find(|q| q.id() == id)
    }

    /// Mutable access for answer and flag changes. Text edits must go through
    /// [`edit_text`](Self::edit_text) so the flat list follows.
    pub fn find_mut(&mut self, id: QuestionId) -> Option<&mut Question> {
        self.rich.iter_mut().find(|q| q.id() == id)
    }

    /// Drains persistence warnings raised since the last call.
    pub fn take_warnings(&mut self) -> Vec<StatusMessage> {
        std::mem::take(&mut self.warnings)
    }

    // ----- Mutators: change one side, then propagate -----

    /// Appends text to the flat list and mirrors it.
    pub fn push_flat(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.syncing || text.trim().is_empty() {
            return;
        }
        self.flat.push(text.clone());
        self.on_flat_added(&text);
    }

    /// Removes the first flat entry equal to `text` and mirrors it.
    pub fn remove_flat(&mut self, text: &str) -> bool {
        if self.syncing {
            return false;
        }
        match self.flat.iter().position(|t| same_text(t, text)) {
            Some(index) => {
                let removed = self.flat.remove(index);
                self.on_flat_removed(&removed);
                true
            }
            None => false,
        }
    }

    /// Appends a question and mirrors it.
    pub fn push_question(&mut self, question: Question) {
        if self.syncing {
            return;
        }
        self.rich.push(question.clone());
        self.on_rich_added(&question);
    }

    /// Removes a question by id and mirrors it.
    pub fn remove_question(&mut self, id: QuestionId) -> Option<Question> {
        if self.syncing {
            return None;
        }
        let index = self.rich.iter().position(|q| q.id() == id)?;
        let removed = self.rich.remove(index);
        self.on_rich_removed(&removed);
        Some(removed)
    }

    /// Changes a question's text and mirrors it.
    pub fn edit_text(&mut self, id: QuestionId, text: &str) -> Result<bool, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::empty_field("question_text"));
        }
        if self.syncing {
            return Ok(false);
        }
        let Some(question) = self.find_mut(id) else {
            return Ok(false);
        };
        let old = std::mem::replace(&mut question.text, text.to_string());
        let question = question.clone();
        self.on_rich_text_changed(&old, &question);
        Ok(true)
    }

    /// Replaces both lists in a single pass and persists once.
    pub fn replace_all(&mut self, questions: Vec<Question>) {
        if self.syncing {
            return;
        }
        self.syncing = true;
        self.rich = questions;
        self.flat.clear();
        for index in 0..self.rich.len() {
            let text = self.rich[index].text.clone();
            if !self.flat.iter().any(|t| same_text(t, &text)) {
                self.flat.push(text);
            }
        }
        self.syncing = false;
        self.persist();
    }

    pub fn clear(&mut self) {
        self.replace_all(Vec::new());
    }

    // ----- Propagation handlers -----

    /// A flat entry was added: attach a question unless one already has
    /// equal normalized text.
    pub fn on_flat_added(&mut self, text: &str) {
        if self.syncing {
            return;
        }
        self.syncing = true;
        if !self.rich.iter().any(|q| same_text(&q.text, text)) {
            if let Ok(question) = Question::new(text) {
                self.rich.push(question.clone());
                self.on_rich_added(&question);
            }
        }
        self.syncing = false;
        self.persist();
    }

    /// A flat entry was removed: drop the matching question, unless another
    /// flat entry still carries the same text. Duplicate questions sharing
    /// the text go with it.
    pub fn on_flat_removed(&mut self, text: &str) {
        if self.syncing {
            return;
        }
        self.syncing = true;
        let still_listed = self.flat.iter().any(|t| same_text(t, text));
        if !still_listed {
            while let Some(index) = self.rich.iter().position(|q| same_text(&q.text, text)) {
                let removed = self.rich.remove(index);
                self.on_rich_removed(&removed);
            }
        }
        self.syncing = false;
        self.persist();
    }

    /// A question was added: append its text unless already listed.
    pub fn on_rich_added(&mut self, question: &Question) {
        if self.syncing {
            return;
        }
        self.syncing = true;
        if !self.flat.iter().any(|t| same_text(t, &question.text)) {
            self.flat.push(question.text.clone());
            self.on_flat_added(&question.text);
        }
        self.syncing = false;
        self.persist();
    }

    /// A question was removed: drop the matching flat entry, unless another
    /// question still carries the same text.
    pub fn on_rich_removed(&mut self, question: &Question) {
        if self.syncing {
            return;
        }
        self.syncing = true;
        let still_present = self.rich.iter().any(|q| same_text(&q.text, &question.text));
        if !still_present {
            while let Some(index) = self.flat.iter().position(|t| same_text(t, &question.text)) {
                let removed = self.flat.remove(index);
                self.on_flat_removed(&removed);
            }
        }
        self.syncing = false;
        self.persist();
    }

    /// A question's text changed from `old`: overwrite the old flat entry in
    /// place, or append if none matches or another question still uses it.
    pub fn on_rich_text_changed(&mut self, old: &str, question: &Question) {
        if self.syncing {
            return;
        }
        self.syncing = true;
        let old_still_used = self
            .rich
            .iter()
            .any(|q| q.id() != question.id() && same_text(&q.text, old));
        let slot = self.flat.iter().position(|t| same_text(t, old));

        match slot {
            Some(index) if !old_still_used => {
                self.flat[index] = question.text.clone();
                if !same_text(old, &question.text) {
                    self.flat.retain(|t| !same_text(t, old));
                }
            }
            _ => {
                if !self.flat.iter().any(|t| same_text(t, &question.text)) {
                    self.flat.push(question.text.clone());
                    self.on_flat_added(&question.text);
                }
            }
        }
        self.syncing = false;
        self.persist();
    }

    /// Best-effort write of both lists.
    pub fn persist(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        let result = store
            .save_flat(&self.flat)
            .and_then(|_| store.save_records(&self.rich));
        if let Err(err) = result {
            tracing::warn!(error = %err, "Failed to persist questions");
            self.warnings
                .push(StatusMessage::warning(format!("Could not save questions: {}", err)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemoryKeyValueStore;
    use crate::domain::clarification::normalize;
    use crate::domain::foundation::RequirementId;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn q(text: &str) -> Question {
        Question::new(text).unwrap()
    }

    fn assert_consistent(sync: &CollectionSynchronizer) {
        let flat: BTreeSet<String> = sync.flat().iter().map(|t| normalize(t)).collect();
        let rich: BTreeSet<String> = sync.rich().iter().map(Question::normalized_text).collect();
        assert_eq!(flat, rich);
    }

    #[test]
    fn flat_add_creates_question() {
        let mut sync = CollectionSynchronizer::new();
        sync.push_flat("What is the timeout?");
        assert_eq!(sync.rich().len(), 1);
        assert_eq!(sync.flat(), ["What is the timeout?"]);
        assert!(!sync.is_syncing());
    }

    #[test]
    fn rich_add_appends_text_once() {
        let mut sync = CollectionSynchronizer::new();
        sync.push_question(q("Is X true?"));
        sync.push_question(q("is  x TRUE?"));
        assert_eq!(sync.flat().len(), 1);
        assert_eq!(sync.rich().len(), 2);
        assert_consistent(&sync);
    }

    #[test]
    fn rich_remove_keeps_flat_entry_while_text_still_used() {
        let mut sync = CollectionSynchronizer::new();
        let first = q("Is X true?");
        let first_id = first.id();
        sync.push_question(first);
        sync.push_question(q("Is X true?"));

        sync.remove_question(first_id);
        assert_eq!(sync.flat().len(), 1);
        assert_consistent(&sync);
    }

    #[test]
    fn flat_remove_drops_matching_question() {
        let mut sync = CollectionSynchronizer::new();
        sync.push_question(q("A?"));
        sync.push_question(q("B?"));
        assert!(sync.remove_flat("a?"));
        assert_eq!(sync.rich().len(), 1);
        assert_eq!(sync.rich()[0].text, "B?");
        assert_consistent(&sync);
    }

    #[test]
    fn flat_remove_takes_duplicate_questions_with_it() {
        let mut sync = CollectionSynchronizer::new();
        sync.push_question(q("A?"));
        sync.push_question(q("a?"));
        assert!(sync.remove_flat("A?"));
        assert!(sync.rich().is_empty());
        assert_consistent(&sync);
    }

    #[test]
    fn text_edit_drops_stale_flat_duplicates() {
        let mut sync = CollectionSynchronizer::new();
        sync.push_flat("A?");
        sync.push_flat("A?");
        let id = sync.rich()[0].id();

        sync.edit_text(id, "B?").unwrap();
        assert_eq!(sync.flat(), ["B?"]);
        assert_consistent(&sync);
    }

    #[test]
    fn text_edit_overwrites_in_place() {
        let mut sync = CollectionSynchronizer::new();
        let first = q("A?");
        let id = first.id();
        sync.push_question(first);
        sync.push_question(q("B?"));

        assert!(sync.edit_text(id, "A2?").unwrap());
        assert_eq!(sync.flat(), ["A2?", "B?"]);
        assert_consistent(&sync);
    }

    #[test]
    fn text_edit_appends_when_old_text_shared() {
        let mut sync = CollectionSynchronizer::new();
        let first = q("A?");
        let id = first.id();
        sync.push_question(first);
        sync.push_question(q("A?"));

        sync.edit_text(id, "C?").unwrap();
        assert_eq!(sync.flat(), ["A?", "C?"]);
        assert_consistent(&sync);
    }

    #[test]
    fn blank_edit_is_rejected() {
        let mut sync = CollectionSynchronizer::new();
        let question = q("A?");
        let id = question.id();
        sync.push_question(question);
        assert!(sync.edit_text(id, "  ").is_err());
    }

    #[test]
    fn handlers_are_ignored_while_syncing() {
        let mut sync = CollectionSynchronizer::new();
        sync.syncing = true;
        sync.on_flat_added("A?");
        sync.on_rich_added(&q("B?"));
        sync.push_question(q("C?"));
        sync.syncing = false;
        assert!(sync.flat().is_empty());
        assert!(sync.rich().is_empty());
    }

    #[test]
    fn replace_all_rebuilds_flat_list() {
        let mut sync = CollectionSynchronizer::new();
        sync.push_flat("Old?");
        sync.replace_all(vec![q("New 1?"), q("New 2?")]);
        assert_eq!(sync.flat(), ["New 1?", "New 2?"]);
        sync.clear();
        assert!(sync.flat().is_empty());
        assert!(sync.rich().is_empty());
    }

    #[test]
    fn mutations_are_persisted() {
        let backing = InMemoryKeyValueStore::new();
        let store = SessionStore::new(
            Arc::new(backing.clone()),
            Some(RequirementId::new("REQ-9").unwrap()),
        );
        let mut sync = CollectionSynchronizer::with_store(store);
        sync.push_question(q("Persist me?"));
        assert_eq!(
            backing.get("requirements/REQ-9/questions").as_deref(),
            Some(r#"["Persist me?"]"#)
        );
        assert!(backing.get("requirements/REQ-9/question-records").is_some());
    }

    #[test]
    fn persistence_failure_becomes_warning() {
        let backing = InMemoryKeyValueStore::new();
        backing.set_fail_writes(true);
        let store = SessionStore::new(
            Arc::new(backing),
            Some(RequirementId::new("REQ-9").unwrap()),
        );
        let mut sync = CollectionSynchronizer::with_store(store);
        sync.push_question(q("Still in memory?"));

        assert_eq!(sync.rich().len(), 1);
        let warnings = sync.take_warnings();
        assert!(!warnings.is_empty());
        assert!(warnings[0].text.starts_with("Could not save questions"));
        assert!(sync.take_warnings().is_empty());
    }
}
