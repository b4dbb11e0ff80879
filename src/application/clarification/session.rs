//! Clarification session - all question, assumption and state bookkeeping for
//! one requirement.
//!
//! The session is plain synchronous state. It never awaits: operations that
//! need the text generator are split into `prepare_*` / `begin_*` (run before
//! the call) and `complete_*` (run with the result). The actor in
//! [`super::actor`] owns the session and sequences those steps.

use std::collections::{HashSet, VecDeque};

use crate::domain::clarification::{
    normalize, AssumptionCatalog, AssumptionPromoter, PromotionOutcome, Question,
    PreconditionError, RequirementContext, SessionState, SmartAction, StatusLevel, StatusMessage,
};
use crate::domain::foundation::{QuestionId, StateMachine, ValidationError};
use crate::ports::GenerationError;

use super::error::SessionError;
use super::orchestrator::{GenerationKind, GenerationOrchestrator, ReplacementOutcome};
use super::store::SessionStore;
use super::synchronizer::CollectionSynchronizer;

/// Engine behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Maximum questions requested per full batch.
    pub question_budget: u32,
    pub replacements_enabled: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            question_budget: 5,
            replacements_enabled: true,
        }
    }
}

pub struct ClarificationSession {
    requirement: RequirementContext,
    questions: CollectionSynchronizer,
    catalog: AssumptionCatalog,
    store: SessionStore,
    orchestrator: GenerationOrchestrator,
    settings: SessionSettings,
    state: SessionState,
    running: Option<GenerationKind>,
    batch_backup: Option<Vec<Question>>,
    /// Texts of the resolved questions awaiting a replacement.
    replacement_queue: VecDeque<String>,
    replacement_in_flight: bool,
    /// Questions that faded out after being answered or marked.
    resolved: Vec<Question>,
    status: Option<StatusMessage>,
    test_cases: Option<String>,
}

impl ClarificationSession {
    pub fn new(
        requirement: RequirementContext,
        orchestrator: GenerationOrchestrator,
        store: SessionStore,
        settings: SessionSettings,
    ) -> Self {
        Self {
            requirement,
            questions: CollectionSynchronizer::with_store(store.clone()),
            catalog: AssumptionCatalog::new(),
            store,
            orchestrator,
            settings,
            state: SessionState::Idle,
            running: None,
            batch_backup: None,
            replacement_queue: VecDeque::new(),
            replacement_in_flight: false,
            resolved: Vec::new(),
            status: None,
            test_cases: None,
        }
    }

    /// Loads the assumption catalog and any persisted questions.
    pub fn restore(&mut self) {
        match self.store.load_catalog() {
            Ok(catalog) => self.catalog = catalog,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load assumptions");
                self.set_status(StatusMessage::warning(format!(
                    "Could not load assumptions: {}",
                    err
                )));
            }
        }

        match self.store.load_questions() {
            Ok(Some(questions)) => {
                tracing::info!(count = questions.len(), "Restored questions");
                self.questions.replace_all(questions);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load questions");
                self.set_status(StatusMessage::warning(format!(
                    "Could not load questions: {}",
                    err
                )));
            }
        }
        self.finish_mutation();
    }

    // ----- Queries -----

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn requirement(&self) -> &RequirementContext {
        &self.requirement
    }

    pub fn questions(&self) -> &[Question] {
        self.questions.rich()
    }

    pub fn flat_questions(&self) -> &[String] {
        self.questions.flat()
    }

    pub fn catalog(&self) -> &AssumptionCatalog {
        &self.catalog
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn test_cases(&self) -> Option<&str> {
        self.test_cases.as_deref()
    }

    pub fn resolved(&self) -> &[Question] {
        &self.resolved
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn running_kind(&self) -> Option<GenerationKind> {
        self.running
    }

    pub fn pending_replacements(&self) -> usize {
        self.replacement_queue.len()
    }

    pub fn replacement_in_flight(&self) -> bool {
        self.replacement_in_flight
    }

    pub fn has_fading(&self) -> bool {
        self.questions.rich().iter().any(|q| q.fading_out)
    }

    /// No generator call in flight and no fade pending.
    pub fn is_quiescent(&self) -> bool {
        self.running.is_none() && !self.replacement_in_flight && !self.has_fading()
    }

    pub fn smart_action(&self) -> SmartAction {
        self.state.smart_action()
    }

    /// Every answered or assumed question, resolved history first.
    pub fn answered_context(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.resolved
            .iter()
            .chain(self.questions.rich())
            .filter_map(|q| {
                let line = q.context_line()?;
                seen.insert(normalize(&q.text)).then_some(line)
            })
            .collect()
    }

    // ----- State -----

    /// Explicitly assigns a state. This is the only way to reach
    /// `AwaitingAnswers`.
    pub fn assign_state(&mut self, target: SessionState) -> Result<(), ValidationError> {
        self.state = self.state.transition_to(target)?;
        Ok(())
    }

    pub fn set_status(&mut self, status: StatusMessage) {
        match status.level {
            StatusLevel::Error => {
                tracing::warn!(status = %status, "Session error")
            }
            _ => tracing::debug!(status = %status, "Session status"),
        }
        self.status = Some(status);
    }

    fn recompute(&mut self) {
        let mut next = SessionState::derive(self.questions.rich(), self.running.is_some());
        if next == SessionState::Displayed && self.state == SessionState::AwaitingAnswers {
            next = SessionState::AwaitingAnswers;
        }
        if next != self.state {
            tracing::debug!(from = %self.state, to = %next, "Session state changed");
            self.state = next;
        }
    }

    /// Surfaces persistence warnings and recomputes state.
    fn finish_mutation(&mut self) {
        if let Some(warning) = self.questions.take_warnings().pop() {
            self.set_status(warning);
        }
        self.recompute();
    }

    /// Validates the requirement, highlighting the missing field on failure.
    pub fn check_preconditions(&mut self) -> Result<(), SessionError> {
        let checked = self.requirement.validate().map(|_| ());
        checked.map_err(|err| self.precondition_failed(err))
    }

    // ----- Full batch -----

    /// Validates preconditions and builds the batch prompt. No state changes
    /// besides the status message on failure.
    pub fn prepare_batch(&mut self) -> Result<String, SessionError> {
        self.ensure_idle_runner()?;
        self.orchestrator
            .prepare_batch(&self.requirement, &self.catalog)
            .map_err(|err| self.precondition_failed(err))
    }

    /// Clears the question set and enters `Generating`.
    pub fn begin_batch(&mut self) {
        self.settle_fading();
        self.batch_backup = Some(self.questions.rich().to_vec());
        self.replacement_queue.clear();
        self.running = Some(GenerationKind::Batch);
        self.questions.clear();
        self.finish_mutation();
    }

    pub fn complete_batch(&mut self, result: Result<String, GenerationError>) {
        self.running = None;
        let backup = self.batch_backup.take();

        match result {
            Ok(raw) => {
                let outcome = self.orchestrator.apply_batch(&raw, &mut self.catalog);
                if outcome.merge.enabled > 0 {
                    self.persist_catalog();
                }
                tracing::info!(
                    loaded = outcome.questions.len(),
                    duplicates = outcome.duplicates_removed,
                    "Question batch loaded"
                );
                let status = outcome.status();
                self.questions.replace_all(outcome.questions);
                self.set_status(status);
            }
            Err(err) => {
                if let Some(backup) = backup {
                    self.questions.replace_all(backup);
                }
                if !err.is_cancelled() {
                    self.set_status(StatusMessage::error(format!(
                        "Question generation failed: {}",
                        err
                    )));
                }
            }
        }
        self.finish_mutation();
    }

    // ----- Replacements -----

    /// True if a queued replacement may be sent now.
    pub fn can_dispatch_replacement(&self) -> bool {
        self.settings.replacements_enabled
            && !self.replacement_queue.is_empty()
            && !self.replacement_in_flight
            && self.running.is_none()
    }

    /// Pops the next queued replacement and builds its prompt from the
    /// current answered context.
    pub fn next_replacement(&mut self) -> Option<Result<String, SessionError>> {
        if !self.can_dispatch_replacement() {
            return None;
        }
        let trigger = self.replacement_queue.pop_front()?;
        let prompt = self.orchestrator.prepare_replacement(
            &self.requirement,
            &self.catalog,
            self.answered_context(),
        );
        match prompt {
            Ok(prompt) => {
                tracing::debug!(trigger = %trigger, "Requesting replacement question");
                self.replacement_in_flight = true;
                Some(Ok(prompt))
            }
            Err(err) => Some(Err(self.precondition_failed(err))),
        }
    }

    pub fn complete_replacement(&mut self, result: Result<String, GenerationError>) {
        self.replacement_in_flight = false;
        match result {
            Ok(raw) => {
                let existing = self.questions.rich().to_vec();
                let outcome =
                    self.orchestrator
                        .apply_replacement(&raw, &mut self.catalog, &existing);
                self.persist_catalog();
                let status = outcome.status();
                if let ReplacementOutcome::Accepted(question) = outcome {
                    self.questions.push_question(question);
                }
                self.set_status(status);
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => self.set_status(StatusMessage::error(format!(
                "Follow-up question request failed: {}",
                err
            ))),
        }
        self.finish_mutation();
    }

    pub fn clear_replacement_queue(&mut self) -> usize {
        let dropped = self.replacement_queue.len();
        self.replacement_queue.clear();
        dropped
    }

    // ----- Test cases -----

    /// Submits resolved answers, then builds the test case prompt.
    pub fn prepare_test_cases(&mut self) -> Result<String, SessionError> {
        self.ensure_idle_runner()?;
        self.submit_answers();
        self.orchestrator
            .prepare_test_cases(&self.requirement, &self.catalog, self.answered_context())
            .map_err(|err| self.precondition_failed(err))
    }

    pub fn begin_test_cases(&mut self) {
        self.running = Some(GenerationKind::TestCases);
        self.recompute();
    }

    pub fn complete_test_cases(&mut self, result: Result<String, GenerationError>) {
        self.running = None;
        match result {
            Ok(text) => {
                self.test_cases = Some(text);
                self.set_status(StatusMessage::info("Test cases generated."));
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => self.set_status(StatusMessage::error(format!(
                "Test case generation failed: {}",
                err
            ))),
        }
        self.finish_mutation();
    }

    /// Drops in-flight bookkeeping when the owner goes away mid-call.
    pub fn abandon_in_flight(&mut self) {
        if self.running == Some(GenerationKind::Batch) {
            if let Some(backup) = self.batch_backup.take() {
                self.questions.replace_all(backup);
            }
        }
        self.running = None;
        self.replacement_in_flight = false;
        self.replacement_queue.clear();
        self.finish_mutation();
    }

    // ----- Question commands -----

    /// Records an answer. Returns the id to fade out if the answer resolves a
    /// non-optional question.
    pub fn answer(
        &mut self,
        id: QuestionId,
        answer: &str,
    ) -> Result<Option<QuestionId>, SessionError> {
        let question = self.active_question_mut(id)?;
        question.set_answer(answer);
        let fade = question.is_answered() && question.severity.is_blocking();
        if fade {
            question.fading_out = true;
        }
        self.questions.persist();
        self.finish_mutation();
        Ok(fade.then_some(id))
    }

    /// Marks a question as an assumption and promotes it immediately.
    pub fn mark_as_assumption(&mut self, id: QuestionId) -> Result<Option<QuestionId>, SessionError> {
        let question = self.active_question_mut(id)?;
        question.marked_as_assumption = true;
        let fade = question.severity.is_blocking();
        if fade {
            question.fading_out = true;
        }
        let promoted = question.clone();
        self.promote(&promoted);
        self.questions.persist();
        self.finish_mutation();
        Ok(fade.then_some(id))
    }

    /// Completes a fade: removes the question, keeps it as history, promotes
    /// it and queues a replacement. Returns false if the question is gone or
    /// no longer fading.
    pub fn finish_fade(&mut self, id: QuestionId) -> bool {
        let fading = self.questions.find(id).is_some_and(|q| q.fading_out);
        if !fading {
            return false;
        }
        let Some(question) = self.questions.remove_question(id) else {
            return false;
        };

        self.promote(&question);
        if self.settings.replacements_enabled {
            self.replacement_queue.push_back(question.text.clone());
        }
        self.resolved.push(question);
        self.finish_mutation();
        true
    }

    /// Resolves every fading question now, without queueing replacements.
    /// Runs before the question set is replaced so no answer is lost.
    fn settle_fading(&mut self) {
        let fading: Vec<QuestionId> = self
            .questions
            .rich()
            .iter()
            .filter(|q| q.fading_out)
            .map(Question::id)
            .collect();
        for id in fading {
            if let Some(question) = self.questions.remove_question(id) {
                self.promote(&question);
                self.resolved.push(question);
            }
        }
    }

    /// Promotes every resolved active question and marks it submitted.
    /// Returns how many were submitted.
    pub fn submit_answers(&mut self) -> usize {
        let ids: Vec<QuestionId> = self
            .questions
            .rich()
            .iter()
            .filter(|q| q.is_active() && q.is_resolved())
            .map(Question::id)
            .collect();

        for id in &ids {
            if let Some(question) = self.questions.find_mut(*id) {
                question.submitted = true;
                let promoted = question.clone();
                self.promote(&promoted);
            }
        }
        self.questions.persist();

        let blocking = self
            .questions
            .rich()
            .iter()
            .filter(|q| q.blocks_progress())
            .count();
        let status = match (ids.len(), blocking) {
            (submitted, 0) => StatusMessage::info(format!("Submitted {} answer(s).", submitted)),
            (0, blocking) => StatusMessage::warning(format!(
                "{} required question(s) still need answers.",
                blocking
            )),
            (submitted, blocking) => StatusMessage::info(format!(
                "Submitted {} answer(s). {} required question(s) still need answers.",
                submitted, blocking
            )),
        };
        self.set_status(status);
        self.finish_mutation();
        ids.len()
    }

    /// Sets a question aside without answering or promoting it.
    pub fn skip(&mut self, id: QuestionId) -> Result<(), SessionError> {
        let question = self.active_question_mut(id)?;
        question.submitted = true;
        self.questions.persist();
        self.set_status(StatusMessage::info("Question skipped."));
        self.finish_mutation();
        Ok(())
    }

    pub fn remove(&mut self, id: QuestionId) -> Result<Question, SessionError> {
        let removed = self
            .questions
            .remove_question(id)
            .ok_or(SessionError::QuestionNotFound(id))?;
        self.finish_mutation();
        Ok(removed)
    }

    pub fn edit_text(&mut self, id: QuestionId, text: &str) -> Result<(), SessionError> {
        if !self.questions.edit_text(id, text)? {
            return Err(SessionError::QuestionNotFound(id));
        }
        self.finish_mutation();
        Ok(())
    }

    /// Replaces the question set with questions parsed from pasted text.
    /// Leaves the set untouched if nothing parses.
    pub fn import_text(&mut self, raw: &str) -> Result<usize, SessionError> {
        self.ensure_idle_runner()?;
        let outcome = self.orchestrator.apply_import(raw, &mut self.catalog);
        if outcome.merge.enabled > 0 {
            self.persist_catalog();
        }
        let count = outcome.questions.len();
        if count == 0 {
            self.set_status(StatusMessage::info("No valid questions detected"));
        } else {
            let mut text = format!("Imported {} question(s).", count);
            if outcome.duplicates_removed > 0 {
                text.push_str(&format!(" {} duplicate(s) removed.", outcome.duplicates_removed));
            }
            self.settle_fading();
            self.replacement_queue.clear();
            self.questions.replace_all(outcome.questions);
            self.set_status(StatusMessage::info(text));
        }
        self.finish_mutation();
        Ok(count)
    }

    // ----- Assumption commands -----

    /// Disables every assumption. Returns how many were enabled.
    pub fn reset_assumptions(&mut self) -> usize {
        let disabled = AssumptionPromoter::reset_all(&mut self.catalog);
        self.persist_catalog();
        self.set_status(StatusMessage::info(format!(
            "Disabled {} assumption(s).",
            disabled
        )));
        self.finish_mutation();
        disabled
    }

    pub fn set_assumption_enabled(&mut self, key: &str, enabled: bool) -> Result<(), SessionError> {
        if !self.catalog.set_enabled(key, enabled) {
            return Err(SessionError::AssumptionNotFound(key.to_string()));
        }
        self.persist_catalog();
        self.finish_mutation();
        Ok(())
    }

    // ----- Helpers -----

    fn ensure_idle_runner(&self) -> Result<(), SessionError> {
        if self.running.is_some() {
            return Err(SessionError::ActionUnavailable(SessionState::Generating));
        }
        Ok(())
    }

    fn active_question_mut(&mut self, id: QuestionId) -> Result<&mut Question, SessionError> {
        let question = self
            .questions
            .find_mut(id)
            .ok_or(SessionError::QuestionNotFound(id))?;
        if !question.is_active() {
            return Err(SessionError::QuestionNotActive(id));
        }
        Ok(question)
    }

    fn precondition_failed(
        &mut self,
        err: PreconditionError,
    ) -> SessionError {
        self.set_status(StatusMessage::error(err.to_string()).for_field(err.field()));
        err.into()
    }

    fn promote(&mut self, question: &Question) {
        match AssumptionPromoter::promote(&mut self.catalog, question) {
            PromotionOutcome::Inserted(key) | PromotionOutcome::Reenabled(key) => {
                tracing::debug!(key = %key, "Promoted question to assumption");
                self.persist_catalog();
            }
            PromotionOutcome::AlreadyPresent(_) | PromotionOutcome::NotEligible => {}
        }
    }

    fn persist_catalog(&mut self) {
        if let Err(err) = self.store.save_catalog(&self.catalog) {
            tracing::warn!(error = %err, "Failed to persist assumptions");
            self.set_status(StatusMessage::warning(format!(
                "Could not save assumptions: {}",
                err
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockTextGenerator;
    use crate::adapters::storage::InMemoryKeyValueStore;
    use crate::domain::clarification::{AssumptionItem, Severity};
    use crate::domain::foundation::RequirementId;
    use std::sync::Arc;

    fn session_with(backing: InMemoryKeyValueStore, settings: SessionSettings) -> ClarificationSession {
        let requirement =
            RequirementContext::new("The system shall log all failed logins", "Inspection")
                .with_id(RequirementId::new("REQ-1").unwrap());
        let store = SessionStore::new(Arc::new(backing), requirement.id.clone());
        let orchestrator = GenerationOrchestrator::new(Arc::new(MockTextGenerator::new()), 3);
        ClarificationSession::new(requirement, orchestrator, store, settings)
    }

    fn session() -> ClarificationSession {
        session_with(InMemoryKeyValueStore::new(), SessionSettings::default())
    }

    fn loaded(session: &mut ClarificationSession, raw: &str) {
        session.prepare_batch().unwrap();
        session.begin_batch();
        session.complete_batch(Ok(raw.to_string()));
    }

    fn id_of(session: &ClarificationSession, text: &str) -> QuestionId {
        session
            .questions()
            .iter()
            .find(|q| q.text == text)
            .map(Question::id)
            .unwrap()
    }

    const TWO_BLOCKING: &str = r#"{"questions": [
        {"text": "Which events count as failed?", "severity": "HIGH"},
        {"text": "Where are logs stored?", "severity": "MEDIUM"}]}"#;

    #[test]
    fn batch_enters_generating_then_displayed() {
        let mut s = session();
        s.prepare_batch().unwrap();
        s.begin_batch();
        assert_eq!(s.state(), SessionState::Generating);
        assert!(s.questions().is_empty());

        s.complete_batch(Ok(TWO_BLOCKING.to_string()));
        assert_eq!(s.state(), SessionState::Displayed);
        assert_eq!(s.questions().len(), 2);
        assert!(!s.is_running());
    }

    #[test]
    fn precondition_failure_sets_field_status_without_state_change() {
        let store = SessionStore::new(Arc::new(InMemoryKeyValueStore::new()), None);
        let orchestrator = GenerationOrchestrator::new(Arc::new(MockTextGenerator::new()), 3);
        let mut s = ClarificationSession::new(
            RequirementContext::new("", "Test"),
            orchestrator,
            store,
            SessionSettings::default(),
        );

        let err = s.prepare_batch().unwrap_err();
        assert!(matches!(err, SessionError::Precondition(_)));
        let status = s.status().unwrap();
        assert_eq!(status.level, StatusLevel::Error);
        assert_eq!(status.field.as_deref(), Some("description"));
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn failed_batch_restores_previous_questions() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        s.prepare_batch().unwrap();
        s.begin_batch();
        s.complete_batch(Err(GenerationError::unavailable("down")));

        assert_eq!(s.questions().len(), 2);
        assert_eq!(s.state(), SessionState::Displayed);
        assert!(s.status().unwrap().text.contains("Question generation failed"));
    }

    #[test]
    fn cancelled_batch_keeps_status() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        let before = s.status().cloned();
        s.begin_batch();
        s.complete_batch(Err(GenerationError::Cancelled));
        assert_eq!(s.status().cloned(), before);
        assert!(!s.is_running());
    }

    #[test]
    fn answering_blocking_question_fades_and_queues_replacement() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        let id = id_of(&s, "Which events count as failed?");

        let fade = s.answer(id, "Bad password and unknown user").unwrap();
        assert_eq!(fade, Some(id));
        assert!(s.has_fading());
        assert!(!s.is_quiescent());

        assert!(s.finish_fade(id));
        assert_eq!(s.questions().len(), 1);
        assert_eq!(s.pending_replacements(), 1);
        assert_eq!(s.resolved().len(), 1);
        assert!(s
            .catalog()
            .items()
            .iter()
            .any(|a| a.content_line == "Q: Which events count as failed? | A: Bad password and unknown user"));
    }

    #[test]
    fn optional_question_never_fades() {
        let mut s = session();
        loaded(&mut s, r#"["Any preferred log format?"]"#);
        let id = id_of(&s, "Any preferred log format?");
        assert_eq!(s.answer(id, "JSON").unwrap(), None);
        assert!(!s.has_fading());
        assert_eq!(s.pending_replacements(), 0);
        assert_eq!(s.state(), SessionState::ReadyToGenerate);
    }

    #[test]
    fn mark_as_assumption_promotes_immediately() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        let id = id_of(&s, "Where are logs stored?");
        assert_eq!(s.mark_as_assumption(id).unwrap(), Some(id));
        assert!(s.catalog().contains("where-are-logs-stored", ""));
    }

    #[test]
    fn answering_inactive_question_is_rejected() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        let id = id_of(&s, "Where are logs stored?");
        s.skip(id).unwrap();
        assert_eq!(s.answer(id, "x"), Err(SessionError::QuestionNotActive(id)));
    }

    #[test]
    fn replacement_context_built_at_dispatch_time() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        let first = id_of(&s, "Which events count as failed?");
        let second = id_of(&s, "Where are logs stored?");
        s.answer(first, "Bad password").unwrap();
        s.answer(second, "Syslog").unwrap();
        s.finish_fade(first);
        s.finish_fade(second);
        assert_eq!(s.pending_replacements(), 2);

        let prompt = s.next_replacement().unwrap().unwrap();
        assert!(prompt.contains("Q: Which events count as failed? | A: Bad password"));
        assert!(prompt.contains("Q: Where are logs stored? | A: Syslog"));
        assert!(s.replacement_in_flight());
        assert!(s.next_replacement().is_none());
    }

    #[test]
    fn replacement_duplicate_of_assumption_is_dropped_with_status() {
        let backing = InMemoryKeyValueStore::new();
        let mut s = session_with(backing, SessionSettings::default());
        s.catalog
            .insert(AssumptionItem::new("is-x-true", "X", "Q: Is X true? | A: Yes").unwrap());
        loaded(&mut s, r#"[{"text": "Which events?", "severity": "HIGH"}]"#);
        let id = id_of(&s, "Which events?");
        s.answer(id, "All").unwrap();
        s.finish_fade(id);
        s.next_replacement().unwrap().unwrap();

        s.complete_replacement(Ok(r#"["is x true?"]"#.to_string()));
        assert!(s.questions().is_empty());
        assert!(s.status().unwrap().text.contains("Skipped duplicate"));
        assert!(!s.replacement_in_flight());
    }

    #[test]
    fn accepted_replacement_is_appended() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        let id = id_of(&s, "Which events count as failed?");
        s.answer(id, "All").unwrap();
        s.finish_fade(id);
        s.next_replacement().unwrap().unwrap();
        s.complete_replacement(Ok(
            r#"[{"text": "How long are logs kept?", "severity": "HIGH"}]"#.to_string(),
        ));
        assert_eq!(s.questions().len(), 2);
        assert_eq!(s.flat_questions().len(), 2);
    }

    #[test]
    fn replacements_disabled_never_queue() {
        let mut s = session_with(
            InMemoryKeyValueStore::new(),
            SessionSettings {
                replacements_enabled: false,
                ..SessionSettings::default()
            },
        );
        loaded(&mut s, TWO_BLOCKING);
        let id = id_of(&s, "Where are logs stored?");
        s.answer(id, "Syslog").unwrap();
        s.finish_fade(id);
        assert_eq!(s.pending_replacements(), 0);
    }

    #[test]
    fn submit_promotes_and_reports_remaining_blockers() {
        let mut s = session();
        loaded(
            &mut s,
            r#"[{"text": "Which events?", "severity": "HIGH"}, "Any format preference?"]"#,
        );
        let optional = id_of(&s, "Any format preference?");
        s.answer(optional, "JSON").unwrap();

        assert_eq!(s.submit_answers(), 1);
        assert_eq!(
            s.status().unwrap().text,
            "Submitted 1 answer(s). 1 required question(s) still need answers."
        );
        assert_eq!(s.state(), SessionState::Displayed);
        assert_eq!(s.catalog().len(), 1);
    }

    #[test]
    fn skipping_last_blocker_makes_session_ready() {
        let mut s = session();
        loaded(&mut s, r#"[{"text": "Which events?", "severity": "HIGH"}]"#);
        let id = id_of(&s, "Which events?");
        s.skip(id).unwrap();
        assert_eq!(s.state(), SessionState::ReadyToGenerate);
        assert!(s.catalog().is_empty());
    }

    #[test]
    fn test_case_generation_submits_first() {
        let mut s = session();
        loaded(&mut s, r#"["Any format preference?"]"#);
        let id = id_of(&s, "Any format preference?");
        s.answer(id, "JSON").unwrap();

        let prompt = s.prepare_test_cases().unwrap();
        assert!(prompt.contains("Q: Any format preference? | A: JSON"));
        s.begin_test_cases();
        assert_eq!(s.state(), SessionState::Generating);
        s.complete_test_cases(Ok("TC-1".to_string()));
        assert_eq!(s.test_cases(), Some("TC-1"));
        assert_eq!(s.state(), SessionState::ReadyToGenerate);
    }

    #[test]
    fn awaiting_answers_only_by_assignment_and_survives_recompute() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        s.assign_state(SessionState::AwaitingAnswers).unwrap();
        let id = id_of(&s, "Where are logs stored?");
        s.edit_text(id, "Where exactly are logs stored?").unwrap();
        assert_eq!(s.state(), SessionState::AwaitingAnswers);
    }

    #[test]
    fn import_replaces_questions() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        let count = s.import_text("1. [HIGH] Pasted one?\n2. Pasted two?").unwrap();
        assert_eq!(count, 2);
        assert_eq!(s.questions()[0].severity, Severity::High);
        assert_eq!(s.status().unwrap().text, "Imported 2 question(s).");
    }

    #[test]
    fn import_of_garbage_keeps_questions() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        assert_eq!(s.import_text("no questions here").unwrap(), 0);
        assert_eq!(s.questions().len(), 2);
    }

    #[test]
    fn reset_and_toggle_assumptions() {
        let mut s = session();
        s.catalog
            .insert(AssumptionItem::new("utc", "UTC", "Assumption: UTC").unwrap());
        assert_eq!(s.reset_assumptions(), 1);
        assert_eq!(s.catalog().enabled().count(), 0);
        s.set_assumption_enabled("UTC", true).unwrap();
        assert_eq!(s.catalog().enabled().count(), 1);
        assert_eq!(
            s.set_assumption_enabled("missing", true),
            Err(SessionError::AssumptionNotFound("missing".to_string()))
        );
    }

    #[test]
    fn persistence_failure_surfaces_as_warning() {
        let backing = InMemoryKeyValueStore::new();
        backing.set_fail_writes(true);
        let mut s = session_with(backing, SessionSettings::default());
        loaded(&mut s, TWO_BLOCKING);
        assert_eq!(s.questions().len(), 2);
        assert_eq!(s.status().unwrap().level, StatusLevel::Warning);
    }

    #[test]
    fn restore_loads_questions_and_catalog() {
        let backing = InMemoryKeyValueStore::new();
        {
            let mut s = session_with(backing.clone(), SessionSettings::default());
            loaded(&mut s, TWO_BLOCKING);
            let id = id_of(&s, "Where are logs stored?");
            s.mark_as_assumption(id).unwrap();
        }

        let mut s = session_with(backing, SessionSettings::default());
        s.restore();
        assert_eq!(s.questions().len(), 2);
        assert_eq!(s.catalog().len(), 1);
        assert_eq!(s.state(), SessionState::Displayed);
    }

    #[test]
    fn new_batch_during_fade_still_promotes_the_answer() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        let id = id_of(&s, "Which events count as failed?");
        s.answer(id, "Bad password").unwrap();

        loaded(&mut s, TWO_BLOCKING);
        assert!(!s.finish_fade(id));
        assert_eq!(s.catalog().len(), 1);
        assert_eq!(s.resolved().len(), 1);
        assert_eq!(s.pending_replacements(), 0);
        assert!(s
            .answered_context()
            .iter()
            .any(|line| line.starts_with("Q: Which events count as failed?")));
    }

    #[test]
    fn import_during_fade_still_promotes_the_answer() {
        let mut s = session();
        loaded(&mut s, TWO_BLOCKING);
        let id = id_of(&s, "Where are logs stored?");
        s.answer(id, "Central syslog").unwrap();

        assert_eq!(s.import_text("1. Is the clock synchronized?").unwrap(), 1);
        assert_eq!(s.catalog().len(), 1);
        assert_eq!(s.resolved().len(), 1);
        assert!(!s.has_fading());
    }
}
