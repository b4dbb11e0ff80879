//! Integration tests for the clarification session engine.
//!
//! Drives sessions through the public `SessionHandle` API with the mock text
//! generator, the in-memory store and a watch-backed connectivity monitor.

use std::sync::Arc;
use std::time::Duration;

use requirement_clarifier::adapters::{
    FileKeyValueStore, InMemoryKeyValueStore, MockTextGenerator, WatchConnectivity,
};
use requirement_clarifier::application::{
    ActionDispatch, LlmBusyFlag, PacingPolicy, SessionDeps, SessionError, SessionHandle,
    SessionSettings, SessionSnapshot,
};
use requirement_clarifier::domain::clarification::{
    PreconditionError, RequirementContext, SessionState, StatusLevel, VerificationMethod,
};
use requirement_clarifier::domain::foundation::{QuestionId, RequirementId};
use requirement_clarifier::ports::{GenerationError, KeyValueStore, ASSUMPTIONS_KEY};

// =============================================================================
// Test Infrastructure
// =============================================================================

const DESCRIPTION: &str = "The system shall log all failed logins";

struct Harness {
    generator: MockTextGenerator,
    busy: LlmBusyFlag,
    connectivity: WatchConnectivity,
    store: Arc<dyn KeyValueStore>,
}

impl Harness {
    fn new(generator: MockTextGenerator) -> Self {
        Self::with_store(generator, Arc::new(InMemoryKeyValueStore::new()))
    }

    fn with_store(generator: MockTextGenerator, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            generator,
            busy: LlmBusyFlag::new(),
            connectivity: WatchConnectivity::new(true),
            store,
        }
    }

    fn deps(&self, question_budget: u32) -> SessionDeps {
        SessionDeps {
            generator: Arc::new(self.generator.clone()),
            store: Arc::clone(&self.store),
            connectivity: Arc::new(self.connectivity.clone()),
            busy: self.busy.clone(),
            pacing: PacingPolicy::immediate(),
            settings: SessionSettings {
                question_budget,
                replacements_enabled: true,
            },
        }
    }

    fn spawn(&self, requirement: RequirementContext, question_budget: u32) -> SessionHandle {
        SessionHandle::spawn(requirement, self.deps(question_budget))
    }
}

fn requirement() -> RequirementContext {
    RequirementContext::new(DESCRIPTION, "Inspection").with_id(RequirementId::new("REQ-42").unwrap())
}

fn id_of(snapshot: &SessionSnapshot, text: &str) -> QuestionId {
    snapshot
        .questions
        .iter()
        .find(|q| q.text == text)
        .map(|q| q.id())
        .unwrap_or_else(|| panic!("question {:?} not in snapshot", text))
}

fn status_text(snapshot: &SessionSnapshot) -> &str {
    snapshot.status.as_ref().map(|s| s.text.as_str()).unwrap_or_default()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn batch_with_duplicates_ends_displayed_with_deduplicated_questions() {
    let raw = r#"{"questions": [
        {"text": "Which events count as a failed login?", "severity": "HIGH"},
        {"text": "which events count as a FAILED login?", "severity": "HIGH"},
        {"text": "Where are the logs stored?", "severity": "MEDIUM"},
        {"text": "Where are the  logs stored?", "severity": "LOW"}
    ]}"#;
    let harness = Harness::new(
        MockTextGenerator::new()
            .with_response(raw)
            .with_delay(Duration::from_millis(200)),
    );
    let session = harness.spawn(requirement(), 3);

    assert_eq!(session.snapshot().state, SessionState::Idle);
    assert_eq!(
        session.trigger_action().await.unwrap(),
        ActionDispatch::RequestedBatch
    );
    assert_eq!(session.snapshot().state, SessionState::Generating);
    assert_eq!(session.snapshot().action_label, "Working…");

    let snapshot = session.wait_until_settled().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Displayed);
    assert_eq!(snapshot.active_questions().count(), 2);
    assert_eq!(status_text(&snapshot), "Loaded 2 question(s). 2 duplicate(s) removed.");

    let prompts = harness.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(DESCRIPTION));
    assert!(prompts[0].contains("at most 3"));
    assert!(prompts[0].contains(VerificationMethod::Inspection.category_assumption().unwrap()));
}

#[tokio::test]
async fn failed_generation_clears_busy_and_reports_error() {
    let harness = Harness::new(
        MockTextGenerator::new().with_error(GenerationError::unavailable("model overloaded")),
    );
    let session = harness.spawn(requirement(), 3);

    session.ask_questions().await.unwrap();
    let snapshot = session.wait_until_settled().await.unwrap();

    assert!(!harness.busy.is_busy());
    assert!(!snapshot.busy);
    assert_eq!(snapshot.state, SessionState::Idle);
    let status = snapshot.status.unwrap();
    assert_eq!(status.level, StatusLevel::Error);
    assert!(status.text.contains("model overloaded"));
}

#[tokio::test]
async fn missing_description_is_rejected_before_any_call() {
    let harness = Harness::new(MockTextGenerator::new());
    let session = harness.spawn(RequirementContext::new("   ", "Test"), 3);

    let err = session.trigger_action().await.unwrap_err();
    assert_eq!(err, SessionError::Precondition(PreconditionError::MissingDescription));

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert_eq!(
        snapshot.status.and_then(|s| s.field).as_deref(),
        Some("description")
    );
    assert_eq!(harness.generator.call_count(), 0);
    assert!(!harness.busy.is_busy());
}

#[tokio::test]
async fn missing_method_highlights_method_field() {
    let harness = Harness::new(MockTextGenerator::new());
    let session = harness.spawn(RequirementContext::new(DESCRIPTION, ""), 3);

    assert_eq!(
        session.ask_questions().await,
        Err(SessionError::Precondition(PreconditionError::MissingVerificationMethod))
    );
    assert_eq!(
        session.snapshot().status.and_then(|s| s.field).as_deref(),
        Some("verification_method")
    );
}

#[tokio::test]
async fn replacement_matching_enabled_assumption_is_dropped() {
    let store = InMemoryKeyValueStore::new().with_value(
        ASSUMPTIONS_KEY,
        r#"[{"key": "log-retention", "name": "Log retention",
             "contentLine": "Q: How long are logs retained? | A: 90 days", "isEnabled": true}]"#,
    );
    let harness = Harness::with_store(
        MockTextGenerator::new()
            .with_response(r#"[{"text": "Which events count as failed?", "severity": "HIGH"}]"#)
            .with_response(r#"["how long are LOGS retained?"]"#),
        Arc::new(store),
    );
    let session = harness.spawn(requirement(), 3);

    session.ask_questions().await.unwrap();
    let snapshot = session.wait_until_settled().await.unwrap();
    let id = id_of(&snapshot, "Which events count as failed?");

    session.answer(id, "Bad password and locked account").await.unwrap();
    let snapshot = session.wait_until_settled().await.unwrap();

    assert_eq!(harness.generator.call_count(), 2);
    assert!(snapshot.questions.is_empty());
    assert!(status_text(&snapshot).starts_with("Skipped duplicate follow-up question"));
    assert_eq!(snapshot.assumptions.len(), 2);
}

#[tokio::test]
async fn replacement_prompt_carries_answered_context() {
    let harness = Harness::new(
        MockTextGenerator::new()
            .with_response(
                r#"[{"text": "Which events count as failed?", "severity": "HIGH"},
                    {"text": "Where are logs stored?", "severity": "HIGH"}]"#,
            )
            .with_response(r#"[{"text": "Who reviews the logs?", "severity": "MEDIUM"}]"#),
    );
    let session = harness.spawn(requirement(), 3);
    session.ask_questions().await.unwrap();
    let snapshot = session.wait_until_settled().await.unwrap();

    session
        .mark_as_assumption(id_of(&snapshot, "Where are logs stored?"))
        .await
        .unwrap();
    let snapshot = session.wait_until_settled().await.unwrap();

    let prompt = harness.generator.last_prompt().unwrap();
    assert!(prompt.contains("Assumption: Where are logs stored?"));
    assert!(prompt.ends_with("Return exactly one question."));
    let texts: Vec<_> = snapshot.questions.iter().map(|q| q.text.as_str()).collect();
    assert_eq!(texts, vec!["Which events count as failed?", "Who reviews the logs?"]);
}

#[tokio::test]
async fn optional_questions_never_request_replacements() {
    let harness = Harness::new(MockTextGenerator::new());
    let session = harness.spawn(requirement(), 3);
    session.import_text("- Any preferred log format?").await.unwrap();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::ReadyToGenerate);

    session
        .answer(id_of(&snapshot, "Any preferred log format?"), "JSON lines")
        .await
        .unwrap();
    let snapshot = session.wait_until_settled().await.unwrap();
    assert_eq!(snapshot.questions.len(), 1);
    assert_eq!(harness.generator.call_count(), 0);
}

#[tokio::test]
async fn ready_state_submits_then_generates_test_cases() {
    let harness = Harness::new(MockTextGenerator::new().with_response("TC-01: inspect the audit log"));
    let session = harness.spawn(requirement(), 3);
    session.import_text("- Any preferred log format?").await.unwrap();
    let id = id_of(&session.snapshot(), "Any preferred log format?");
    session.answer(id, "JSON lines").await.unwrap();

    assert_eq!(
        session.trigger_action().await.unwrap(),
        ActionDispatch::GeneratingTestCases
    );
    let snapshot = session.wait_until_settled().await.unwrap();

    assert_eq!(snapshot.test_cases.as_deref(), Some("TC-01: inspect the audit log"));
    assert_eq!(snapshot.state, SessionState::ReadyToGenerate);
    assert_eq!(snapshot.assumptions.len(), 1);
    let prompt = harness.generator.last_prompt().unwrap();
    assert!(prompt.contains("Q: Any preferred log format? | A: JSON lines"));
    assert!(prompt.contains("verifiable by inspection"));
}

#[tokio::test]
async fn suggested_assumptions_are_enabled_from_batch() {
    let store = InMemoryKeyValueStore::new().with_value(
        ASSUMPTIONS_KEY,
        r#"[{"key": "utc-times", "name": "UTC", "contentLine": "Assumption: all times are UTC",
             "isEnabled": false}]"#,
    );
    let harness = Harness::with_store(
        MockTextGenerator::new().with_response(
            r#"{"suggestedAssumptions": ["UTC-TIMES", "unknown-key"],
                "questions": [{"text": "Which events?", "severity": "HIGH"}]}"#,
        ),
        Arc::new(store),
    );
    let session = harness.spawn(requirement(), 3);

    assert!(session.snapshot().assumptions.iter().all(|a| !a.is_enabled));
    assert!(harness.generator.prompts().is_empty());
    session.ask_questions().await.unwrap();
    let snapshot = session.wait_until_settled().await.unwrap();

    assert!(harness.generator.prompts()[0].contains("may suggest enabling: utc-times"));
    let utc = &snapshot.assumptions[0];
    assert!(utc.is_enabled);
    assert!(utc.is_llm_suggested);
}

#[tokio::test]
async fn shared_busy_flag_serialises_sessions() {
    let harness = Harness::new(
        MockTextGenerator::new()
            .with_response(r#"["First?"]"#)
            .with_delay(Duration::from_millis(200)),
    );
    let first = harness.spawn(requirement(), 3);
    let second = harness.spawn(
        RequirementContext::new("The system shall lock accounts", "Test"),
        3,
    );

    first.ask_questions().await.unwrap();
    assert_eq!(second.ask_questions().await, Err(SessionError::Busy));
    assert!(second.snapshot().status.unwrap().text.contains("in progress"));

    first.wait_until_settled().await.unwrap();
    assert!(!harness.busy.is_busy());
    assert!(second.ask_questions().await.is_ok());
}

#[tokio::test]
async fn submit_action_waits_for_sibling_busy_flag() {
    let harness = Harness::new(MockTextGenerator::new().with_response(r#"["Any format?"]"#));
    let session = harness.spawn(requirement(), 3);
    session.ask_questions().await.unwrap();
    let snapshot = session.wait_until_settled().await.unwrap();
    session
        .answer(id_of(&snapshot, "Any format?"), "Plain text")
        .await
        .unwrap();

    let sibling = harness.busy.try_acquire().unwrap();
    assert_eq!(session.trigger_action().await, Err(SessionError::Busy));
    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Displayed);
    assert!(!snapshot.action_enabled);
    assert!(snapshot.questions.iter().all(|q| !q.submitted));

    drop(sibling);
    assert_eq!(
        session.trigger_action().await.unwrap(),
        ActionDispatch::Submitted(1)
    );
}

#[tokio::test]
async fn connectivity_toggles_action_availability() {
    let harness = Harness::new(MockTextGenerator::new());
    let session = harness.spawn(requirement(), 3);
    let mut updates = session.subscribe();

    harness.connectivity.set_reachable(false);
    let snapshot = updates.wait_for(|s| !s.reachable).await.unwrap().clone();
    assert!(!snapshot.action_enabled);

    harness.connectivity.set_reachable(true);
    let snapshot = updates.wait_for(|s| s.reachable).await.unwrap().clone();
    assert!(snapshot.action_enabled);
}

#[tokio::test]
async fn questions_survive_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let generator = MockTextGenerator::new()
        .with_response(r#"[{"text": "Which events?", "severity": "CRITICAL"}, "Any format?"]"#);

    {
        let harness =
            Harness::with_store(generator.clone(), Arc::new(FileKeyValueStore::new(dir.path())));
        let session = harness.spawn(requirement(), 3);
        session.ask_questions().await.unwrap();
        let snapshot = session.wait_until_settled().await.unwrap();
        session
            .answer(id_of(&snapshot, "Any format?"), "JSON")
            .await
            .unwrap();
        session.shutdown().await;
    }

    let harness = Harness::with_store(generator, Arc::new(FileKeyValueStore::new(dir.path())));
    let session = harness.spawn(requirement(), 3);
    let snapshot = session.snapshot();

    assert_eq!(snapshot.state, SessionState::Displayed);
    assert_eq!(snapshot.questions.len(), 2);
    assert_eq!(snapshot.flat, vec!["Which events?", "Any format?"]);
    let optional = &snapshot.questions[1];
    assert_eq!(optional.answer.as_deref(), Some("JSON"));
}

#[tokio::test]
async fn reset_disables_every_assumption() {
    let harness = Harness::new(MockTextGenerator::new());
    let session = harness.spawn(requirement(), 3);
    session
        .import_text("1. [HIGH] Which events?\n2. [LOW] Which format?")
        .await
        .unwrap();
    let snapshot = session.snapshot();
    for text in ["Which events?", "Which format?"] {
        session.mark_as_assumption(id_of(&snapshot, text)).await.unwrap();
    }
    session.wait_until_settled().await.unwrap();

    assert_eq!(session.reset_assumptions().await.unwrap(), 2);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.assumptions.len(), 2);
    assert!(snapshot.assumptions.iter().all(|a| !a.is_enabled));

    session.set_assumption_enabled("which-events", true).await.unwrap();
    assert!(session.snapshot().assumptions[0].is_enabled);
}
