//! Session state machine for the clarifying-question loop.
//!
//! The state is derived, never stored independently of its inputs: it is a
//! pure function of the current question list plus the running-operation
//! flag. The single "smart button" reads its label and action from the state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

use super::question::Question;

pub const LABEL_ASK: &str = "Ask Clarifying Questions";
pub const LABEL_SUBMIT: &str = "Submit Answers";
pub const LABEL_GENERATE: &str = "Generate Test Cases";
pub const LABEL_WORKING: &str = "Working…";

/// Phase of a clarification session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No active questions and nothing submitted yet.
    #[default]
    Idle,
    /// At least one active, blocking, unanswered question.
    Displayed,
    /// Equivalent to `Displayed`; only reachable by explicit assignment.
    AwaitingAnswers,
    /// Nothing blocking remains.
    ReadyToGenerate,
    /// An asynchronous generation or submission is in flight.
    Generating,
}

/// What the smart button does in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartAction {
    RequestBatch,
    SubmitAnswers,
    GenerateTestCases,
    NoOp,
}

/// Label and enablement of the smart button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionAvailability {
    pub label: &'static str,
    pub enabled: bool,
}

impl SessionState {
    /// Classifies a question list. Only active questions are inspected for
    /// blocking; submitted questions only distinguish "finished" from "fresh".
    pub fn recompute(questions: &[Question]) -> Self {
        let mut active = questions.iter().filter(|q| q.is_active()).peekable();

        if active.peek().is_none() {
            return if questions.iter().any(|q| q.submitted) {
                SessionState::ReadyToGenerate
            } else {
                SessionState::Idle
            };
        }

        if active.any(|q| q.blocks_progress()) {
            SessionState::Displayed
        } else {
            SessionState::ReadyToGenerate
        }
    }

    /// Recompute, with an in-flight operation taking precedence.
    pub fn derive(questions: &[Question], running: bool) -> Self {
        if running {
            SessionState::Generating
        } else {
            Self::recompute(questions)
        }
    }

    pub fn action_label(&self) -> &'static str {
        match self {
            SessionState::Idle => LABEL_ASK,
            SessionState::Displayed | SessionState::AwaitingAnswers => LABEL_SUBMIT,
            SessionState::ReadyToGenerate => LABEL_GENERATE,
            SessionState::Generating => LABEL_WORKING,
        }
    }

    pub fn smart_action(&self) -> SmartAction {
        match self {
            SessionState::Idle => SmartAction::RequestBatch,
            SessionState::Displayed | SessionState::AwaitingAnswers => SmartAction::SubmitAnswers,
            SessionState::ReadyToGenerate => SmartAction::GenerateTestCases,
            SessionState::Generating => SmartAction::NoOp,
        }
    }

    /// True if the smart action in this state calls the generation service.
    pub fn action_needs_llm(&self) -> bool {
        matches!(
            self.smart_action(),
            SmartAction::RequestBatch | SmartAction::GenerateTestCases
        )
    }

    /// Computes button label and enablement.
    ///
    /// Disabled while generating, while the shared busy flag is set, and for
    /// LLM-backed actions while the service is unreachable.
    pub fn availability(&self, llm_busy: bool, llm_reachable: bool) -> ActionAvailability {
        let enabled = *self != SessionState::Generating
            && !llm_busy
            && (llm_reachable || !self.action_needs_llm());
        ActionAvailability {
            label: self.action_label(),
            enabled,
        }
    }
}

impl StateMachine for SessionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionState::*;
        match (self, target) {
            (Generating, Generating) => false,
            (Idle, AwaitingAnswers) => false,
            _ => self != target,
        }
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionState::*;
        [Idle, Displayed, AwaitingAnswers, ReadyToGenerate, Generating]
            .into_iter()
            .filter(|target| self.can_transition_to(target))
            .collect()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "Idle",
            SessionState::Displayed => "Displayed",
            SessionState::AwaitingAnswers => "AwaitingAnswers",
            SessionState::ReadyToGenerate => "ReadyToGenerate",
            SessionState::Generating => "Generating",
        };
        write!(f, "{}", s)
    }
}
