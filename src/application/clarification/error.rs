//! Errors returned by session commands.

use thiserror::Error;

use crate::domain::clarification::{PreconditionError, SessionState};
use crate::domain::foundation::{DomainError, ErrorCode, QuestionId, ValidationError};

/// A session command could not be carried out.
///
/// Every error is also reflected in the session's status message; callers
/// may ignore the returned value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Question not found: {0}")]
    QuestionNotFound(QuestionId),

    #[error("Question {0} is no longer active")]
    QuestionNotActive(QuestionId),

    #[error("Assumption not found: {0}")]
    AssumptionNotFound(String),

    #[error("The text generation service is unreachable")]
    Unreachable,

    #[error("Another generation request is in progress")]
    Busy,

    #[error("Action is not available while {0}")]
    ActionUnavailable(SessionState),

    #[error("Session has shut down")]
    Closed,
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::Precondition(_) => ErrorCode::ValidationFailed,
            SessionError::Validation(ValidationError::EmptyField { .. }) => ErrorCode::EmptyField,
            SessionError::Validation(ValidationError::OutOfRange { .. }) => ErrorCode::OutOfRange,
            SessionError::Validation(ValidationError::InvalidFormat { .. }) => {
                ErrorCode::InvalidFormat
            }
            SessionError::QuestionNotFound(_) => ErrorCode::QuestionNotFound,
            SessionError::QuestionNotActive(_) => ErrorCode::InvalidStateTransition,
            SessionError::AssumptionNotFound(_) => ErrorCode::AssumptionNotFound,
            SessionError::Unreachable => ErrorCode::LlmUnreachable,
            SessionError::Busy => ErrorCode::LlmBusy,
            SessionError::ActionUnavailable(_) => ErrorCode::ActionUnavailable,
            SessionError::Closed => ErrorCode::InternalError,
        }
    }
}

impl From<SessionError> for DomainError {
    fn from(err: SessionError) -> Self {
        let domain = DomainError::new(err.code(), err.to_string());
        match &err {
            SessionError::Precondition(precondition) => {
                domain.with_detail("field", precondition.field())
            }
            _ => domain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_maps_to_validation_with_field() {
        let domain: DomainError =
            SessionError::from(PreconditionError::MissingDescription).into();
        assert_eq!(domain.code, ErrorCode::ValidationFailed);
        assert_eq!(domain.details.get("field").map(String::as_str), Some("description"));
    }

    #[test]
    fn busy_and_unreachable_have_distinct_codes() {
        assert_eq!(SessionError::Busy.code(), ErrorCode::LlmBusy);
        assert_eq!(SessionError::Unreachable.code(), ErrorCode::LlmUnreachable);
    }
}
