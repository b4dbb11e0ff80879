//! Application layer - wires ports to the clarification domain.

pub mod clarification;

pub use clarification::{
    ActionDispatch, ClarificationSession, LlmBusyFlag, PacingPolicy, SessionDeps, SessionError,
    SessionHandle, SessionSettings, SessionSnapshot,
};
