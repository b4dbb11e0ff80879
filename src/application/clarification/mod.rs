//! Clarification session engine.
//!
//! - [`ClarificationSession`] holds the synchronous rules.
//! - [`SessionHandle`] runs a session on its own task and is the public entry
//!   point for frontends.

mod actor;
mod busy;
mod error;
mod orchestrator;
mod session;
mod store;
mod synchronizer;

pub use actor::{ActionDispatch, PacingPolicy, SessionDeps, SessionHandle, SessionSnapshot};
pub use busy::{BusyGuard, LlmBusyFlag};
pub use error::SessionError;
pub use orchestrator::{BatchOutcome, GenerationKind, GenerationOrchestrator, ReplacementOutcome};
pub use session::{ClarificationSession, SessionSettings};
pub use store::SessionStore;
pub use synchronizer::CollectionSynchronizer;
