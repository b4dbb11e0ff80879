//! Clarification module - requirement clarification domain.
//!
//! # Overview
//!
//! A clarification session asks a text generator for questions about a
//! requirement, collects answers, and promotes resolved questions into a
//! reusable assumption catalog before test cases are generated.
//!
//! # Module Organization
//!
//! - `question` - Question entity and severity
//! - `assumption` - Assumption items and the deduplicated catalog
//! - `promoter` - Question to assumption promotion rules
//! - `session_state` - Derived session state and smart-button mapping
//! - `requirement` - Requirement context and precondition checks
//! - `artifact` - Supporting table shapes
//! - `prompt` - Prompt construction
//! - `parser` - Response parsing and batch dedup
//! - `status` - User-facing status messages
//! - `text` - Text normalization helpers

mod artifact;
mod assumption;
mod parser;
mod promoter;
mod prompt;
mod question;
mod requirement;
mod session_state;
mod status;
mod text;

pub use artifact::{GridCell, SupportingArtifact, TableArtifact};
pub use assumption::{AssumptionCatalog, AssumptionItem, SuggestionMerge};
pub use parser::{dedupe, ParsedBatch, ResponseParser};
pub use promoter::{AssumptionPromoter, PromotionOutcome};
pub use prompt::PromptBuilder;
pub use question::{Question, Severity};
pub use requirement::{
    PreconditionError, RequirementContext, ValidatedRequirement, VerificationMethod,
};
pub use session_state::{
    ActionAvailability, SessionState, SmartAction, LABEL_ASK, LABEL_GENERATE, LABEL_SUBMIT,
    LABEL_WORKING,
};
pub use status::{StatusLevel, StatusMessage};
pub use text::{normalize, same_text, slugify};
