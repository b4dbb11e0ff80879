//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, state machine, errors)
//! - `clarification` - Questions, assumptions, session state, prompts and parsing

pub mod clarification;
pub mod foundation;
