//! Requirement Clarifier - clarifying-question sessions for requirements
//!
//! Given a requirement and its verification method, the engine asks a text
//! generation service for clarifying questions, tracks answers and accepted
//! assumptions, requests follow-up questions as earlier ones are resolved,
//! and finally generates verification test cases.
//!
//! Layout:
//! - [`domain`] - questions, assumptions, session state, prompt and response
//!   handling
//! - [`ports`] - text generator, key/value store and connectivity interfaces
//! - [`adapters`] - OpenAI, mock, file and in-memory implementations
//! - [`application`] - the session engine and its actor runtime
//! - [`config`] - typed configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
