//! Key/Value Store Port - Best-effort persistence for session data.
//!
//! Calls are synchronous. The engine never propagates [`PersistenceError`];
//! failures are turned into warning status messages.

use crate::domain::foundation::RequirementId;

/// Errors that can occur during store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Failed to serialize value: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize value: {0}")]
    DeserializationFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Port for persisting string values by key
pub trait KeyValueStore: Send + Sync {
    /// Save a value, replacing any previous value for the key
    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Load a value
    ///
    /// # Returns
    /// `None` if nothing was saved under the key
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;
}

/// Key of the assumption catalog.
pub const ASSUMPTIONS_KEY: &str = "assumptions";

/// Key of the flat question-text list for a requirement.
pub fn questions_key(requirement: &RequirementId) -> String {
    format!("requirements/{}/questions", requirement)
}

/// Key of the question records for a requirement.
pub fn question_records_key(requirement: &RequirementId) -> String {
    format!("requirements/{}/question-records", requirement)
}
