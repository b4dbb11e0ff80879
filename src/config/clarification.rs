//! Clarification engine settings

use serde::Deserialize;

use super::error::ValidationError;

pub const MAX_QUESTION_BUDGET: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct ClarificationConfig {
    /// Maximum questions requested per batch
    #[serde(default = "default_budget")]
    pub question_budget: u32,

    /// Request a follow-up question after each resolved one
    #[serde(default = "default_replacements")]
    pub replacements_enabled: bool,
}

impl ClarificationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=MAX_QUESTION_BUDGET).contains(&self.question_budget) {
            return Err(ValidationError::InvalidQuestionBudget {
                actual: self.question_budget,
                max: MAX_QUESTION_BUDGET,
            });
        }
        Ok(())
    }
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            question_budget: default_budget(),
            replacements_enabled: default_replacements(),
        }
    }
}

fn default_budget() -> u32 {
    5
}

fn default_replacements() -> bool {
    true
}
