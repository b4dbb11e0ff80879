//! Generation orchestrator - prompt preparation, generator calls and result
//! integration for batches, replacements and test cases.
//!
//! Preparation and integration are synchronous and run on the session's
//! owning task; only [`GenerationOrchestrator::execute`] is sent to a
//! background task.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::clarification::{
    AssumptionCatalog, ParsedBatch, PreconditionError, PromptBuilder, Question,
    RequirementContext, ResponseParser, StatusMessage, SuggestionMerge,
};
use crate::ports::{GenerationError, ProviderInfo, TextGenerator};

/// What a generator call is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Batch,
    Replacement,
    TestCases,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Batch => "batch",
            GenerationKind::Replacement => "replacement",
            GenerationKind::TestCases => "test_cases",
        }
    }
}

/// Integrated full-batch response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub questions: Vec<Question>,
    pub duplicates_removed: usize,
    pub merge: SuggestionMerge,
}

impl BatchOutcome {
    /// "Loaded N question(s)." plus the duplicate count when non-zero, or
    /// "No valid questions detected".
    pub fn status(&self) -> StatusMessage {
        if self.questions.is_empty() {
            return StatusMessage::info("No valid questions detected");
        }
        let mut text = format!("Loaded {} question(s).", self.questions.len());
        if self.duplicates_removed > 0 {
            text.push_str(&format!(" {} duplicate(s) removed.", self.duplicates_removed));
        }
        StatusMessage::info(text)
    }
}

/// Integrated single-replacement response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementOutcome {
    Accepted(Question),
    /// The question is already pending or already an enabled assumption.
    Duplicate(String),
    Empty,
}

impl ReplacementOutcome {
    pub fn status(&self) -> StatusMessage {
        match self {
            ReplacementOutcome::Accepted(question) => {
                StatusMessage::info(format!("Added follow-up question: {}", question.text))
            }
            ReplacementOutcome::Duplicate(text) => {
                StatusMessage::info(format!("Skipped duplicate follow-up question: {}", text))
            }
            ReplacementOutcome::Empty => StatusMessage::info("No valid questions detected"),
        }
    }
}

/// Builds prompts, executes them, and integrates the results.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    generator: Arc<dyn TextGenerator>,
    question_budget: u32,
}

impl GenerationOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, question_budget: u32) -> Self {
        Self {
            generator,
            question_budget: question_budget.max(1),
        }
    }

    pub fn provider_info(&self) -> ProviderInfo {
        self.generator.provider_info()
    }

    /// Full-batch prompt: budget, enabled assumptions, suggestible keys.
    pub fn prepare_batch(
        &self,
        requirement: &RequirementContext,
        catalog: &AssumptionCatalog,
    ) -> Result<String, PreconditionError> {
        Ok(PromptBuilder::for_requirement(requirement)?
            .budget(self.question_budget)
            .assumptions(catalog.enabled_prompt_lines())
            .suggestible_keys(catalog.disabled_keys())
            .build())
    }

    /// Single-question prompt carrying everything already answered.
    pub fn prepare_replacement(
        &self,
        requirement: &RequirementContext,
        catalog: &AssumptionCatalog,
        answered: Vec<String>,
    ) -> Result<String, PreconditionError> {
        Ok(PromptBuilder::for_requirement(requirement)?
            .assumptions(catalog.enabled_prompt_lines())
            .suggestible_keys(catalog.disabled_keys())
            .answered_context(answered)
            .single_replacement()
            .build())
    }

    pub fn prepare_test_cases(
        &self,
        requirement: &RequirementContext,
        catalog: &AssumptionCatalog,
        answered: Vec<String>,
    ) -> Result<String, PreconditionError> {
        Ok(PromptBuilder::for_requirement(requirement)?
            .assumptions(catalog.enabled_prompt_lines())
            .answered_context(answered)
            .build_test_cases())
    }

    /// Returns a `'static` future performing the generator call, suitable for
    /// spawning.
    pub fn execute(
        &self,
        kind: GenerationKind,
        prompt: String,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send + 'static {
        let generator = Arc::clone(&self.generator);
        async move {
            tracing::debug!(kind = kind.as_str(), prompt_len = prompt.len(), "Calling text generator");
            let result = generator.generate(&prompt, &cancel).await;
            match &result {
                Ok(text) => {
                    tracing::debug!(kind = kind.as_str(), response_len = text.len(), "Generation completed")
                }
                Err(GenerationError::Cancelled) => {
                    tracing::info!(kind = kind.as_str(), "Generation cancelled")
                }
                Err(err) => tracing::warn!(kind = kind.as_str(), error = %err, "Generation failed"),
            }
            result
        }
    }

    /// Merges suggested keys, then parses and dedupes, capping at the budget.
    pub fn apply_batch(&self, raw: &str, catalog: &mut AssumptionCatalog) -> BatchOutcome {
        let mut outcome = integrate(raw, catalog);
        outcome.questions.truncate(self.question_budget as usize);
        outcome
    }

    /// Like [`apply_batch`](Self::apply_batch) without the budget cap, for
    /// pasted text.
    pub fn apply_import(&self, raw: &str, catalog: &mut AssumptionCatalog) -> BatchOutcome {
        integrate(raw, catalog)
    }

    /// Takes the first parsed question unless it duplicates an existing
    /// question or an enabled assumption.
    pub fn apply_replacement(
        &self,
        raw: &str,
        catalog: &mut AssumptionCatalog,
        existing: &[Question],
    ) -> ReplacementOutcome {
        merge_suggestions(raw, catalog);

        let Some(candidate) = ResponseParser::questions(raw).into_iter().next() else {
            return ReplacementOutcome::Empty;
        };

        let normalized = candidate.normalized_text();
        let pending_duplicate = existing
            .iter()
            .any(|q| q.normalized_text() == normalized);
        if pending_duplicate || catalog.covers_question(&candidate.text) {
            tracing::debug!(
                text = %candidate.text,
                pending_duplicate,
                "Dropping duplicate replacement question"
            );
            return ReplacementOutcome::Duplicate(candidate.text);
        }

        ReplacementOutcome::Accepted(candidate)
    }
}

fn integrate(raw: &str, catalog: &mut AssumptionCatalog) -> BatchOutcome {
    let merge = merge_suggestions(raw, catalog);
    let ParsedBatch {
        questions,
        duplicates_removed,
    } = ResponseParser::parse_batch(raw);
    if duplicates_removed > 0 {
        tracing::debug!(duplicates = duplicates_removed, "Removed duplicate questions");
    }
    BatchOutcome {
        questions,
        duplicates_removed,
        merge,
    }
}

fn merge_suggestions(raw: &str, catalog: &mut AssumptionCatalog) -> SuggestionMerge {
    let keys = ResponseParser::suggested_assumptions(raw);
    if keys.is_empty() {
        return SuggestionMerge::default();
    }
    let merge = catalog.merge_suggested(&keys);
    for key in &merge.unknown {
        tracing::warn!(key = %key, "Skipping unknown suggested assumption");
    }
    merge
}
