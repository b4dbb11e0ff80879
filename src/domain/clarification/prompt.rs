//! Prompt construction for question batches, single replacements and test
//! case generation.

use std::fmt::Write;

use super::requirement::{PreconditionError, RequirementContext, ValidatedRequirement};
use super::text::normalize;

const RESPONSE_FORMAT: &str = r#"Respond with JSON only, in this shape:
{"suggestedAssumptions": ["<key>", ...], "questions": [{"text": "...", "category": "...", "severity": "CRITICAL|HIGH|MEDIUM|LOW|OPTIONAL", "rationale": "...", "options": ["..."]}]}"#;

/// Builds generator prompts from a validated requirement.
#[derive(Debug, Clone)]
pub struct PromptBuilder<'a> {
    requirement: ValidatedRequirement<'a>,
    budget: u32,
    assumptions: Vec<String>,
    answered: Vec<String>,
    suggestible_keys: Vec<String>,
    single: bool,
}

impl<'a> PromptBuilder<'a> {
    /// Validates the requirement; nothing is built for an incomplete one.
    pub fn for_requirement(requirement: &'a RequirementContext) -> Result<Self, PreconditionError> {
        Ok(Self {
            requirement: requirement.validate()?,
            budget: 1,
            assumptions: Vec::new(),
            answered: Vec::new(),
            suggestible_keys: Vec::new(),
            single: false,
        })
    }

    /// Maximum number of questions to request.
    pub fn budget(mut self, budget: u32) -> Self {
        self.budget = budget.max(1);
        self
    }

    /// Enabled assumption prompt lines.
    pub fn assumptions(mut self, lines: Vec<String>) -> Self {
        self.assumptions = lines;
        self
    }

    /// `Q: … | A: …` lines for questions already resolved.
    pub fn answered_context(mut self, lines: Vec<String>) -> Self {
        self.answered = lines;
        self
    }

    /// Disabled catalog keys the model may suggest enabling.
    pub fn suggestible_keys(mut self, keys: Vec<String>) -> Self {
        self.suggestible_keys = keys;
        self
    }

    /// Request exactly one replacement question.
    pub fn single_replacement(mut self) -> Self {
        self.budget = 1;
        self.single = true;
        self
    }

    /// Assumption lines plus the verification-method category line, which is
    /// appended only if no line already equals it case-insensitively.
    pub fn assumption_lines(&self) -> Vec<String> {
        let mut lines = self.assumptions.clone();
        if let Some(category) = self.requirement.method.category_assumption() {
            let wanted = normalize(category);
            if !lines.iter().any(|line| normalize(line) == wanted) {
                lines.push(category.to_string());
            }
        }
        lines
    }

    /// Prompt asking for clarifying questions.
    pub fn build(&self) -> String {
        let mut prompt = String::from(
            "You are helping a verification engineer refine a software requirement before test cases are written.\n\n",
        );
        self.write_requirement(&mut prompt);
        self.write_assumptions(&mut prompt, "Known assumptions (do not ask about these)");

        if !self.answered.is_empty() {
            prompt.push_str("\nAlready answered (do not ask these again or rephrase them):\n");
            for line in &self.answered {
                let _ = writeln!(prompt, "- {}", line);
            }
        }

        if !self.suggestible_keys.is_empty() {
            let _ = writeln!(
                prompt,
                "\nAssumption keys you may suggest enabling: {}",
                self.suggestible_keys.join(", ")
            );
        }

        let _ = writeln!(
            prompt,
            "\nAsk at most {} clarifying question(s) whose answers would most improve the testability of this requirement. \
             Mark questions that do not block test design as OPTIONAL.",
            self.budget
        );
        prompt.push_str(RESPONSE_FORMAT);
        if self.single {
            prompt.push_str("\nReturn exactly one question.");
        }
        prompt
    }

    /// Prompt asking for verification test cases.
    pub fn build_test_cases(&self) -> String {
        let mut prompt = String::from(
            "You are a verification engineer. Write verification test cases for the requirement below.\n\n",
        );
        self.write_requirement(&mut prompt);
        self.write_assumptions(&mut prompt, "Assumptions and clarifications");
        if !self.answered.is_empty() {
            prompt.push_str("\nClarifications:\n");
            for line in &self.answered {
                let _ = writeln!(prompt, "- {}", line);
            }
        }
        let _ = writeln!(
            prompt,
            "\nEach test case must be verifiable by {} and list: identifier, objective, preconditions, steps, expected result.",
            self.requirement.method.label().to_lowercase()
        );
        prompt
    }

    fn write_requirement(&self, prompt: &mut String) {
        let _ = writeln!(prompt, "Requirement:\n{}\n", self.requirement.description);
        let _ = writeln!(prompt, "Verification method: {}", self.requirement.method);

        let tables: Vec<_> = self
            .requirement
            .artifacts
            .iter()
            .map(|artifact| artifact.to_table())
            .filter(|table| !table.is_empty())
            .collect();
        if !tables.is_empty() {
            prompt.push_str("\nSupporting tables:\n");
            for table in tables {
                let _ = writeln!(prompt, "{}\n", table.render());
            }
        }
    }

    fn write_assumptions(&self, prompt: &mut String, heading: &str) {
        let lines = self.assumption_lines();
        if lines.is_empty() {
            return;
        }
        let _ = writeln!(prompt, "\n{}:", heading);
        for line in lines {
            let _ = writeln!(prompt, "- {}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clarification::artifact::{SupportingArtifact, TableArtifact};
    use crate::domain::clarification::requirement::VerificationMethod;

    fn requirement() -> RequirementContext {
        RequirementContext::new("The system shall log all failed logins", "Inspection")
    }

    #[test]
    fn incomplete_requirement_cannot_build() {
        let req = RequirementContext::new("", "Test");
        assert_eq!(
            PromptBuilder::for_requirement(&req).unwrap_err(),
            PreconditionError::MissingDescription
        );
    }

    #[test]
    fn batch_prompt_contains_description_method_budget_and_category() {
        let req = requirement();
        let prompt = PromptBuilder::for_requirement(&req)
            .unwrap()
            .budget(3)
            .assumptions(vec!["Assumption: all times are UTC".into()])
            .build();

        assert!(prompt.contains("The system shall log all failed logins"));
        assert!(prompt.contains("Verification method: Inspection"));
        assert!(prompt.contains("at most 3 clarifying question(s)"));
        assert!(prompt.contains("- Assumption: all times are UTC"));
        assert!(prompt.contains(
            VerificationMethod::Inspection.category_assumption().unwrap()
        ));
        assert!(!prompt.contains("Return exactly one question."));
    }

    #[test]
    fn category_assumption_not_duplicated_case_insensitively() {
        let req = requirement();
        let existing = VerificationMethod::Inspection
            .category_assumption()
            .unwrap()
            .to_uppercase();
        let builder = PromptBuilder::for_requirement(&req)
            .unwrap()
            .assumptions(vec![existing]);
        assert_eq!(builder.assumption_lines().len(), 1);
    }

    #[test]
    fn replacement_prompt_has_context_and_single_instruction() {
        let req = requirement();
        let prompt = PromptBuilder::for_requirement(&req)
            .unwrap()
            .budget(5)
            .answered_context(vec!["Q: Is X true? | A: Yes".into()])
            .single_replacement()
            .build();

        assert!(prompt.contains("at most 1 clarifying question(s)"));
        assert!(prompt.contains("- Q: Is X true? | A: Yes"));
        assert!(prompt.ends_with("Return exactly one question."));
    }

    #[test]
    fn tables_are_rendered_when_present() {
        let req = requirement().with_artifact(SupportingArtifact::Table(TableArtifact {
            title: "Events".into(),
            columns: vec!["Event".into()],
            rows: vec![vec!["bad password".into()]],
        }));
        let prompt = PromptBuilder::for_requirement(&req).unwrap().build();
        assert!(prompt.contains("Supporting tables:"));
        assert!(prompt.contains("bad password"));
    }

    #[test]
    fn suggestible_keys_are_listed() {
        let req = requirement();
        let prompt = PromptBuilder::for_requirement(&req)
            .unwrap()
            .suggestible_keys(vec!["utc-times".into()])
            .build();
        assert!(prompt.contains("may suggest enabling: utc-times"));
    }

    #[test]
    fn test_case_prompt_mentions_method() {
        let req = requirement();
        let prompt = PromptBuilder::for_requirement(&req)
            .unwrap()
            .answered_context(vec!["Q: Which events? | A: bad password".into()])
            .build_test_cases();
        assert!(prompt.contains("verifiable by inspection"));
        assert!(prompt.contains("Q: Which events? | A: bad password"));
    }
}
