//! Requirement context - the inputs every prompt is built from.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::foundation::RequirementId;

use super::artifact::SupportingArtifact;

/// A required requirement field is missing.
///
/// Raised before any generation call is attempted; the session surfaces it as
/// a status message and highlights [`PreconditionError::field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Requirement description is required before asking clarifying questions")]
    MissingDescription,

    #[error("Verification method is required before asking clarifying questions")]
    MissingVerificationMethod,
}

impl PreconditionError {
    /// Name of the form field to highlight.
    pub fn field(&self) -> &'static str {
        match self {
            PreconditionError::MissingDescription => "description",
            PreconditionError::MissingVerificationMethod => "verification_method",
        }
    }
}

/// How a requirement will be verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    Inspection,
    Analysis,
    Demonstration,
    Test,
    Other(String),
}

impl VerificationMethod {
    /// Parses a label, accepting the single-letter IADT abbreviations.
    ///
    /// Returns `None` for blank input.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        let method = match label.to_ascii_lowercase().as_str() {
            "i" | "inspection" | "inspect" => VerificationMethod::Inspection,
            "a" | "analysis" | "analyze" | "analyse" => VerificationMethod::Analysis,
            "d" | "demonstration" | "demo" => VerificationMethod::Demonstration,
            "t" | "test" | "testing" => VerificationMethod::Test,
            _ => VerificationMethod::Other(label.to_string()),
        };
        Some(method)
    }

    pub fn label(&self) -> &str {
        match self {
            VerificationMethod::Inspection => "Inspection",
            VerificationMethod::Analysis => "Analysis",
            VerificationMethod::Demonstration => "Demonstration",
            VerificationMethod::Test => "Test",
            VerificationMethod::Other(label) => label,
        }
    }

    /// Assumption line implied by the method category, if it is a known one.
    pub fn category_assumption(&self) -> Option<&'static str> {
        match self {
            VerificationMethod::Inspection => Some(
                "Assumption: Verification is by inspection of design artifacts, code, or documentation; no execution is required.",
            ),
            VerificationMethod::Analysis => Some(
                "Assumption: Verification is by analysis (calculation, modeling, or simulation) rather than execution on the target.",
            ),
            VerificationMethod::Demonstration => Some(
                "Assumption: Verification is by demonstration of observable behavior without detailed instrumentation.",
            ),
            VerificationMethod::Test => Some(
                "Assumption: Verification is by test with controlled inputs and measured outputs against pass/fail criteria.",
            ),
            VerificationMethod::Other(_) => None,
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The requirement a session is clarifying.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementContext {
    pub id: Option<RequirementId>,
    pub description: String,
    pub verification_method: String,
    #[serde(default)]
    pub artifacts: Vec<SupportingArtifact>,
}

/// A requirement whose required fields have been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequirement<'a> {
    pub description: &'a str,
    pub method: VerificationMethod,
    pub artifacts: &'a [SupportingArtifact],
}

impl RequirementContext {
    pub fn new(description: impl Into<String>, verification_method: impl Into<String>) -> Self {
        Self {
            id: None,
            description: description.into(),
            verification_method: verification_method.into(),
            artifacts: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: RequirementId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_artifact(mut self, artifact: SupportingArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Checks description first, then verification method.
    pub fn validate(&self) -> Result<ValidatedRequirement<'_>, PreconditionError> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(PreconditionError::MissingDescription);
        }
        let method = VerificationMethod::parse(&self.verification_method)
            .ok_or(PreconditionError::MissingVerificationMethod)?;
        Ok(ValidatedRequirement {
            description,
            method,
            artifacts: &self.artifacts,
        })
    }
}
