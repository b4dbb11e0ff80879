//! Question - the atomic unit of a clarification session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{QuestionId, ValidationError};

use super::text::normalize;

/// How strongly an open question blocks test case generation.
///
/// Ordered from least to most severe. Only `Optional` is non-blocking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    #[default]
    Optional,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Returns true if an unanswered question of this severity blocks progress.
    pub fn is_blocking(&self) -> bool {
        *self > Severity::Optional
    }

    /// Canonical upper-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Optional => "OPTIONAL",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Parses a severity label, mapping unrecognized non-blank labels to `Medium`.
    ///
    /// Blank input yields the default (`Optional`).
    pub fn parse_lenient(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() {
            return Severity::default();
        }
        label.parse().unwrap_or(Severity::Medium)
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPTIONAL" | "NICE-TO-HAVE" | "NICE_TO_HAVE" | "INFO" => Ok(Severity::Optional),
            "LOW" | "MINOR" => Ok(Severity::Low),
            "MEDIUM" | "MODERATE" | "NORMAL" => Ok(Severity::Medium),
            "HIGH" | "MAJOR" | "IMPORTANT" | "REQUIRED" => Ok(Severity::High),
            "CRITICAL" | "BLOCKER" | "BLOCKING" => Ok(Severity::Critical),
            other => Err(ValidationError::invalid_format(
                "severity",
                format!("unknown severity '{}'", other),
            )),
        }
    }
}

impl From<String> for Severity {
    fn from(label: String) -> Self {
        Severity::parse_lenient(&label)
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A clarifying question about a requirement.
///
/// Serializes to the persisted record shape
/// `{text, answer?, category?, severity, rationale?, markedAsAssumption, options[]}`;
/// the id and the transient `submitted` / `fading_out` flags are not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(skip)]
    id: QuestionId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default)]
    pub marked_as_assumption: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(skip)]
    pub submitted: bool,
    #[serde(skip)]
    pub fading_out: bool,
}

impl Question {
    /// Creates an OPTIONAL question, rejecting blank text.
    pub fn new(text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::empty_field("question_text"));
        }
        Ok(Self {
            id: QuestionId::new(),
            text: text.to_string(),
            answer: None,
            category: None,
            severity: Severity::default(),
            rationale: None,
            marked_as_assumption: false,
            options: Vec::new(),
            submitted: false,
            fading_out: false,
        })
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_blank(category.into());
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = non_blank(rationale.into());
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options
            .into_iter()
            .filter_map(non_blank)
            .collect();
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.set_answer(answer);
        self
    }

    pub fn id(&self) -> QuestionId {
        self.id
    }

    /// Gives a deserialized record a fresh identity.
    pub fn rekeyed(mut self) -> Self {
        self.id = QuestionId::new();
        self
    }

    /// Normalized form of the question text, used for all dedup checks.
    pub fn normalized_text(&self) -> String {
        normalize(&self.text)
    }

    /// Active iff not submitted and not fading out.
    pub fn is_active(&self) -> bool {
        !self.submitted && !self.fading_out
    }

    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }

    /// Answered or explicitly marked as an assumption.
    pub fn is_resolved(&self) -> bool {
        self.is_answered() || self.marked_as_assumption
    }

    /// Active, blocking severity, and not yet answered.
    pub fn blocks_progress(&self) -> bool {
        self.is_active() && self.severity.is_blocking() && !self.is_answered()
    }

    /// Stores a trimmed answer; blank answers clear it.
    pub fn set_answer(&mut self, answer: impl Into<String>) {
        self.answer = non_blank(answer.into());
    }

    /// Renders the `Q: … | A: …` context line used in prompts.
    pub fn context_line(&self) -> Option<String> {
        match (&self.answer, self.marked_as_assumption) {
            (Some(answer), _) => Some(format!("Q: {} | A: {}", self.text, answer)),
            (None, true) => Some(format!("Assumption: {}", self.text)),
            (None, false) => None,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
