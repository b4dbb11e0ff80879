//! Response parser - turns generator output (or pasted text) into questions.
//!
//! Two input shapes are understood:
//!
//! - **JSON**, optionally inside a markdown code fence: either an envelope
//!   `{"questions": [...], "suggestedAssumptions": [...]}` or a bare array of
//!   question objects / strings.
//! - **Plain text**: numbered or bulleted lines, or any line ending in `?`.
//!   An optional `[SEVERITY]` prefix sets severity; `Rationale:`, `Category:`,
//!   `Severity:` and `Options:` lines attach to the preceding question; a
//!   `Suggested assumptions: a, b` line lists catalog keys.
//!
//! Suggested keys and questions are extracted by separate calls so the caller
//! can merge suggestions into the catalog before the question list is built.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;

use super::question::{Question, Severity};
use super::text::normalize;

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-*•]|\d+[.):]|\(\d+\)|Q\d*[.):])\s*").expect("valid list marker regex")
});

static SEVERITY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([A-Za-z_-]+)\]\s*").expect("valid severity tag regex"));

static ATTRIBUTE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(rationale|why|category|severity|options?)\s*:\s*(.+)$")
        .expect("valid attribute regex")
});

static SUGGESTION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:suggested[\s_-]*assumptions?|assumption[\s_-]*keys?)\s*[:=]\s*(.*)$")
        .expect("valid suggestion regex")
});

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireQuestion {
    Text(String),
    Record(WireRecord),
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(alias = "question")]
    text: String,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default, alias = "markedAsAssumption")]
    marked_as_assumption: bool,
}

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    questions: Vec<WireQuestion>,
    #[serde(
        default,
        alias = "suggestedAssumptions",
        alias = "assumptionKeys",
        alias = "assumption_keys"
    )]
    suggested_assumptions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Envelope(WireEnvelope),
    List(Vec<WireQuestion>),
}

impl WireQuestion {
    fn into_question(self) -> Option<Question> {
        match self {
            WireQuestion::Text(text) => Question::new(text).ok(),
            WireQuestion::Record(record) => {
                let mut question = Question::new(record.text)
                    .ok()?
                    .with_severity(Severity::parse_lenient(
                        record.severity.as_deref().unwrap_or_default(),
                    ))
                    .with_options(record.options);
                if let Some(category) = record.category {
                    question = question.with_category(category);
                }
                if let Some(rationale) = record.rationale {
                    question = question.with_rationale(rationale);
                }
                if let Some(answer) = record.answer {
                    question.set_answer(answer);
                }
                question.marked_as_assumption = record.marked_as_assumption;
                Some(question)
            }
        }
    }
}

/// Result of deduplicating a parsed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub questions: Vec<Question>,
    pub duplicates_removed: usize,
}

/// Stateless parser for generator responses.
pub struct ResponseParser;

impl ResponseParser {
    /// Extracts suggested assumption keys, in order, without duplicates.
    pub fn suggested_assumptions(raw: &str) -> Vec<String> {
        let keys = match Self::parse_json(raw) {
            Some(WireResponse::Envelope(envelope)) => envelope.suggested_assumptions,
            Some(WireResponse::List(_)) => Vec::new(),
            None => raw
                .lines()
                .flat_map(|line| {
                    let line = strip_emphasis(line);
                    SUGGESTION_LINE
                        .captures(line.trim())
                        .map(|caps| split_keys(&caps[1]))
                        .unwrap_or_default()
                })
                .collect(),
        };

        let mut seen = HashSet::new();
        keys.into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && seen.insert(normalize(k)))
            .collect()
    }

    /// Parses questions in response order, duplicates included.
    pub fn questions(raw: &str) -> Vec<Question> {
        let questions: Vec<Question> = match Self::parse_json(raw) {
            Some(WireResponse::Envelope(envelope)) => envelope
                .questions
                .into_iter()
                .filter_map(WireQuestion::into_question)
                .collect(),
            Some(WireResponse::List(list)) => {
                list.into_iter().filter_map(WireQuestion::into_question).collect()
            }
            None => Vec::new(),
        };
        if questions.is_empty() {
            Self::parse_text(raw)
        } else {
            questions
        }
    }

    /// Parses and deduplicates in one step.
    pub fn parse_batch(raw: &str) -> ParsedBatch {
        let (questions, duplicates_removed) = dedupe(Self::questions(raw));
        ParsedBatch {
            questions,
            duplicates_removed,
        }
    }

    /// Only a body that opens with `{` or `[` is read as JSON.
    fn parse_json(raw: &str) -> Option<WireResponse> {
        let body = strip_code_fence(raw);
        if !body.starts_with(['{', '[']) {
            return None;
        }
        serde_json::from_str(body).ok()
    }

    fn parse_text(raw: &str) -> Vec<Question> {
        let mut questions: Vec<Question> = Vec::new();
        // Attribute lines only attach directly under a question.
        let mut attach_to_last = false;

        for line in raw.lines() {
            let line = strip_emphasis(line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if SUGGESTION_LINE.is_match(line) {
                attach_to_last = false;
                continue;
            }

            let (body, had_marker) = match LIST_MARKER.find(line) {
                Some(m) => (&line[m.end()..], true),
                None => (line, false),
            };

            if let Some(caps) = ATTRIBUTE_LINE.captures(body) {
                if attach_to_last {
                    if let Some(last) = questions.last_mut() {
                        apply_attribute(last, &caps[1], &caps[2]);
                    }
                }
                continue;
            }

            let (severity, text) = match SEVERITY_TAG.captures(body) {
                Some(caps) => (
                    Some(Severity::parse_lenient(&caps[1])),
                    &body[caps.get(0).map_or(0, |m| m.end())..],
                ),
                None => (None, body),
            };

            if !(had_marker || severity.is_some() || text.trim_end().ends_with('?')) {
                attach_to_last = false;
                continue;
            }

            match Question::new(text) {
                Ok(question) => {
                    questions.push(question.with_severity(severity.unwrap_or_default()));
                    attach_to_last = true;
                }
                Err(_) => attach_to_last = false,
            }
        }

        questions
    }
}

/// Removes duplicates by normalized text, first occurrence wins.
///
/// Returns the survivors in original order and the number removed.
pub fn dedupe(questions: Vec<Question>) -> (Vec<Question>, usize) {
    let mut seen = HashSet::new();
    let total = questions.len();
    let unique: Vec<Question> = questions
        .into_iter()
        .filter(|q| seen.insert(q.normalized_text()))
        .collect();
    let removed = total - unique.len();
    (unique, removed)
}

fn apply_attribute(question: &mut Question, name: &str, value: &str) {
    let value = value.trim();
    match name.to_ascii_lowercase().as_str() {
        "rationale" | "why" => question.rationale = Some(value.to_string()),
        "category" => question.category = Some(value.to_string()),
        "severity" => question.severity = Severity::parse_lenient(value),
        _ => {
            question.options = value
                .split(['|', ';'])
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
}

fn split_keys(list: &str) -> Vec<String> {
    list.split([',', ';'])
        .map(|k| k.trim().trim_matches(['"', '\'', '[', ']', '`']).trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

fn strip_emphasis(line: &str) -> String {
    line.replace("**", "")
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string ("json") on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.rsplit_once("```").map_or(rest, |(body, _)| body).trim()
}
