//! Assumption catalog - the deduplicated set of facts the user has accepted.
//!
//! Each item is a named, keyed, enable/disable-able fact with a rendered
//! prompt line. Identity is case-insensitive on both key and name: the catalog
//! never holds two items whose normalized key or normalized name collide.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

use super::text::normalize;

const QA_PREFIX: &str = "Q:";
const QA_SEPARATOR: &str = "| A:";

/// A single reusable assumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssumptionItem {
    pub key: String,
    pub name: String,
    pub content_line: String,
    #[serde(default = "enabled_by_default")]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_llm_suggested: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl AssumptionItem {
    /// Creates an enabled, user-sourced assumption.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        content_line: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let key = key.into().trim().to_string();
        let name = name.into().trim().to_string();
        let content_line = content_line.into().trim().to_string();

        if key.is_empty() {
            return Err(ValidationError::empty_field("assumption_key"));
        }
        if name.is_empty() {
            return Err(ValidationError::empty_field("assumption_name"));
        }
        if content_line.is_empty() {
            return Err(ValidationError::empty_field("assumption_content_line"));
        }

        Ok(Self {
            key,
            name,
            content_line,
            is_enabled: true,
            is_llm_suggested: false,
        })
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }

    /// Extracts the question text from a `Q: … | A: …` content line.
    pub fn question_text(&self) -> Option<&str> {
        let rest = self.content_line.trim().strip_prefix(QA_PREFIX)?;
        let end = rest.find(QA_SEPARATOR)?;
        let question = rest[..end].trim();
        (!question.is_empty()).then_some(question)
    }

    /// True if the normalized key or name equals either candidate.
    pub fn matches(&self, key: &str, name: &str) -> bool {
        let own_key = normalize(&self.key);
        let own_name = normalize(&self.name);
        let key = normalize(key);
        let name = normalize(name);
        own_key == key || own_key == name || own_name == key || own_name == name
    }

    /// True if this item already encodes the given question (by name or by
    /// the question embedded in its content line).
    pub fn covers_question(&self, normalized_question: &str) -> bool {
        normalize(&self.name) == normalized_question
            || self
                .question_text()
                .is_some_and(|q| normalize(q) == normalized_question)
    }
}

/// Result of merging LLM-suggested keys into the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionMerge {
    /// Items that matched a suggested key and are now enabled.
    pub enabled: usize,
    /// Suggested keys with no matching catalog item.
    pub unknown: Vec<String>,
}

/// Deduplicated, ordered collection of assumptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssumptionCatalog {
    items: Vec<AssumptionItem>,
}

impl AssumptionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from possibly-duplicated items, first occurrence wins.
    pub fn from_items(items: impl IntoIterator<Item = AssumptionItem>) -> Self {
        let mut catalog = Self::new();
        for item in items {
            catalog.insert(item);
        }
        catalog
    }

    pub fn items(&self) -> &[AssumptionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &AssumptionItem> {
        self.items.iter().filter(|item| item.is_enabled)
    }

    /// Finds the item whose key or name matches, case-insensitively.
    pub fn find(&self, key: &str, name: &str) -> Option<&AssumptionItem> {
        self.items.iter().find(|item| item.matches(key, name))
    }

    fn find_mut(&mut self, key: &str, name: &str) -> Option<&mut AssumptionItem> {
        self.items.iter_mut().find(|item| item.matches(key, name))
    }

    pub fn contains(&self, key: &str, name: &str) -> bool {
        self.find(key, name).is_some()
    }

    /// Inserts the item unless one with an equal key or name exists.
    ///
    /// Returns true if the item was inserted.
    pub fn insert(&mut self, item: AssumptionItem) -> bool {
        if self.contains(&item.key, &item.name) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Enables or disables the item matching `key`. Returns false if absent.
    pub fn set_enabled(&mut self, key: &str, enabled: bool) -> bool {
        match self.find_mut(key, key) {
            Some(item) => {
                item.is_enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Disables every item, returning how many were enabled before.
    pub fn disable_all(&mut self) -> usize {
        let mut disabled = 0;
        for item in self.items.iter_mut().filter(|item| item.is_enabled) {
            item.is_enabled = false;
            disabled += 1;
        }
        disabled
    }

    /// Enables items matching suggested keys and flags them LLM-suggested.
    pub fn merge_suggested(&mut self, keys: &[String]) -> SuggestionMerge {
        let mut merge = SuggestionMerge::default();
        for key in keys {
            match self.find_mut(key, key) {
                Some(item) => {
                    item.is_llm_suggested = true;
                    if !item.is_enabled {
                        item.is_enabled = true;
                        merge.enabled += 1;
                    }
                }
                None => merge.unknown.push(key.clone()),
            }
        }
        merge
    }

    /// Content lines of enabled items, in catalog order.
    pub fn enabled_prompt_lines(&self) -> Vec<String> {
        self.enabled().map(|item| item.content_line.clone()).collect()
    }

    /// Keys of disabled items the model may suggest re-enabling.
    pub fn disabled_keys(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| !item.is_enabled)
            .map(|item| item.key.clone())
            .collect()
    }

    /// True if an enabled item already encodes this question.
    pub fn covers_question(&self, question_text: &str) -> bool {
        let normalized = normalize(question_text);
        self.enabled().any(|item| item.covers_question(&normalized))
    }
}
