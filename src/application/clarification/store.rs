//! Session persistence over the key/value port.
//!
//! Question data is namespaced by requirement id; a session without an id
//! keeps its questions in memory only. The assumption catalog is global.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::clarification::{AssumptionCatalog, Question};
use crate::domain::foundation::RequirementId;
use crate::ports::{
    question_records_key, questions_key, KeyValueStore, PersistenceError, ASSUMPTIONS_KEY,
};

/// Typed access to the keys a session reads and writes.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    requirement: Option<RequirementId>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, requirement: Option<RequirementId>) -> Self {
        Self { store, requirement }
    }

    pub fn requirement(&self) -> Option<&RequirementId> {
        self.requirement.as_ref()
    }

    /// Writes the legacy flat list of question texts.
    pub fn save_flat(&self, texts: &[String]) -> Result<(), PersistenceError> {
        match &self.requirement {
            Some(id) => self.save_json(&questions_key(id), texts),
            None => Ok(()),
        }
    }

    /// Writes the question records.
    pub fn save_records(&self, questions: &[Question]) -> Result<(), PersistenceError> {
        match &self.requirement {
            Some(id) => self.save_json(&question_records_key(id), questions),
            None => Ok(()),
        }
    }

    /// Loads question records, falling back to the flat list.
    pub fn load_questions(&self) -> Result<Option<Vec<Question>>, PersistenceError> {
        let Some(id) = &self.requirement else {
            return Ok(None);
        };

        if let Some(records) = self.load_json::<Vec<Question>>(&question_records_key(id))? {
            return Ok(Some(records.into_iter().map(Question::rekeyed).collect()));
        }

        Ok(self
            .load_json::<Vec<String>>(&questions_key(id))?
            .map(|texts| texts.into_iter().filter_map(|t| Question::new(t).ok()).collect()))
    }

    pub fn save_catalog(&self, catalog: &AssumptionCatalog) -> Result<(), PersistenceError> {
        self.save_json(ASSUMPTIONS_KEY, catalog)
    }

    /// Loads the catalog; a missing key yields an empty catalog.
    pub fn load_catalog(&self) -> Result<AssumptionCatalog, PersistenceError> {
        Ok(self
            .load_json::<AssumptionCatalog>(ASSUMPTIONS_KEY)?
            .map(|loaded| AssumptionCatalog::from_items(loaded.items().to_vec()))
            .unwrap_or_default())
    }

    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(value)
            .map_err(|e| PersistenceError::SerializationFailed(e.to_string()))?;
        self.store.save(key, &json)
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        match self.store.load(key)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| PersistenceError::DeserializationFailed(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }
}
