//! File-based Key/Value Store Adapter
//!
//! Stores each key as one JSON file under a base directory. Key segments
//! separated by `/` become nested directories, e.g.
//! `requirements/REQ-1/questions` is written to
//! `<base>/requirements/REQ-1/questions.json`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::ports::{KeyValueStore, PersistenceError};

/// File-based key/value store
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    base_path: PathBuf,
}

impl FileKeyValueStore {
    /// Create a new file store rooted at `base_path`
    ///
    /// # Example
    /// ```ignore
    /// let store = FileKeyValueStore::new("./data");
    /// ```
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Maps a key onto a file path, rejecting keys with no usable segment.
    fn file_path(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let segments: Vec<String> = key
            .split('/')
            .map(sanitize_segment)
            .filter(|segment| !segment.is_empty())
            .collect();

        let Some((last, dirs)) = segments.split_last() else {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        };

        let mut path = self.base_path.clone();
        for dir in dirs {
            path.push(dir);
        }
        path.push(format!("{}.json", last));
        Ok(path)
    }
}

/// Keeps alphanumerics, `-` and `_`; everything else becomes `_`.
/// Dot-only segments are dropped so keys cannot climb out of the base path.
fn sanitize_segment(segment: &str) -> String {
    let segment = segment.trim();
    if segment.chars().all(|c| c == '.') {
        return String::new();
    }
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl KeyValueStore for FileKeyValueStore {
    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.file_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::IoError(e.to_string()))?;
        }
        fs::write(&path, value).map_err(|e| PersistenceError::IoError(e.to_string()))?;
        tracing::debug!(key, path = %path.display(), "Saved value");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.file_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::IoError(e.to_string())),
        }
    }
}
