//! Persistence media for the serialized draft.
//!
//! A medium stores whole documents under string keys; there are no
//! partial updates. [`MemoryMedium`] keeps them in a map (optionally
//! with a byte quota), [`FileMedium`] writes one JSON file per key.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Maximum length of a medium key.
const MAX_KEY_LEN: usize = 128;

/// Errors raised by a persistence medium.
#[derive(Debug, thiserror::Error)]
pub enum MediumError {
    /// Reading or writing the backing storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The write would exceed the medium's capacity.
    #[error("Quota exceeded: {needed} bytes requested, {limit} allowed")]
    QuotaExceeded { needed: usize, limit: usize },

    /// The key cannot be used as a storage name.
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}

/// Whole-document key/value persistence.
pub trait DraftMedium: Send + Sync {
    /// Read the document stored under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<String>, MediumError>;

    /// Replace the document stored under `key`.
    fn write(&self, key: &str, contents: &str) -> Result<(), MediumError>;

    /// Remove the document stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<(), MediumError>;
}

/// Allowed key characters: alphanumeric, hyphen, underscore, dot. Keys
/// become file names, so path separators are rejected.
fn validate_key(key: &str) -> Result<(), MediumError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(MediumError::InvalidKey(key.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MemoryMedium
// ---------------------------------------------------------------------------

/// In-process medium. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<HashMap<String, String>>,
    /// Upper bound on the total stored bytes, if any.
    quota_bytes: Option<usize>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// A medium that refuses writes pushing its total size past `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(bytes),
        }
    }
}

impl DraftMedium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>, MediumError> {
        validate_key(key)?;
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), MediumError> {
        validate_key(key)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(limit) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let needed = others + contents.len();
            if needed > limit {
                return Err(MediumError::QuotaExceeded { needed, limit });
            }
        }

        entries.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        validate_key(key)?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileMedium
// ---------------------------------------------------------------------------

/// Directory-backed medium storing `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so
/// a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    /// Use `dir` as the storage root. The directory is created lazily on
    /// the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, MediumError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl DraftMedium for FileMedium {
    fn read(&self, key: &str) -> Result<Option<String>, MediumError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), MediumError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
