//! The local draft store.
//!
//! [`DraftStore`] owns the in-progress [`JourneyDraft`] for one authoring
//! session. Reads always return a complete, sanitized draft. Writes merge
//! a partial update, drop stale ids, stamp `lastSaved` and persist the
//! wire-encoded document to the medium. Persistence failures are logged;
//! the in-memory copy stays authoritative for the session and the next
//! write retries.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::{Map, Value};

use journey_core::ids::to_wire_tree;
use journey_core::sanitize::sanitize;
use journey_core::{CoreError, DraftPatch, JourneyDraft, ObjectId};

use crate::medium::{DraftMedium, MemoryMedium};

/// Fixed key under which the draft is persisted.
pub const DEFAULT_DRAFT_KEY: &str = "journeyDraft";

/// Errors returned for writes that cannot be applied.
///
/// Persistence failures are not errors here; they are logged and the
/// in-memory draft is kept.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid draft patch: {0}")]
    InvalidPatch(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

struct StoreState {
    /// `None` until the first read loads the persisted copy.
    draft: Option<JourneyDraft>,
    /// Bumped whenever the draft is cleared or replaced wholesale.
    generation: u64,
}

/// Session-scoped owner of the in-progress draft.
pub struct DraftStore {
    medium: Arc<dyn DraftMedium>,
    key: String,
    state: Mutex<StoreState>,
}

impl DraftStore {
    /// Create a store persisting under [`DEFAULT_DRAFT_KEY`].
    pub fn new(medium: Arc<dyn DraftMedium>) -> Self {
        Self::with_key(medium, DEFAULT_DRAFT_KEY)
    }

    pub fn with_key(medium: Arc<dyn DraftMedium>, key: impl Into<String>) -> Self {
        Self {
            medium,
            key: key.into(),
            state: Mutex::new(StoreState {
                draft: None,
                generation: 0,
            }),
        }
    }

    /// A store backed by a fresh [`MemoryMedium`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryMedium::new()))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The current draft, loading it from the medium on first access.
    pub fn get(&self) -> JourneyDraft {
        let mut state = self.lock();
        self.load(&mut state).clone()
    }

    /// Session generation. Changes on [`clear`](Self::clear) and
    /// [`replace`](Self::replace).
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Merge a typed partial update.
    pub fn set(&self, patch: DraftPatch) -> Result<JourneyDraft, StoreError> {
        self.apply(patch.into_fields()?)
    }

    /// Merge an untyped partial update, as produced by UI handlers.
    ///
    /// `patch` must be a JSON object. Stale ids inside it are dropped
    /// before the merge.
    pub fn set_json(&self, patch: Value) -> Result<JourneyDraft, StoreError> {
        match patch {
            Value::Object(fields) => self.apply(fields),
            other => Err(StoreError::InvalidPatch(format!(
                "expected a JSON object, found {other}"
            ))),
        }
    }

    /// Record the remote id assigned to this draft.
    ///
    /// Ignored when the session `generation` has moved on since the
    /// caller read it, so a sync that finishes after a discard cannot
    /// resurrect the old draft. Returns whether the id was stored.
    pub fn set_draft_id(&self, id: ObjectId, generation: u64) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            tracing::info!(
                draft_id = %id,
                expected = generation,
                current = state.generation,
                "Draft was replaced before its remote id arrived; not storing it",
            );
            return false;
        }

        let mut draft = self.load(&mut state).clone();
        draft.draft_id = Some(id);
        draft.last_saved = Some(Utc::now());
        self.persist(&draft);
        state.draft = Some(draft);
        true
    }

    /// Replace the whole draft, starting a new generation.
    pub fn replace(&self, mut draft: JourneyDraft) -> JourneyDraft {
        let mut state = self.lock();
        draft.last_saved = Some(Utc::now());
        self.persist(&draft);
        state.generation += 1;
        state.draft = Some(draft.clone());
        draft
    }

    /// Discard the draft, in memory and in the medium.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.draft = Some(JourneyDraft::default());
        if let Err(e) = self.medium.remove(&self.key) {
            tracing::warn!(key = %self.key, error = %e, "Failed to remove persisted draft");
        }
    }

    // ---- private helpers ----

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load<'a>(&self, state: &'a mut StoreState) -> &'a JourneyDraft {
        state.draft.get_or_insert_with(|| self.read_persisted())
    }

    fn apply(&self, patch: Map<String, Value>) -> Result<JourneyDraft, StoreError> {
        let clean = sanitize(Value::Object(patch));
        for path in &clean.dropped {
            tracing::debug!(path = %path, "Dropped stale id from draft patch");
        }
        let Value::Object(patch) = clean.value else {
            return Err(StoreError::InvalidPatch("patch is not an object".into()));
        };

        let mut state = self.lock();
        let current = self.load(&mut state);

        let Value::Object(mut merged) = serde_json::to_value(current).map_err(CoreError::from)?
        else {
            return Err(StoreError::InvalidPatch(
                "stored draft is not an object".into(),
            ));
        };

        for (key, value) in patch {
            match key.as_str() {
                // Only a canonical id may replace the remote id.
                "draftId" if !value.is_string() => continue,
                "lastSaved" => continue,
                _ => {
                    merged.insert(key, value);
                }
            }
        }

        let mut draft: JourneyDraft = serde_json::from_value(Value::Object(merged))
            .map_err(|e| StoreError::InvalidPatch(e.to_string()))?;
        draft.last_saved = Some(Utc::now());

        self.persist(&draft);
        state.draft = Some(draft.clone());
        Ok(draft)
    }

    /// Write the wire-encoded draft. Failures are logged, not returned.
    fn persist(&self, draft: &JourneyDraft) {
        let encoded = serde_json::to_value(draft)
            .map(to_wire_tree)
            .and_then(|tree| serde_json::to_string(&tree));

        let result = match encoded {
            Ok(contents) => self.medium.write(&self.key, &contents).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        if let Err(error) = result {
            tracing::warn!(
                key = %self.key,
                error = %error,
                "Failed to persist draft locally; keeping in-memory copy",
            );
        }
    }

    /// Load and sanitize the persisted draft, falling back to an empty
    /// draft when nothing usable is stored.
    fn read_persisted(&self) -> JourneyDraft {
        let raw = match self.medium.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return JourneyDraft::default(),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read persisted draft");
                return JourneyDraft::default();
            }
        };

        match decode_draft(&raw) {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Discarding unreadable persisted draft");
                JourneyDraft::default()
            }
        }
    }
}

/// Parse a persisted draft, unwrapping wire ids and dropping stale ones.
pub fn decode_draft(raw: &str) -> Result<JourneyDraft, CoreError> {
    let tree: Value = serde_json::from_str(raw)?;
    let clean = sanitize(tree);
    for path in &clean.dropped {
        tracing::debug!(path = %path, "Dropped stale id from persisted draft");
    }
    Ok(serde_json::from_value(clean.value)?)
}
