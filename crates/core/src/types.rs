//! Author-facing draft model.
//!
//! Field names serialize in camelCase, the convention shared by the local
//! cache and the remote store. Durations are in hours here; conversion to
//! minutes happens only in [`crate::projector`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::ids::ObjectId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Default score for a question that does not set its own.
pub const DEFAULT_QUESTION_POINTS: u32 = 1;

fn default_points() -> u32 {
    DEFAULT_QUESTION_POINTS
}

// ---------------------------------------------------------------------------
// JourneyDraft
// ---------------------------------------------------------------------------

/// The unit of persistence: one in-progress journey edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JourneyDraft {
    pub company: Option<Value>,
    pub journey: Option<Journey>,
    pub methodology: Option<Value>,
    pub uploads: Vec<UploadRef>,
    pub modules: Vec<Module>,
    /// Authoring cursor, opaque to persistence.
    pub current_step: u32,
    pub selected_gig_id: Option<ObjectId>,
    /// Stamped by the store on every local write.
    pub last_saved: Option<Timestamp>,
    /// Remote id, set only after a confirmed create.
    pub draft_id: Option<ObjectId>,
}

impl JourneyDraft {
    /// A draft is worth sending upstream only once it has a journey and
    /// at least one module.
    pub fn is_syncable(&self) -> bool {
        self.journey.is_some() && !self.modules.is_empty()
    }

    pub fn journey_id(&self) -> Option<&ObjectId> {
        self.journey.as_ref().and_then(|j| j.id.as_ref())
    }

    /// Check every assessment question. Syncing does not require this;
    /// callers run it before launch.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.modules
            .iter()
            .flat_map(|m| &m.assessments)
            .try_for_each(AssessmentQuestion::validate)
    }
}

/// The journey (course) being authored.
///
/// Fields this model does not know about are carried in `extra` so they
/// survive a round trip through the cache and the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    #[serde(default)]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Journey {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// A content upload attached to the journey.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRef {
    #[serde(default)]
    pub id: Option<ObjectId>,
    pub file_name: String,
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// One module of a journey.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Module {
    /// Absent until the module exists upstream.
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    /// Hours.
    pub duration: f64,
    pub difficulty: Difficulty,
    pub learning_objectives: Vec<String>,
    pub prerequisites: Vec<String>,
    pub topics: Vec<String>,
    pub sections: Vec<Section>,
    pub assessments: Vec<AssessmentQuestion>,
}

impl Module {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default)]
    pub id: Option<ObjectId>,
    pub title: String,
    /// Hours.
    #[serde(default)]
    pub duration: f64,
    pub content: SectionContent,
}

/// What a section presents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SectionContent {
    Document {
        #[serde(default)]
        id: Option<ObjectId>,
        file_name: String,
        url: String,
    },
    Text {
        body: String,
    },
    Video {
        #[serde(default)]
        id: Option<ObjectId>,
        url: String,
        #[serde(default)]
        provider: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Document,
    Text,
    Video,
}

impl SectionContent {
    pub fn kind(&self) -> SectionKind {
        match self {
            Self::Document { .. } => SectionKind::Document,
            Self::Text { .. } => SectionKind::Text,
            Self::Video { .. } => SectionKind::Video,
        }
    }
}

// ---------------------------------------------------------------------------
// AssessmentQuestion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentQuestion {
    #[serde(default)]
    pub id: Option<ObjectId>,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default)]
    pub time_limit_secs: Option<u32>,
}

/// Answer shape of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum QuestionKind {
    MultipleChoice {
        options: Vec<String>,
        correct_index: usize,
    },
    TrueFalse {
        answer: bool,
    },
    MultipleCorrect {
        options: Vec<String>,
        correct_indices: Vec<usize>,
    },
}

impl AssessmentQuestion {
    pub fn new(prompt: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: None,
            prompt: prompt.into(),
            kind,
            explanation: None,
            points: DEFAULT_QUESTION_POINTS,
            time_limit_secs: None,
        }
    }

    /// Check that the answer key fits the options.
    pub fn validate(&self) -> Result<(), CoreError> {
        let fail = |msg: String| Err(CoreError::Validation(format!("{:?}: {msg}", self.prompt)));
        match &self.kind {
            QuestionKind::MultipleChoice {
                options,
                correct_index,
            } => {
                if options.len() < 2 {
                    return fail("multiple-choice needs at least two options".into());
                }
                if *correct_index >= options.len() {
                    return fail(format!(
                        "correct index {correct_index} out of range for {} options",
                        options.len()
                    ));
                }
            }
            QuestionKind::TrueFalse { .. } => {}
            QuestionKind::MultipleCorrect {
                options,
                correct_indices,
            } => {
                if options.len() < 2 {
                    return fail("multiple-correct needs at least two options".into());
                }
                if correct_indices.is_empty() {
                    return fail("multiple-correct needs at least one correct option".into());
                }
                if let Some(bad) = correct_indices.iter().find(|&&i| i >= options.len()) {
                    return fail(format!(
                        "correct index {bad} out of range for {} options",
                        options.len()
                    ));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DraftPatch
// ---------------------------------------------------------------------------

/// A partial update merged into the stored draft.
///
/// Only fields that were set are serialized. `lastSaved` is not part of
/// a patch; the store stamps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Option<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journey: Option<Option<Journey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methodology: Option<Option<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploads: Option<Vec<UploadRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<Module>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_gig_id: Option<Option<ObjectId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<ObjectId>,
}

impl DraftPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn company(mut self, company: Value) -> Self {
        self.company = Some(Some(company));
        self
    }

    pub fn journey(mut self, journey: Journey) -> Self {
        self.journey = Some(Some(journey));
        self
    }

    pub fn methodology(mut self, methodology: Value) -> Self {
        self.methodology = Some(Some(methodology));
        self
    }

    pub fn uploads(mut self, uploads: Vec<UploadRef>) -> Self {
        self.uploads = Some(uploads);
        self
    }

    pub fn modules(mut self, modules: Vec<Module>) -> Self {
        self.modules = Some(modules);
        self
    }

    pub fn current_step(mut self, step: u32) -> Self {
        self.current_step = Some(step);
        self
    }

    pub fn selected_gig_id(mut self, gig: Option<ObjectId>) -> Self {
        self.selected_gig_id = Some(gig);
        self
    }

    pub fn draft_id(mut self, id: ObjectId) -> Self {
        self.draft_id = Some(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The patch as a JSON object of the fields that were set.
    pub fn into_fields(self) -> Result<Map<String, Value>, CoreError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(CoreError::Validation(format!(
                "draft patch serialized to {other}, expected an object"
            ))),
        }
    }
}
