//! Reshaping between the flat draft and the nested remote document.
//!
//! The remote store expects each module to embed ordered `sections` and
//! `quizzes`, with durations in minutes. [`to_wire`] builds that shape and
//! encodes ids for the wire; [`from_wire`] is its inverse and is used to
//! hydrate a draft from a previously saved document. Ids that are not
//! canonical are dropped on the way in, so the round trip is exact only
//! for drafts whose ids are canonical or absent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::ids::{self, ObjectId};
use crate::sanitize::sanitize;
use crate::types::{
    AssessmentQuestion, Difficulty, Journey, JourneyDraft, Module, QuestionKind, Section,
    SectionContent, SectionKind, Timestamp, UploadRef,
};

/// Minutes per author-facing hour.
const MINUTES_PER_HOUR: f64 = 60.0;

/// Passing score (percent) attached to every generated quiz.
pub const DEFAULT_PASSING_SCORE: u32 = 70;

/// Per-question time budget used when a question sets none.
pub const DEFAULT_QUESTION_TIME_SECS: u32 = 60;

/// Answer labels for true/false questions, in wire order.
const TRUE_FALSE_OPTIONS: [&str; 2] = ["True", "False"];

// ---------------------------------------------------------------------------
// Wire document
// ---------------------------------------------------------------------------

/// The nested document exchanged with the remote store (ids in canonical
/// form; [`to_wire`] applies the wire encoding on top).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub company: Option<Value>,
    #[serde(default)]
    pub journey: Option<Journey>,
    #[serde(default)]
    pub methodology: Option<Value>,
    #[serde(default)]
    pub uploads: Vec<UploadRef>,
    #[serde(default)]
    pub modules: Vec<WireModule>,
    #[serde(default)]
    pub authoring: AuthoringState,
}

/// Authoring cursor carried alongside the document so a resumed draft
/// reopens where it was left.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthoringState {
    pub current_step: u32,
    pub selected_gig_id: Option<ObjectId>,
    pub last_saved: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireModule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub order: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Minutes.
    #[serde(default)]
    pub duration: f64,
    /// Author-facing hours, kept so hydration restores the exact input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub sections: Vec<WireSection>,
    #[serde(default)]
    pub quizzes: Vec<WireQuiz>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub order: u32,
    pub content: Value,
    /// Minutes.
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuiz {
    pub title: String,
    pub passing_score: u32,
    pub total_points: u32,
    pub time_limit_minutes: u32,
    pub questions: Vec<WireQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    MultipleCorrect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub order: u32,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answers: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<u32>,
}

/// Document content payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    file_name: String,
    url: String,
}

/// Video content payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
}

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

fn to_minutes(hours: f64) -> f64 {
    hours * MINUTES_PER_HOUR
}

/// Prefer the carried hours when they still agree with the minutes; a
/// document edited elsewhere may have changed only the minutes.
fn to_hours(minutes: f64, hours: Option<f64>) -> f64 {
    match hours {
        Some(hours) if to_minutes(hours) == minutes => hours,
        _ => minutes / MINUTES_PER_HOUR,
    }
}

// ---------------------------------------------------------------------------
// Draft -> document
// ---------------------------------------------------------------------------

/// Project a draft into the wire JSON sent to the remote store.
pub fn to_wire(draft: &JourneyDraft) -> Result<Value, CoreError> {
    let document = to_document(draft)?;
    Ok(ids::to_wire_tree(serde_json::to_value(&document)?))
}

/// Project a draft into the typed nested document.
pub fn to_document(draft: &JourneyDraft) -> Result<JourneyDocument, CoreError> {
    let modules = draft
        .modules
        .iter()
        .zip(0u32..)
        .map(|(module, order)| project_module(module, order))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(JourneyDocument {
        id: draft.draft_id.clone(),
        company: draft.company.clone(),
        journey: draft.journey.clone(),
        methodology: draft.methodology.clone(),
        uploads: draft.uploads.clone(),
        modules,
        authoring: AuthoringState {
            current_step: draft.current_step,
            selected_gig_id: draft.selected_gig_id.clone(),
            last_saved: draft.last_saved,
        },
    })
}

fn project_module(module: &Module, order: u32) -> Result<WireModule, CoreError> {
    let sections = module
        .sections
        .iter()
        .zip(0u32..)
        .map(|(section, order)| project_section(section, order))
        .collect::<Result<Vec<_>, _>>()?;

    let quizzes = if module.assessments.is_empty() {
        Vec::new()
    } else {
        vec![project_quiz(module)]
    };

    Ok(WireModule {
        id: module.id.clone(),
        order,
        title: module.title.clone(),
        description: module.description.clone(),
        duration: to_minutes(module.duration),
        duration_hours: Some(module.duration),
        difficulty: module.difficulty,
        learning_objectives: module.learning_objectives.clone(),
        prerequisites: module.prerequisites.clone(),
        topics: module.topics.clone(),
        sections,
        quizzes,
    })
}

fn project_section(section: &Section, order: u32) -> Result<WireSection, CoreError> {
    let content = match &section.content {
        SectionContent::Document { id, file_name, url } => serde_json::to_value(DocumentBody {
            id: id.clone(),
            file_name: file_name.clone(),
            url: url.clone(),
        })?,
        SectionContent::Text { body } => Value::String(body.clone()),
        SectionContent::Video { id, url, provider } => serde_json::to_value(VideoBody {
            id: id.clone(),
            url: url.clone(),
            provider: provider.clone(),
        })?,
    };

    Ok(WireSection {
        id: section.id.clone(),
        title: section.title.clone(),
        kind: section.content.kind(),
        order,
        content,
        duration: to_minutes(section.duration),
        duration_hours: Some(section.duration),
    })
}

/// Fold a module's flat assessment list into a single ordered quiz.
fn project_quiz(module: &Module) -> WireQuiz {
    let questions: Vec<_> = module
        .assessments
        .iter()
        .zip(0u32..)
        .map(|(question, order)| project_question(question, order))
        .collect();

    let total_points = questions.iter().map(|q| q.points).sum();
    let time_limit_secs: u32 = questions
        .iter()
        .map(|q| q.time_limit_seconds.unwrap_or(DEFAULT_QUESTION_TIME_SECS))
        .sum();

    WireQuiz {
        title: format!("{} Quiz", module.title),
        passing_score: DEFAULT_PASSING_SCORE,
        total_points,
        time_limit_minutes: time_limit_secs.div_ceil(60),
        questions,
    }
}

fn project_question(question: &AssessmentQuestion, order: u32) -> WireQuestion {
    // Incomplete questions are normal mid-edit; they are sent as they are.
    if let Err(e) = question.validate() {
        tracing::warn!(order, error = %e, "Projecting incomplete assessment question");
    }

    let (kind, options, correct_answers) = match &question.kind {
        QuestionKind::MultipleChoice {
            options,
            correct_index,
        } => (QuestionType::MultipleChoice, options.clone(), vec![*correct_index]),
        QuestionKind::TrueFalse { answer } => (
            QuestionType::TrueFalse,
            TRUE_FALSE_OPTIONS.iter().map(|s| s.to_string()).collect(),
            vec![if *answer { 0 } else { 1 }],
        ),
        QuestionKind::MultipleCorrect {
            options,
            correct_indices,
        } => (
            QuestionType::MultipleCorrect,
            options.clone(),
            correct_indices.clone(),
        ),
    };

    WireQuestion {
        id: question.id.clone(),
        order,
        question: question.prompt.clone(),
        kind,
        options,
        correct_answers,
        explanation: question.explanation.clone(),
        points: question.points,
        time_limit_seconds: question.time_limit_secs,
    }
}

// ---------------------------------------------------------------------------
// Document -> draft
// ---------------------------------------------------------------------------

/// Hydrate a draft from wire JSON returned by the remote store.
///
/// Wire ids are unwrapped and non-canonical ids dropped before typing.
pub fn from_wire(wire: Value) -> Result<JourneyDraft, CoreError> {
    let clean = sanitize(wire);
    if !clean.is_clean() {
        tracing::debug!(dropped = ?clean.dropped, "Dropped stale ids from remote document");
    }
    let document: JourneyDocument = serde_json::from_value(clean.value)?;
    from_document(document)
}

/// Inverse of [`to_document`].
pub fn from_document(document: JourneyDocument) -> Result<JourneyDraft, CoreError> {
    let mut modules = document.modules;
    modules.sort_by_key(|m| m.order);

    let modules = modules
        .into_iter()
        .map(hydrate_module)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(JourneyDraft {
        company: document.company,
        journey: document.journey,
        methodology: document.methodology,
        uploads: document.uploads,
        modules,
        current_step: document.authoring.current_step,
        selected_gig_id: document.authoring.selected_gig_id,
        last_saved: document.authoring.last_saved,
        draft_id: document.id,
    })
}

fn hydrate_module(module: WireModule) -> Result<Module, CoreError> {
    let mut sections = module.sections;
    sections.sort_by_key(|s| s.order);
    let sections = sections
        .into_iter()
        .map(hydrate_section)
        .collect::<Result<Vec<_>, _>>()?;

    let mut questions: Vec<WireQuestion> = module
        .quizzes
        .into_iter()
        .flat_map(|quiz| quiz.questions)
        .collect();
    questions.sort_by_key(|q| q.order);
    let assessments = questions
        .into_iter()
        .map(hydrate_question)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Module {
        id: module.id,
        title: module.title,
        description: module.description,
        duration: to_hours(module.duration, module.duration_hours),
        difficulty: module.difficulty,
        learning_objectives: module.learning_objectives,
        prerequisites: module.prerequisites,
        topics: module.topics,
        sections,
        assessments,
    })
}

fn hydrate_section(section: WireSection) -> Result<Section, CoreError> {
    let content = match section.kind {
        SectionKind::Document => {
            let body: DocumentBody = serde_json::from_value(section.content)?;
            SectionContent::Document {
                id: body.id,
                file_name: body.file_name,
                url: body.url,
            }
        }
        SectionKind::Text => match section.content {
            Value::String(body) => SectionContent::Text { body },
            other => {
                return Err(CoreError::Validation(format!(
                    "text section {:?} has non-string content: {other}",
                    section.title
                )))
            }
        },
        SectionKind::Video => {
            let body: VideoBody = serde_json::from_value(section.content)?;
            SectionContent::Video {
                id: body.id,
                url: body.url,
                provider: body.provider,
            }
        }
    };

    Ok(Section {
        id: section.id,
        title: section.title,
        duration: to_hours(section.duration, section.duration_hours),
        content,
    })
}

fn hydrate_question(question: WireQuestion) -> Result<AssessmentQuestion, CoreError> {
    let single_answer = |answers: &[usize]| match answers {
        [only] => Ok(*only),
        _ => Err(CoreError::Validation(format!(
            "question {:?} expects exactly one correct answer, found {}",
            question.question,
            answers.len()
        ))),
    };

    let kind = match question.kind {
        QuestionType::MultipleChoice => QuestionKind::MultipleChoice {
            options: question.options.clone(),
            correct_index: single_answer(&question.correct_answers)?,
        },
        QuestionType::TrueFalse => {
            let index = single_answer(&question.correct_answers)?;
            if index > 1 {
                return Err(CoreError::Validation(format!(
                    "true/false question {:?} has answer index {index}",
                    question.question
                )));
            }
            QuestionKind::TrueFalse { answer: index == 0 }
        }
        QuestionType::MultipleCorrect => QuestionKind::MultipleCorrect {
            options: question.options.clone(),
            correct_indices: question.correct_answers.clone(),
        },
    };

    Ok(AssessmentQuestion {
        id: question.id,
        prompt: question.question,
        kind,
        explanation: question.explanation,
        points: question.points,
        time_limit_secs: question.time_limit_seconds,
    })
}

/// Remove the top-level `_id` from a wire document. Create requests must
/// not carry one; update requests address the id in the URL instead.
pub fn strip_document_id(wire: &mut Map<String, Value>) -> Option<Value> {
    wire.remove("_id")
}
