//! Integration tests for the draft <-> remote document projection.

use serde_json::{json, Value};

use journey_core::ids::{is_canonical, WIRE_ID_KEY};
use journey_core::projector::{from_wire, to_document, to_wire, DEFAULT_PASSING_SCORE};
use journey_core::sanitize::sanitize;
use journey_core::types::{
    AssessmentQuestion, Difficulty, Journey, QuestionKind, Section, SectionContent, UploadRef,
};
use journey_core::{JourneyDraft, Module, ObjectId};

fn oid(n: u32) -> ObjectId {
    ObjectId::parse(&format!("65a1f0c2e4b0a1b2c3d4{n:04x}")).unwrap()
}

fn section(title: &str, hours: f64, content: SectionContent) -> Section {
    Section {
        id: None,
        title: title.into(),
        duration: hours,
        content,
    }
}

fn rich_draft() -> JourneyDraft {
    let mut intro = Module::new("Introduction");
    intro.id = Some(oid(1));
    intro.duration = 0.5;
    intro.difficulty = Difficulty::Beginner;
    intro.learning_objectives = vec!["Know the site layout".into()];
    intro.sections = vec![
        section(
            "Welcome",
            0.25,
            SectionContent::Text {
                body: "Welcome aboard".into(),
            },
        ),
        section(
            "Site map",
            0.25,
            SectionContent::Document {
                id: Some(oid(2)),
                file_name: "map.pdf".into(),
                url: "https://files.example.com/map.pdf".into(),
            },
        ),
    ];

    let mut safety = Module::new("Safety");
    safety.duration = 1.25;
    safety.difficulty = Difficulty::Intermediate;
    safety.sections = vec![section(
        "Evacuation drill",
        1.0,
        SectionContent::Video {
            id: None,
            url: "https://video.example.com/drill".into(),
            provider: Some("vimeo".into()),
        },
    )];
    safety.assessments = vec![
        AssessmentQuestion::new("Helmets required?", QuestionKind::TrueFalse { answer: false }),
        AssessmentQuestion {
            explanation: Some("Both exits are marked green.".into()),
            points: 2,
            time_limit_secs: Some(45),
            ..AssessmentQuestion::new(
                "Which exits are safe?",
                QuestionKind::MultipleCorrect {
                    options: vec!["North".into(), "East".into(), "Loading dock".into()],
                    correct_indices: vec![0, 1],
                },
            )
        },
    ];

    JourneyDraft {
        company: Some(json!({"name": "Acme", "industry": "manufacturing"})),
        journey: Some(Journey {
            id: Some(oid(3)),
            ..Journey::new("Plant onboarding")
        }),
        methodology: Some(json!({"style": "blended"})),
        uploads: vec![UploadRef {
            id: Some(oid(4)),
            file_name: "handbook.pdf".into(),
            url: "https://files.example.com/handbook.pdf".into(),
            mime_type: Some("application/pdf".into()),
            size_bytes: Some(52_000),
        }],
        modules: vec![intro, safety],
        current_step: 4,
        selected_gig_id: Some(oid(5)),
        last_saved: Some(chrono::Utc::now()),
        draft_id: Some(oid(6)),
    }
}

/// Durations an author would type that have no exact binary form.
fn uneven_durations() -> JourneyDraft {
    let mut draft = rich_draft();
    for (module, hours) in draft.modules.iter_mut().zip([0.24, 0.71]) {
        module.duration = hours;
        for section in &mut module.sections {
            section.duration = 0.12;
        }
    }
    draft
}

/// Every value under a key named `_id`/`id`/`*Id` must be wire-encoded.
fn assert_ids_wire_encoded(value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if journey_core::ids::is_id_key(key) && !v.is_null() {
                    let inner = v.get(WIRE_ID_KEY).and_then(Value::as_str);
                    assert!(
                        inner.is_some_and(is_canonical),
                        "{key} is not wire-encoded: {v}"
                    );
                } else {
                    assert_ids_wire_encoded(v);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(assert_ids_wire_encoded),
        _ => {}
    }
}

#[test]
fn round_trip_is_exact_for_canonical_drafts() {
    let drafts = [
        rich_draft(),
        JourneyDraft::default(),
        JourneyDraft {
            journey: Some(Journey::new("Bare")),
            modules: vec![Module::new("Only")],
            ..Default::default()
        },
        uneven_durations(),
    ];

    for draft in drafts {
        let back = from_wire(to_wire(&draft).unwrap()).unwrap();
        assert_eq!(back, draft);
    }
}

#[test]
fn wire_document_encodes_every_id() {
    let wire = to_wire(&rich_draft()).unwrap();
    assert_ids_wire_encoded(&wire);
    assert_eq!(wire["authoring"]["selectedGigId"][WIRE_ID_KEY], oid(5).as_str());
}

#[test]
fn document_shape_matches_remote_expectations() {
    let doc = to_document(&rich_draft()).unwrap();

    assert_eq!(doc.modules[0].order, 0);
    assert_eq!(doc.modules[1].order, 1);
    assert_eq!(doc.modules[0].duration, 30.0);
    assert_eq!(doc.modules[1].duration, 75.0);
    assert!(doc.modules[0].quizzes.is_empty());

    let quiz = &doc.modules[1].quizzes[0];
    assert_eq!(quiz.passing_score, DEFAULT_PASSING_SCORE);
    assert_eq!(quiz.total_points, 3);
    // 60s + 45s rounds up to two minutes.
    assert_eq!(quiz.time_limit_minutes, 2);
    assert_eq!(quiz.questions[0].correct_answers, vec![1]);
    assert_eq!(quiz.questions[1].correct_answers, vec![0, 1]);

    let wire = serde_json::to_value(&doc.modules[0].sections[1]).unwrap();
    assert_eq!(wire["type"], "document");
    assert_eq!(wire["content"]["fileName"], "map.pdf");
}

#[test]
fn out_of_order_document_is_hydrated_in_order() {
    let mut wire = to_wire(&rich_draft()).unwrap();
    let modules = wire["modules"].as_array_mut().unwrap();
    modules.reverse();

    let draft = from_wire(wire).unwrap();
    assert_eq!(draft.modules[0].title, "Introduction");
    assert_eq!(draft.modules[1].title, "Safety");
}

#[test]
fn stale_module_id_is_absent_after_sanitize() {
    let raw = json!({
        "draftId": {"$oid": oid(6).as_str()},
        "modules": [
            {"id": "temp-1706000000000", "title": "Offline module"},
            {"_id": {"$oid": oid(1).as_str()}, "title": "Synced module"},
        ],
    });

    let clean = sanitize(raw);
    assert_eq!(clean.dropped, vec!["$.modules[0].id".to_string()]);

    let draft: JourneyDraft = serde_json::from_value(clean.value).unwrap();
    assert_eq!(draft.modules[0].id, None);
    assert_eq!(draft.draft_id, Some(oid(6)));
}

#[test]
fn sanitize_is_idempotent() {
    let raw = json!({
        "selectedGigId": {"_id": oid(5).as_str(), "name": "Forklift gig"},
        "skillIds": [oid(1).as_str(), "bogus", {"$oid": oid(2).as_str()}],
        "modules": [{"id": 1706000000000u64, "title": "M"}],
    });

    let once = sanitize(raw);
    let twice = sanitize(once.value.clone());
    assert_eq!(twice.value, once.value);
    assert!(twice.is_clean());
    assert_eq!(once.value["selectedGigId"], oid(5).as_str());
    assert_eq!(
        once.value["skillIds"],
        json!([oid(1).as_str(), oid(2).as_str()])
    );
}
