//! Integration tests for create-or-update against a recording fake remote.
//!
//! Covers id resolution across consecutive saves, stale module ids,
//! rejected returned ids, payload shape and transient-failure retry.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;

use common::{id, syncable_patch, upserter, Call, FakeRemote, ORG_ID};
use journey_core::types::Journey;
use journey_core::DraftPatch;
use journey_store::DraftStore;
use journey_sync::{DraftUpserter, RemoteError, RetryConfig, StaticIdentity, UpsertError};

const FIRST_ID: &str = "000000000000000000000001";

fn setup() -> (Arc<DraftStore>, Arc<FakeRemote>, DraftUpserter) {
    let store = Arc::new(DraftStore::in_memory());
    let remote = Arc::new(FakeRemote::new());
    let upserter = upserter(&store, &remote);
    (store, remote, upserter)
}

// ---------------------------------------------------------------------------
// First and second save
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_save_creates_and_records_id() {
    let (store, remote, upserter) = setup();
    store.set(syncable_patch("Onboarding")).unwrap();

    let result = upserter.upsert(None).await.unwrap();

    assert!(result.created);
    assert_eq!(result.id, id(FIRST_ID));
    assert_eq!(remote.creates(), 1);
    assert_eq!(store.get().draft_id, Some(id(FIRST_ID)));
}

#[tokio::test]
async fn second_save_updates_same_document() {
    let (store, remote, upserter) = setup();
    store.set(syncable_patch("Onboarding")).unwrap();
    upserter.upsert(None).await.unwrap();

    store
        .set(DraftPatch::new().journey(Journey::new("Onboarding v2")))
        .unwrap();
    let result = upserter.upsert(None).await.unwrap();

    assert!(!result.created);
    assert_eq!(result.id, id(FIRST_ID));
    assert_eq!(remote.creates(), 1);
    assert_eq!(remote.updates(), vec![id(FIRST_ID)]);
    assert_matches!(
        remote.calls().last(),
        Some(Call::Update(_, payload)) if payload["journey"]["title"] == "Onboarding v2"
    );
}

#[tokio::test]
async fn explicit_id_overrides_stored_id() {
    let (store, remote, upserter) = setup();
    store.set(syncable_patch("Onboarding")).unwrap();
    upserter.upsert(None).await.unwrap();

    let explicit = "65a1f0c2e4b0a1b2c3d4e5f9";
    let result = upserter.upsert(Some(explicit)).await.unwrap();

    assert_eq!(result.id, id(explicit));
    assert_eq!(remote.updates(), vec![id(explicit)]);
}

#[tokio::test]
async fn invalid_explicit_id_creates() {
    let (store, remote, upserter) = setup();
    store.set(syncable_patch("Onboarding")).unwrap();

    let result = upserter.upsert(Some("temp-1706000000000")).await.unwrap();

    assert!(result.created);
    assert_eq!(remote.creates(), 1);
}

#[tokio::test]
async fn invalid_explicit_id_updates_stored_draft() {
    let (store, remote, upserter) = setup();
    store.set(syncable_patch("Onboarding")).unwrap();
    upserter.upsert(None).await.unwrap();

    let result = upserter.upsert(Some("temp-1706000000000")).await.unwrap();

    assert!(!result.created);
    assert_eq!(remote.creates(), 1);
    assert_eq!(remote.updates(), vec![id(FIRST_ID)]);
    assert_eq!(store.get().draft_id, Some(id(FIRST_ID)));
}

// ---------------------------------------------------------------------------
// Stale ids
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_module_id_is_sent_as_new_content() {
    let (store, remote, upserter) = setup();
    store.set(syncable_patch("Onboarding")).unwrap();
    upserter.upsert(None).await.unwrap();

    store
        .set_json(json!({
            "modules": [{"id": "temp-1706000000000", "title": "Added offline"}]
        }))
        .unwrap();
    assert_eq!(store.get().modules[0].id, None);

    upserter.upsert(None).await.unwrap();

    let Some(Call::Update(target, payload)) = remote.calls().last().cloned() else {
        panic!("expected an update");
    };
    assert_eq!(target, id(FIRST_ID));
    assert!(payload["modules"][0].get("id").is_none());
    assert_eq!(payload["modules"][0]["title"], "Added offline");
}

#[tokio::test]
async fn non_canonical_returned_id_is_not_stored() {
    let (store, remote, upserter) = setup();
    store.set(syncable_patch("Onboarding")).unwrap();
    remote.respond_to_create_with(json!({"id": "not-an-id"}));

    let err = upserter.upsert(None).await.unwrap_err();
    assert_matches!(err, UpsertError::InvalidReturnedId(raw) if raw == "not-an-id");
    assert_eq!(store.get().draft_id, None);

    // The next attempt creates again.
    upserter.upsert(None).await.unwrap_err();
    assert_eq!(remote.creates(), 2);
    assert!(remote.updates().is_empty());
}

#[tokio::test]
async fn missing_returned_id_is_an_error() {
    let (store, remote, upserter) = setup();
    store.set(syncable_patch("Onboarding")).unwrap();
    remote.respond_to_create_with(json!({"ok": true}));

    assert_matches!(
        upserter.upsert(None).await,
        Err(UpsertError::MissingReturnedId)
    );
    assert_eq!(store.get().draft_id, None);
}

// ---------------------------------------------------------------------------
// Payload shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payload_has_no_document_id_and_carries_organization() {
    let (store, remote, upserter) = setup();
    store.set(syncable_patch("Onboarding")).unwrap();
    upserter.upsert(None).await.unwrap();
    upserter.upsert(None).await.unwrap();

    for call in remote.calls() {
        let payload = match call {
            Call::Create(p) | Call::Update(_, p) => p,
            Call::Fetch(_) => continue,
        };
        assert!(payload.get("_id").is_none());
        assert_eq!(payload["organizationId"], json!({"$oid": ORG_ID}));
        assert_eq!(payload["modules"][0]["order"], 0);
    }
}

#[tokio::test]
async fn non_canonical_organization_is_sent_verbatim() {
    let store = Arc::new(DraftStore::in_memory());
    let remote = Arc::new(FakeRemote::new());
    let upserter = DraftUpserter::new(
        Arc::clone(&store),
        remote.clone(),
        Arc::new(StaticIdentity::new(Some("acme".into()))),
    );
    store.set(syncable_patch("Onboarding")).unwrap();

    let result = upserter.upsert(None).await.unwrap();
    assert_eq!(result.payload["organizationId"], "acme");
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failures_are_not_retried_by_default() {
    let (store, remote, upserter) = setup();
    store.set(syncable_patch("Onboarding")).unwrap();
    remote.fail_next(RemoteError::Transport("connection reset".into()));

    assert_matches!(
        upserter.upsert(None).await,
        Err(UpsertError::Remote(RemoteError::Transport(_)))
    );
    assert_eq!(remote.creates(), 1);
    assert_eq!(store.get().draft_id, None);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_when_enabled() {
    let (store, remote, upserter) = setup();
    let upserter = upserter.with_retry(RetryConfig {
        initial_delay: Duration::from_millis(100),
        ..RetryConfig::default().with_max_retries(2)
    });
    store.set(syncable_patch("Onboarding")).unwrap();
    remote.fail_next(RemoteError::Api {
        status: 503,
        body: "unavailable".into(),
    });
    remote.fail_next(RemoteError::Transport("connection reset".into()));

    let result = upserter.upsert(None).await.unwrap();

    assert!(result.created);
    assert_eq!(remote.creates(), 3);
    assert_eq!(store.get().draft_id, Some(result.id));
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_not_retried() {
    let (store, remote, upserter) = setup();
    let upserter = upserter.with_retry(RetryConfig::default().with_max_retries(3));
    store.set(syncable_patch("Onboarding")).unwrap();
    remote.fail_next(RemoteError::Api {
        status: 422,
        body: "bad document".into(),
    });

    assert_matches!(
        upserter.upsert(None).await,
        Err(UpsertError::Remote(RemoteError::Api { status: 422, .. }))
    );
    assert_eq!(remote.creates(), 1);
}
