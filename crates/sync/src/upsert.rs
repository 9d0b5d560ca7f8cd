//! Create-or-update against the remote store.
//!
//! [`DraftUpserter::upsert`] re-reads the store, resolves which remote id
//! (if any) the draft already has, and issues an update to that id or a
//! create. On success the returned id is validated and written back into
//! the store before the call returns, so any later attempt takes the
//! update path. At most one create happens per draft as long as upserts
//! do not overlap; [`crate::scheduler::SyncScheduler`] guarantees that.

use std::sync::Arc;

use serde_json::Value;

use journey_core::ids::{extract_canonical_id, is_canonical, wrap_id};
use journey_core::projector::{strip_document_id, to_wire};
use journey_core::{CoreError, JourneyDraft, ObjectId};
use journey_store::DraftStore;

use crate::remote::{IdentityContext, RemoteDraftStore, RemoteError};
use crate::retry::{next_delay, RetryConfig};

/// Payload key carrying the tenant id.
const ORGANIZATION_KEY: &str = "organizationId";

/// Result of a successful upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertResult {
    /// Remote id of the document, now stored as the draft id.
    pub id: ObjectId,
    /// The wire document that was sent.
    pub payload: Value,
    /// `true` when the document was created by this call.
    pub created: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum UpsertError {
    #[error("Draft could not be projected: {0}")]
    Projection(#[from] CoreError),

    #[error("Remote request failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("Remote store returned a non-canonical id: {0:?}")]
    InvalidReturnedId(String),

    #[error("Remote store response carried no id")]
    MissingReturnedId,
}

/// Issues create/update requests for the draft held in a [`DraftStore`].
pub struct DraftUpserter {
    store: Arc<DraftStore>,
    remote: Arc<dyn RemoteDraftStore>,
    identity: Arc<dyn IdentityContext>,
    retry: RetryConfig,
}

impl DraftUpserter {
    pub fn new(
        store: Arc<DraftStore>,
        remote: Arc<dyn RemoteDraftStore>,
        identity: Arc<dyn IdentityContext>,
    ) -> Self {
        Self {
            store,
            remote,
            identity,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<DraftStore> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn RemoteDraftStore> {
        &self.remote
    }

    /// Create or update the remote document for the current draft.
    ///
    /// `explicit_id` takes priority over the stored draft id, which takes
    /// priority over the journey's own id. A non-canonical explicit id is
    /// discarded; the call creates only when no stored id remains.
    pub async fn upsert(&self, explicit_id: Option<&str>) -> Result<UpsertResult, UpsertError> {
        // Read as late as possible so the id decision sees every edit.
        let generation = self.store.generation();
        let draft = self.store.get();
        let target = resolve_target(&draft, explicit_id);

        let payload = self.build_payload(&draft)?;

        let response = match &target {
            Some(id) => {
                tracing::debug!(draft_id = %id, "Updating remote journey document");
                self.send(Some(id), &payload).await?
            }
            None => {
                tracing::debug!("Creating remote journey document");
                self.send(None, &payload).await?
            }
        };

        let id = returned_id(&response)?;
        self.store.set_draft_id(id.clone(), generation);

        let created = target.is_none();
        tracing::info!(
            draft_id = %id,
            created,
            modules = draft.modules.len(),
            "Journey draft synced",
        );

        Ok(UpsertResult {
            id,
            payload,
            created,
        })
    }

    // ---- private helpers ----

    fn build_payload(&self, draft: &JourneyDraft) -> Result<Value, UpsertError> {
        let Value::Object(mut payload) = to_wire(draft)? else {
            return Err(CoreError::Validation("wire document is not an object".into()).into());
        };
        strip_document_id(&mut payload);

        if let Some(org) = self.identity.organization_id() {
            payload.insert(ORGANIZATION_KEY.to_string(), wrap_id(&org));
        }

        Ok(Value::Object(payload))
    }

    /// Send one create/update, retrying transient failures per the
    /// configured policy.
    async fn send(&self, target: Option<&ObjectId>, payload: &Value) -> Result<Value, RemoteError> {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0u32;

        loop {
            let result = match target {
                Some(id) => self.remote.update(id, payload).await,
                None => self.remote.create(payload).await,
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Remote write failed, retrying",
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay, &self.retry);
                }
                other => return other,
            }
        }
    }
}

/// Pick the remote id the draft should be written to, if any.
///
/// A non-canonical explicit id is ignored and resolution falls through to
/// the stored `draftId`, then the journey id.
pub fn resolve_target(draft: &JourneyDraft, explicit_id: Option<&str>) -> Option<ObjectId> {
    let explicit = explicit_id.and_then(|raw| match ObjectId::parse(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::debug!(id = raw, "Ignoring non-canonical explicit id");
            None
        }
    });

    explicit
        .or_else(|| draft.draft_id.clone())
        .or_else(|| draft.journey_id().cloned())
}

/// Extract the document id from a create/update response.
///
/// Accepts `_id` or `id` at the top level or inside a `data` envelope, in
/// either canonical or wire encoding.
pub fn returned_id(response: &Value) -> Result<ObjectId, UpsertError> {
    let candidate = [response, &response["data"]]
        .into_iter()
        .flat_map(|v| [v.get("_id"), v.get("id")])
        .flatten()
        .find(|v| !v.is_null());

    let raw = candidate
        .and_then(extract_canonical_id)
        .ok_or(UpsertError::MissingReturnedId)?;

    if !is_canonical(&raw) {
        tracing::error!(id = %raw, "Remote store returned a non-canonical id");
        return Err(UpsertError::InvalidReturnedId(raw));
    }
    ObjectId::parse(&raw).map_err(|_| UpsertError::InvalidReturnedId(raw))
}
