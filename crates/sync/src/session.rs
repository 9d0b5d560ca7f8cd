//! Authoring session facade.
//!
//! [`DraftSession`] wires a [`DraftStore`], a [`SyncScheduler`] and a
//! remote store together for one authoring session. UI handlers call
//! [`edit`](DraftSession::edit) on every change, [`save_now`](DraftSession::save_now)
//! for explicit saves, and the launch/discard pair at the end.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use journey_core::projector::from_wire;
use journey_core::{DraftPatch, JourneyDraft, ObjectId};
use journey_store::{DraftMedium, DraftStore, FileMedium, MemoryMedium};

use crate::config::SyncConfig;
use crate::events::SyncEvent;
use crate::http::HttpDraftRemote;
use crate::remote::{IdentityContext, RemoteDraftStore, StaticIdentity};
use crate::scheduler::{SchedulerState, SyncError, SyncOutcome, SyncScheduler};
use crate::upsert::DraftUpserter;

/// State handed to the launch step.
#[derive(Debug)]
pub struct LaunchSnapshot {
    /// The draft as it stands after the final sync attempt.
    pub draft: JourneyDraft,
    /// Outcome of the final sync. A failure does not block the launch;
    /// the caller may show a warning and proceed with `draft`.
    pub sync: Result<SyncOutcome, SyncError>,
}

/// One authoring session over a single draft.
pub struct DraftSession {
    store: Arc<DraftStore>,
    remote: Arc<dyn RemoteDraftStore>,
    scheduler: SyncScheduler,
}

impl DraftSession {
    pub fn new(
        store: Arc<DraftStore>,
        remote: Arc<dyn RemoteDraftStore>,
        identity: Arc<dyn IdentityContext>,
        config: &SyncConfig,
    ) -> Self {
        let upserter = DraftUpserter::new(Arc::clone(&store), Arc::clone(&remote), identity)
            .with_retry(config.retry.clone());
        let scheduler = SyncScheduler::new(upserter, config.debounce_window);
        Self {
            store,
            remote,
            scheduler,
        }
    }

    /// Build a session from configuration: file or memory cache, HTTP
    /// remote, static organization id.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let medium: Arc<dyn DraftMedium> = match &config.cache_dir {
            Some(dir) => Arc::new(FileMedium::new(dir)),
            None => Arc::new(MemoryMedium::new()),
        };
        let store = Arc::new(DraftStore::with_key(medium, config.cache_key.clone()));
        let remote = Arc::new(HttpDraftRemote::new(
            config.api_url.clone(),
            config.api_token.clone(),
            config.request_timeout,
        )?);
        let identity = Arc::new(StaticIdentity::new(config.organization_id.clone()));

        tracing::info!(
            api_url = %config.api_url,
            debounce_secs = config.debounce_window.as_secs(),
            cache_dir = ?config.cache_dir,
            "Draft session configured",
        );

        Ok(Self::new(store, remote, identity, config))
    }

    pub fn draft(&self) -> JourneyDraft {
        self.store.get()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.scheduler.subscribe()
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Record an edit and schedule a debounced sync.
    pub fn edit(&self, patch: DraftPatch) -> Result<(), SyncError> {
        self.scheduler.request_debounced_sync(patch)
    }

    /// Record an untyped edit and schedule a debounced sync.
    pub fn edit_json(&self, patch: Value) -> Result<(), SyncError> {
        self.scheduler.request_debounced_sync_json(patch)
    }

    /// Record an edit and sync immediately.
    pub async fn save_now(&self, patch: DraftPatch) -> Result<SyncOutcome, SyncError> {
        self.scheduler.request_immediate_sync(patch).await
    }

    /// Replace the local draft with a previously saved remote document.
    pub async fn resume(&self, id: &ObjectId) -> Result<JourneyDraft, SyncError> {
        self.scheduler.cancel_pending();

        let wire = self.remote.fetch(id).await?;
        let mut draft = from_wire(wire)?;
        if draft.draft_id.is_none() {
            draft.draft_id = Some(id.clone());
        }

        tracing::info!(draft_id = %id, modules = draft.modules.len(), "Resumed draft from remote");
        Ok(self.store.replace(draft))
    }

    /// Cancel the debounce timer and make a final best-effort sync.
    pub async fn prepare_launch(&self) -> LaunchSnapshot {
        let sync = self.scheduler.sync_now().await;
        if let Err(e) = &sync {
            tracing::warn!(error = %e, "Final sync before launch failed; launching from local state");
        }
        LaunchSnapshot {
            draft: self.store.get(),
            sync,
        }
    }

    /// The journey was launched; the draft is no longer needed.
    pub fn complete_launch(&self) {
        self.scheduler.cancel_pending();
        self.store.clear();
        tracing::info!("Draft cleared after launch");
    }

    /// Throw the draft away.
    pub fn discard(&self) {
        self.scheduler.cancel_pending();
        self.store.clear();
        tracing::info!("Draft discarded");
    }
}
