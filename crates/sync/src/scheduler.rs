//! Debounced and forced sync scheduling.
//!
//! [`SyncScheduler`] coalesces bursts of edits into one remote write.
//! Every edit is merged into the [`DraftStore`] synchronously; the remote
//! write happens later, either when the debounce timer fires or when a
//! caller forces it. A single in-flight guard makes overlapping attempts
//! no-ops. Each attempt re-reads the store, so nothing is lost when an
//! attempt is skipped: the next one picks the edit up.
//!
//! ```text
//! Idle --edit--> Pending --timer, guard free--> Syncing --done--> Idle
//!                Pending --forced, guard free--> Syncing
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use journey_core::{CoreError, DraftPatch, ObjectId};
use journey_store::{DraftStore, StoreError};

use crate::events::{SkipReason, SyncEvent, SyncTrigger};
use crate::remote::RemoteError;
use crate::upsert::{DraftUpserter, UpsertError};

/// Default delay between the last edit and the sync it triggers.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(30);

/// Broadcast channel capacity for sync events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Result of a sync attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created(ObjectId),
    Updated(ObjectId),
    Skipped(SkipReason),
}

impl SyncOutcome {
    pub fn draft_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Created(id) | Self::Updated(id) => Some(id),
            Self::Skipped(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Edit rejected: {0}")]
    Edit(#[from] StoreError),

    #[error(transparent)]
    Upsert(#[from] UpsertError),

    #[error("Remote request failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("Remote document is invalid: {0}")]
    Document(#[from] CoreError),
}

/// Coarse scheduler state for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A debounce timer is armed.
    Pending,
    /// A remote write is in flight.
    Syncing,
}

/// Handle to the scheduler. Cheap to clone; all clones share one timer
/// and one in-flight guard.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    store: Arc<DraftStore>,
    upserter: DraftUpserter,
    window: Duration,
    pending: Mutex<PendingTimer>,
    in_flight: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
}

#[derive(Default)]
struct PendingTimer {
    /// Bumped on every arm so a fired timer only clears its own slot.
    seq: u64,
    token: Option<CancellationToken>,
}

impl PendingTimer {
    /// Take the slot for a timer that has just fired. Fails when the timer
    /// was re-armed or cancelled while its sleep was completing.
    fn claim(&mut self, seq: u64, token: &CancellationToken) -> bool {
        if self.seq != seq || token.is_cancelled() {
            return false;
        }
        self.token = None;
        true
    }
}

/// Holds the in-flight flag; releases it on drop, including when the
/// attempt errors.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncScheduler {
    pub fn new(upserter: DraftUpserter, window: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SchedulerInner {
                store: Arc::clone(upserter.store()),
                upserter,
                window,
                pending: Mutex::default(),
                in_flight: AtomicBool::new(false),
                events,
            }),
        }
    }

    /// Subscribe to the outcome of every sync attempt.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn store(&self) -> &Arc<DraftStore> {
        &self.inner.store
    }

    pub fn upserter(&self) -> &DraftUpserter {
        &self.inner.upserter
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    pub fn state(&self) -> SchedulerState {
        if self.inner.in_flight.load(Ordering::Acquire) {
            SchedulerState::Syncing
        } else if self.inner.lock_pending().token.is_some() {
            SchedulerState::Pending
        } else {
            SchedulerState::Idle
        }
    }

    /// Merge `patch` and (re)arm the debounce timer.
    ///
    /// Must be called from within a Tokio runtime. The eventual sync's
    /// failures are logged and broadcast, never returned; only a rejected
    /// patch is reported here.
    pub fn request_debounced_sync(&self, patch: DraftPatch) -> Result<(), SyncError> {
        self.inner.store.set(patch)?;
        self.arm_timer();
        Ok(())
    }

    /// [`request_debounced_sync`](Self::request_debounced_sync) for an
    /// untyped JSON patch.
    pub fn request_debounced_sync_json(&self, patch: Value) -> Result<(), SyncError> {
        self.inner.store.set_json(patch)?;
        self.arm_timer();
        Ok(())
    }

    /// Merge `patch`, cancel any pending timer and sync now.
    ///
    /// Returns [`SyncOutcome::Skipped`] when another sync is in flight or
    /// the draft is not ready to go upstream.
    pub async fn request_immediate_sync(&self, patch: DraftPatch) -> Result<SyncOutcome, SyncError> {
        self.inner.store.set(patch)?;
        self.sync_now().await
    }

    /// Cancel any pending timer and sync the current draft now.
    pub async fn sync_now(&self) -> Result<SyncOutcome, SyncError> {
        self.cancel_pending();
        self.inner.attempt(SyncTrigger::Immediate).await
    }

    /// Cancel the pending debounce timer, if any. An in-flight request is
    /// not affected. Returns whether a timer was cancelled.
    pub fn cancel_pending(&self) -> bool {
        match self.inner.lock_pending().token.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn arm_timer(&self) {
        let token = CancellationToken::new();
        let seq = {
            let mut pending = self.inner.lock_pending();
            if let Some(previous) = pending.token.replace(token.clone()) {
                previous.cancel();
            }
            pending.seq += 1;
            pending.seq
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::trace!(seq, "Debounce timer superseded");
                    return;
                }
                _ = tokio::time::sleep(inner.window) => {}
            }

            if !inner.lock_pending().claim(seq, &token) {
                tracing::trace!(seq, "Debounce timer superseded after firing");
                return;
            }

            // Errors are already logged and broadcast by `attempt`.
            let _ = inner.attempt(SyncTrigger::Debounced).await;
        });
    }
}

impl SchedulerInner {
    fn lock_pending(&self) -> MutexGuard<'_, PendingTimer> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SyncEvent) {
        // Zero receivers is fine.
        let _ = self.events.send(event);
    }

    async fn attempt(&self, trigger: SyncTrigger) -> Result<SyncOutcome, SyncError> {
        if !self.store.get().is_syncable() {
            tracing::debug!(?trigger, "Draft has no journey or modules yet; not syncing");
            return Ok(self.skip(trigger, SkipReason::Incomplete));
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(?trigger, "Sync already in flight; edit stays local until the next sync");
            return Ok(self.skip(trigger, SkipReason::InFlight));
        };

        match self.upserter.upsert(None).await {
            Ok(result) => {
                self.publish(SyncEvent::Synced {
                    trigger,
                    draft_id: result.id.clone(),
                    created: result.created,
                });
                Ok(if result.created {
                    SyncOutcome::Created(result.id)
                } else {
                    SyncOutcome::Updated(result.id)
                })
            }
            Err(e) => {
                tracing::error!(?trigger, error = %e, "Journey draft sync failed");
                self.publish(SyncEvent::Failed {
                    trigger,
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    fn skip(&self, trigger: SyncTrigger, reason: SkipReason) -> SyncOutcome {
        self.publish(SyncEvent::Skipped { trigger, reason });
        SyncOutcome::Skipped(reason)
    }
}
