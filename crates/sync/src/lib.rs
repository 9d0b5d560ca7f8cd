//! Synchronization of the local journey draft with the remote store.
//!
//! - [`remote`]: the [`RemoteDraftStore`] trait and tenant context.
//! - [`http`]: [`HttpDraftRemote`], the REST implementation.
//! - [`upsert`]: [`DraftUpserter`], create-or-update with id write-back.
//! - [`scheduler`]: [`SyncScheduler`], debounced and forced syncs under a
//!   single in-flight guard.
//! - [`session`]: [`DraftSession`], the facade UI handlers talk to.
//! - [`config`] / [`telemetry`]: environment configuration and tracing
//!   setup.

pub mod config;
pub mod events;
pub mod http;
pub mod remote;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod telemetry;
pub mod upsert;

pub use config::{ConfigError, SyncConfig};
pub use events::{SkipReason, SyncEvent, SyncTrigger};
pub use http::HttpDraftRemote;
pub use remote::{IdentityContext, RemoteDraftStore, RemoteError, StaticIdentity};
pub use retry::RetryConfig;
pub use scheduler::{SchedulerState, SyncError, SyncOutcome, SyncScheduler};
pub use session::{DraftSession, LaunchSnapshot};
pub use upsert::{DraftUpserter, UpsertError, UpsertResult};
