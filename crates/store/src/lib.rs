//! Local draft persistence.
//!
//! - [`DraftMedium`]: whole-document key/value persistence, with an
//!   in-memory ([`MemoryMedium`]) and a file-backed ([`FileMedium`])
//!   implementation.
//! - [`DraftStore`]: the single owner of the in-progress draft for an
//!   authoring session. Every write is merged, sanitized, stamped and
//!   persisted synchronously.

pub mod medium;
pub mod store;

pub use medium::{DraftMedium, FileMedium, MediumError, MemoryMedium};
pub use store::{DraftStore, StoreError, DEFAULT_DRAFT_KEY};
