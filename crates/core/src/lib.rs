//! Domain model and pure transforms for journey drafts.
//!
//! - [`ids`]: canonical/wire identifier conversion ([`ObjectId`]).
//! - [`sanitize`]: single-pass removal of stale placeholder ids.
//! - [`types`]: the author-facing [`JourneyDraft`] model.
//! - [`projector`]: reshaping between the draft and the nested remote
//!   document.

pub mod error;
pub mod ids;
pub mod projector;
pub mod sanitize;
pub mod types;

pub use error::CoreError;
pub use ids::ObjectId;
pub use types::{DraftPatch, JourneyDraft, Module};
