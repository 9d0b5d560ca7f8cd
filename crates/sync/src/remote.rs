//! Remote document store abstraction.
//!
//! [`RemoteDraftStore`] is the seam between the sync machinery and the
//! transport. [`crate::http::HttpDraftRemote`] talks REST; tests plug in
//! a recording fake.

use async_trait::async_trait;
use serde_json::Value;

use journey_core::ObjectId;

/// Errors from the remote store layer.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote store returned a non-2xx status code.
    #[error("Remote store error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body was not valid JSON.
    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Transport failure reported by a non-HTTP backend.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Whether retrying the same request could succeed.
    ///
    /// Connection problems, timeouts, `429` and `5xx` responses are
    /// transient; client errors and malformed bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) => false,
            Self::Transport(_) => true,
        }
    }
}

/// Create, update and fetch journey documents.
///
/// Documents are wire-encoded JSON as produced by
/// [`journey_core::projector::to_wire`]. Responses are returned raw; the
/// caller extracts and validates ids.
#[async_trait]
pub trait RemoteDraftStore: Send + Sync {
    /// Create a new document. The response carries the assigned id.
    async fn create(&self, document: &Value) -> Result<Value, RemoteError>;

    /// Replace the document addressed by `id`.
    async fn update(&self, id: &ObjectId, document: &Value) -> Result<Value, RemoteError>;

    /// Fetch a previously saved document.
    async fn fetch(&self, id: &ObjectId) -> Result<Value, RemoteError>;
}

/// Supplies the organization every remote write is attributed to.
pub trait IdentityContext: Send + Sync {
    fn organization_id(&self) -> Option<String>;
}

/// A fixed organization id, for configuration-driven sessions and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    organization_id: Option<String>,
}

impl StaticIdentity {
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }
}

impl IdentityContext for StaticIdentity {
    fn organization_id(&self) -> Option<String> {
        self.organization_id.clone()
    }
}
