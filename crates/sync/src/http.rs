//! REST client for the remote journey document store.
//!
//! Wraps the document endpoints (`POST /journeys`, `PUT /journeys/{id}`,
//! `GET /journeys/{id}`) using [`reqwest`]. Authentication is an opaque
//! bearer token supplied by the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use journey_core::ObjectId;

use crate::remote::{RemoteDraftStore, RemoteError};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the journey document store.
pub struct HttpDraftRemote {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpDraftRemote {
    /// Create a client for the store at `base_url` (e.g.
    /// `http://host:3000/api`).
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, token))
    }

    /// Create a client reusing an existing [`reqwest::Client`] (useful for
    /// connection pooling).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---- private helpers ----

    fn collection_url(&self) -> String {
        format!("{}/journeys", self.base_url)
    }

    fn document_url(&self, id: &ObjectId) -> String {
        format!("{}/journeys/{}", self.base_url, id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Ensure the response has a success status code, returning a
    /// [`RemoteError::Api`] with the status and body text otherwise.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RemoteError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful response body. An empty body reads as `null`.
    async fn parse_response(response: reqwest::Response) -> Result<Value, RemoteError> {
        let response = Self::ensure_success(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl RemoteDraftStore for HttpDraftRemote {
    async fn create(&self, document: &Value) -> Result<Value, RemoteError> {
        let response = self
            .authorize(self.client.post(self.collection_url()))
            .json(document)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn update(&self, id: &ObjectId, document: &Value) -> Result<Value, RemoteError> {
        let response = self
            .authorize(self.client.put(self.document_url(id)))
            .json(document)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn fetch(&self, id: &ObjectId) -> Result<Value, RemoteError> {
        let response = self
            .authorize(self.client.get(self.document_url(id)))
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
