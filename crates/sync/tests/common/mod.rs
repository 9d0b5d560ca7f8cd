#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{Notify, Semaphore};

use journey_core::ids::wrap_id;
use journey_core::types::{Journey, Module};
use journey_core::{DraftPatch, ObjectId};
use journey_store::DraftStore;
use journey_sync::{DraftUpserter, RemoteDraftStore, RemoteError, StaticIdentity};

pub const ORG_ID: &str = "65a1f0c2e4b0a1b2c3d4e500";

/// A request recorded by [`FakeRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(Value),
    Update(ObjectId, Value),
    Fetch(ObjectId),
}

/// In-memory stand-in for the remote document store.
///
/// Assigns sequential canonical ids, records every request, and can be
/// told to fail, to answer creates with a fixed body, or to hold requests
/// until released.
#[derive(Default)]
pub struct FakeRemote {
    calls: Mutex<Vec<Call>>,
    documents: Mutex<HashMap<String, Value>>,
    next_id: AtomicU64,
    create_response: Mutex<Option<Value>>,
    failures: Mutex<VecDeque<RemoteError>>,
    gate: Option<Arc<Semaphore>>,
    recorded: Notify,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests block after being recorded until [`release`](Self::release)
    /// hands out a permit.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn release(&self, requests: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(requests);
        }
    }

    /// Answer every create with `body` instead of an assigned id.
    pub fn respond_to_create_with(&self, body: Value) {
        *self.create_response.lock().unwrap() = Some(body);
    }

    pub fn fail_next(&self, error: RemoteError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Seed a stored document, as if saved by an earlier session.
    pub fn insert_document(&self, id: &str, document: Value) {
        self.documents
            .lock()
            .unwrap()
            .insert(id.to_string(), document);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create(_)))
            .count()
    }

    pub fn updates(&self) -> Vec<ObjectId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Update(id, _) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `n` requests have been recorded.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.recorded.notified();
            if self.calls.lock().unwrap().len() >= n {
                return;
            }
            notified.await;
        }
    }

    async fn record(&self, call: Call) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call);
        self.recorded.notify_waiters();

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))?
                .forget();
        }

        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn assign_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{n:024x}")
    }
}

#[async_trait]
impl RemoteDraftStore for FakeRemote {
    async fn create(&self, document: &Value) -> Result<Value, RemoteError> {
        self.record(Call::Create(document.clone())).await?;

        if let Some(body) = self.create_response.lock().unwrap().clone() {
            return Ok(body);
        }

        let id = self.assign_id();
        self.documents
            .lock()
            .unwrap()
            .insert(id.clone(), document.clone());
        Ok(json!({ "_id": wrap_id(&id) }))
    }

    async fn update(&self, id: &ObjectId, document: &Value) -> Result<Value, RemoteError> {
        self.record(Call::Update(id.clone(), document.clone()))
            .await?;
        self.documents
            .lock()
            .unwrap()
            .insert(id.to_string(), document.clone());
        Ok(json!({ "data": { "_id": id.as_str() } }))
    }

    async fn fetch(&self, id: &ObjectId) -> Result<Value, RemoteError> {
        self.record(Call::Fetch(id.clone())).await?;

        let stored = self.documents.lock().unwrap().get(id.as_str()).cloned();
        match stored {
            Some(Value::Object(mut document)) => {
                document.insert("_id".into(), id.to_wire());
                Ok(Value::Object(document))
            }
            Some(other) => Ok(other),
            None => Err(RemoteError::Api {
                status: 404,
                body: "not found".into(),
            }),
        }
    }
}

pub fn id(raw: &str) -> ObjectId {
    ObjectId::parse(raw).unwrap()
}

/// An edit that makes an empty draft syncable.
pub fn syncable_patch(title: &str) -> DraftPatch {
    DraftPatch::new()
        .journey(Journey::new(title))
        .modules(vec![Module::new("Welcome")])
}

pub fn upserter(store: &Arc<DraftStore>, remote: &Arc<FakeRemote>) -> DraftUpserter {
    DraftUpserter::new(
        Arc::clone(store),
        remote.clone(),
        Arc::new(StaticIdentity::new(Some(ORG_ID.to_string()))),
    )
}
