//! In-memory fakes for the data-source trait (testing and offline runs)
//!
//! `MemoryDataSource` serves canned envelopes per collection, can be told to
//! fail a collection, delay every answer or hold answers behind a gate, and
//! records how many requests were in flight at once so concurrency can be
//! asserted.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::collection::{Collection, FilterParams};
use crate::error::SourceError;
use crate::source::DataSource;
use crate::SourceResult;

/// Fields a record uses to reference the user it belongs to.
const USER_REFERENCE_FIELDS: [&str; 6] = [
    "userId",
    "clientId",
    "freelancerId",
    "payerId",
    "payeeId",
    "user",
];

/// A failure the fake answers with instead of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    Network,
    Status(u16),
    Decode,
}

impl InjectedFailure {
    fn to_error(&self, collection: Collection) -> SourceError {
        let url = format!("memory://{}", collection.name());
        match self {
            InjectedFailure::Network => SourceError::Network {
                url,
                message: "connection reset by peer".to_string(),
            },
            InjectedFailure::Status(status) => SourceError::Http {
                url,
                status: *status,
            },
            InjectedFailure::Decode => {
                SourceError::Decode(format!("{url}: expected value at line 1 column 1"))
            }
        }
    }
}

/// In-memory [`DataSource`].
#[derive(Debug, Default)]
pub struct MemoryDataSource {
    collections: Mutex<HashMap<Collection, Value>>,
    scoped: Mutex<HashMap<(Collection, String), Value>>,
    records: Mutex<HashMap<(Collection, String), Value>>,
    failures: Mutex<HashMap<Collection, InjectedFailure>>,
    record_failures: Mutex<HashMap<Collection, InjectedFailure>>,
    latency: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `<collection>.json` files from `dir`; missing files are skipped.
    ///
    /// Single-record lookups fall back to scanning these lists, and per-user
    /// list queries filter them by the usual reference fields.
    pub fn from_dir(dir: &Path) -> SourceResult<Self> {
        let source = Self::new();
        for collection in Collection::ALL {
            let path = dir.join(format!("{}.json", collection.name()));
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let envelope: Value = serde_json::from_str(&content)?;
            debug!(collection = %collection, path = %path.display(), "loaded fixture");
            source.set_collection(collection, envelope);
        }
        Ok(source)
    }

    /// Envelope answered for unscoped list queries.
    pub fn with_collection(self, collection: Collection, envelope: Value) -> Self {
        self.set_collection(collection, envelope);
        self
    }

    /// Envelope answered for list queries scoped to `user_id`.
    pub fn with_user_collection(self, collection: Collection, user_id: &str, envelope: Value) -> Self {
        self.scoped
            .lock()
            .unwrap()
            .insert((collection, user_id.to_string()), envelope);
        self
    }

    /// Envelope answered for `get_by_id(collection, id)`.
    pub fn with_record(self, collection: Collection, id: &str, envelope: Value) -> Self {
        self.records
            .lock()
            .unwrap()
            .insert((collection, id.to_string()), envelope);
        self
    }

    /// Make every list query on `collection` fail.
    pub fn with_failure(self, collection: Collection, failure: InjectedFailure) -> Self {
        self.failures.lock().unwrap().insert(collection, failure);
        self
    }

    /// Make every single-record lookup on `collection` fail.
    pub fn with_record_failure(self, collection: Collection, failure: InjectedFailure) -> Self {
        self.record_failures
            .lock()
            .unwrap()
            .insert(collection, failure);
        self
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Hold every answer until `gate` has a permit. The permit is returned
    /// afterwards, so one permit releases all waiting requests in turn.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_collection(&self, collection: Collection, envelope: Value) {
        self.collections
            .lock()
            .unwrap()
            .insert(collection, envelope);
    }

    /// Total requests served (including failed ones).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests that ran to the end and produced an answer.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Highest number of requests observed in flight simultaneously.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(gate) = &self.gate {
            // A closed gate lets everything through.
            let _permit = gate.acquire().await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn list_for(&self, collection: Collection, params: &FilterParams) -> SourceResult<Value> {
        if let Some(failure) = self.failures.lock().unwrap().get(&collection) {
            return Err(failure.to_error(collection));
        }

        if let Some(user_id) = params.user_id.as_deref() {
            let scoped = self.scoped.lock().unwrap();
            if let Some(envelope) = scoped.get(&(collection, user_id.to_string())) {
                return Ok(envelope.clone());
            }
            drop(scoped);
            let all = self.collections.lock().unwrap().get(&collection).cloned();
            let items = all.as_ref().map(list_items).unwrap_or_default();
            let owned: Vec<Value> = items
                .into_iter()
                .filter(|item| references_user(item, user_id))
                .collect();
            return Ok(json!({ "success": true, "data": owned }));
        }

        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(&collection)
            .cloned()
            .unwrap_or_else(|| json!([])))
    }

    fn record_for(&self, collection: Collection, id: &str) -> SourceResult<Value> {
        if let Some(failure) = self.record_failures.lock().unwrap().get(&collection) {
            return Err(failure.to_error(collection));
        }
        if let Some(envelope) = self
            .records
            .lock()
            .unwrap()
            .get(&(collection, id.to_string()))
        {
            return Ok(envelope.clone());
        }

        let all = self.collections.lock().unwrap().get(&collection).cloned();
        all.as_ref()
            .map(list_items)
            .unwrap_or_default()
            .into_iter()
            .find(|item| record_id(item) == Some(id))
            .map(|record| json!({ "success": true, "data": record }))
            .ok_or_else(|| SourceError::NotFound {
                collection: collection.name().to_string(),
                id: id.to_string(),
            })
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    async fn get_all(&self, collection: Collection, params: &FilterParams) -> SourceResult<Value> {
        self.enter().await;
        let result = self.list_for(collection, params);
        self.leave();
        result
    }

    async fn get_by_id(&self, collection: Collection, id: &str) -> SourceResult<Value> {
        self.enter().await;
        let result = self.record_for(collection, id);
        self.leave();
        result
    }
}

/// Items of a fixture list stored either bare, under `data`, or under the
/// collection's own key. Anything else has no items.
fn list_items(envelope: &Value) -> Vec<Value> {
    match envelope {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .get("data")
            .or_else(|| map.get("subscriptions"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn record_id(item: &Value) -> Option<&str> {
    item.get("_id")
        .or_else(|| item.get("id"))
        .and_then(Value::as_str)
}

fn references_user(item: &Value, user_id: &str) -> bool {
    USER_REFERENCE_FIELDS.iter().any(|field| match item.get(*field) {
        Some(Value::String(s)) => s == user_id,
        Some(nested @ Value::Object(_)) => record_id(nested) == Some(user_id),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_collection_answers_empty_list() {
        let source = MemoryDataSource::new();
        let value = source
            .get_all(Collection::Jobs, &FilterParams::new())
            .await
            .unwrap();
        assert_eq!(value, json!([]));
        assert_eq!(source.calls(), 1);
        assert_eq!(source.completed(), 1);
    }

    #[tokio::test]
    async fn gate_holds_answers_until_opened() {
        let gate = Arc::new(Semaphore::new(0));
        let source = Arc::new(MemoryDataSource::new().with_gate(gate.clone()));
        let pending = {
            let source = source.clone();
            tokio::spawn(async move { source.get_all(Collection::Jobs, &FilterParams::new()).await })
        };
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(source.completed(), 0);

        gate.add_permits(1);
        let value = pending.await.unwrap().unwrap();
        assert_eq!(value, json!([]));
        assert_eq!(source.completed(), 1);
    }

    #[tokio::test]
    async fn injected_failure_maps_to_source_error() {
        let source = MemoryDataSource::new()
            .with_failure(Collection::Payments, InjectedFailure::Status(503));
        let err = source
            .get_all(Collection::Payments, &FilterParams::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn user_scoped_query_filters_by_reference_fields() {
        let source = MemoryDataSource::new().with_collection(
            Collection::Projects,
            json!({ "data": [
                { "_id": "p1", "clientId": "u1" },
                { "_id": "p2", "freelancerId": { "_id": "u1", "firstName": "Ada" } },
                { "_id": "p3", "clientId": "u2" }
            ]}),
        );
        let value = source
            .get_all(Collection::Projects, &FilterParams::for_user("u1"))
            .await
            .unwrap();
        let ids: Vec<&str> = value["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(record_id)
            .collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn scoped_entry_takes_precedence() {
        let source = MemoryDataSource::new()
            .with_collection(Collection::Payments, json!([{ "_id": "x", "userId": "u1" }]))
            .with_user_collection(Collection::Payments, "u1", json!({ "data": [] }));
        let value = source
            .get_all(Collection::Payments, &FilterParams::for_user("u1"))
            .await
            .unwrap();
        assert_eq!(value, json!({ "data": [] }));
    }

    #[tokio::test]
    async fn record_lookup_falls_back_to_list_scan() {
        let source = MemoryDataSource::new()
            .with_collection(Collection::Users, json!([{ "_id": "u1", "email": "a@b.c" }]));
        let value = source.get_by_id(Collection::Users, "u1").await.unwrap();
        assert_eq!(value["data"]["email"], json!("a@b.c"));

        let err = source.get_by_id(Collection::Users, "u2").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
