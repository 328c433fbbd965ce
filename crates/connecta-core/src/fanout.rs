//! Fan-out collection across independent sources.
//!
//! [`collect`] starts every fetch at once, waits for all of them to settle and
//! returns exactly one [`SourceOutcome`] per source name. A failing source is
//! recorded as `Failed` and never affects its siblings. No retries and no
//! timeout are applied here; both belong to the fetch itself.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use connecta_sources::{Collection, DataSource, FilterParams, SourceError, SourceResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::envelope::{normalize_keyed, normalize_owned, normalize_single};
use crate::error::{ReportingError, Result};
use crate::metrics::METRICS;
use crate::obs;
use crate::record::Record;

type FetchFuture = Pin<Box<dyn Future<Output = SourceResult<Value>> + Send + 'static>>;

/// A named, not-yet-started fetch.
pub struct NamedFetch {
    name: String,
    envelope_key: Option<String>,
    single: bool,
    fetch: FetchFuture,
}

impl NamedFetch {
    pub fn new<F>(name: &str, fetch: F) -> Self
    where
        F: Future<Output = SourceResult<Value>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            envelope_key: None,
            single: false,
            fetch: Box::pin(fetch),
        }
    }

    /// List query against `collection`, named after the collection.
    pub fn list(source: Arc<dyn DataSource>, collection: Collection, params: FilterParams) -> Self {
        Self::new(collection.name(), async move {
            source.get_all(collection, &params).await
        })
        .with_envelope_key(collection.envelope_key())
    }

    /// Single-record lookup, named after the collection.
    pub fn by_id(source: Arc<dyn DataSource>, collection: Collection, id: &str) -> Self {
        let id = id.to_string();
        Self::new(collection.name(), async move {
            source.get_by_id(collection, &id).await
        })
        .single()
    }

    /// Expect a single-record envelope. A list answer is still accepted, so
    /// per-user lookups served from a filtered list work too.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Extra top-level key to look under when the envelope is none of the
    /// standard shapes.
    pub fn with_envelope_key(mut self, key: Option<&str>) -> Self {
        self.envelope_key = key.map(str::to_string);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, FetchFuture) {
        (self.name, self.fetch)
    }
}

impl std::fmt::Debug for NamedFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedFetch")
            .field("name", &self.name)
            .field("envelope_key", &self.envelope_key)
            .field("single", &self.single)
            .finish_non_exhaustive()
    }
}

/// Why a source failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// `network`, `http`, `decode`, `not_found`, `config`, `io` or `panic`
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&SourceError> for ErrorInfo {
    fn from(err: &SourceError) -> Self {
        ErrorInfo {
            kind: err.kind().to_string(),
            message: err.to_string(),
            status: err.status(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceOutcome {
    Ok { records: Vec<Record> },
    Failed { error: ErrorInfo },
}

impl SourceOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, SourceOutcome::Ok { .. })
    }

    /// Records of a successful source; empty for a failed one.
    pub fn records(&self) -> &[Record] {
        match self {
            SourceOutcome::Ok { records } => records,
            SourceOutcome::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            SourceOutcome::Ok { .. } => None,
            SourceOutcome::Failed { error } => Some(error),
        }
    }

    pub fn status(&self) -> SourceStatus {
        if self.is_ok() {
            SourceStatus::Ok
        } else {
            SourceStatus::Failed
        }
    }
}

/// Per-source flag surfaced in report output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Failed,
}

/// Outcomes of one [`collect`] call, keyed by source name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceOutcomes {
    outcomes: BTreeMap<String, SourceOutcome>,
}

impl SourceOutcomes {
    pub fn get(&self, name: &str) -> Option<&SourceOutcome> {
        self.outcomes.get(name)
    }

    /// Records of `name`, or an empty slice if it failed or was never asked for.
    pub fn records(&self, name: &str) -> &[Record] {
        self.outcomes
            .get(name)
            .map(SourceOutcome::records)
            .unwrap_or(&[])
    }

    /// Records of a source the caller cannot do without.
    pub fn require(&self, name: &str) -> Result<&[Record]> {
        match self.outcomes.get(name) {
            Some(SourceOutcome::Ok { records }) => Ok(records),
            Some(SourceOutcome::Failed { error }) => Err(ReportingError::SourceUnavailable {
                source_name: name.to_string(),
                detail: error.to_string(),
            }),
            None => Err(ReportingError::SourceUnavailable {
                source_name: name.to_string(),
                detail: "not collected".to_string(),
            }),
        }
    }

    /// Move the records of `name` out, leaving nothing behind.
    pub fn take(&mut self, name: &str) -> Vec<Record> {
        match self.outcomes.remove(name) {
            Some(SourceOutcome::Ok { records }) => records,
            _ => Vec::new(),
        }
    }

    pub fn is_ok(&self, name: &str) -> bool {
        self.outcomes.get(name).is_some_and(SourceOutcome::is_ok)
    }

    pub fn failed(&self) -> Vec<(&str, &ErrorInfo)> {
        self.outcomes
            .iter()
            .filter_map(|(name, outcome)| outcome.error().map(|e| (name.as_str(), e)))
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.outcomes.values().any(|o| !o.is_ok())
    }

    pub fn statuses(&self) -> BTreeMap<String, SourceStatus> {
        self.outcomes
            .iter()
            .map(|(name, outcome)| (name.clone(), outcome.status()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.outcomes.keys().map(String::as_str)
    }
}

impl FromIterator<(String, SourceOutcome)> for SourceOutcomes {
    fn from_iter<I: IntoIterator<Item = (String, SourceOutcome)>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

/// How a fetch's envelope is normalized.
enum Shape {
    List(Option<String>),
    Single,
}

impl Shape {
    fn of(fetch: &NamedFetch) -> Self {
        if fetch.single {
            Shape::Single
        } else {
            Shape::List(fetch.envelope_key.clone())
        }
    }

    fn normalize(&self, envelope: Value) -> Vec<Record> {
        match self {
            Shape::List(key) => normalize_keyed(envelope, key.as_deref()),
            Shape::Single => match normalize_single(&envelope) {
                Some(record) => vec![record],
                None => normalize_owned(envelope),
            },
        }
    }
}

/// Run every fetch concurrently and wait for all of them.
///
/// Each fetch is spawned onto the runtime before any is awaited. If the
/// caller drops the returned future, the spawned fetches keep running to
/// completion and their results are discarded. Duplicate names keep the
/// first fetch.
pub async fn collect(fetches: Vec<NamedFetch>) -> SourceOutcomes {
    let started = Instant::now();
    let mut tasks: Vec<(String, Shape, JoinHandle<SourceResult<Value>>)> =
        Vec::with_capacity(fetches.len());

    for fetch in fetches {
        if tasks.iter().any(|(name, _, _)| name == &fetch.name) {
            warn!(source = %fetch.name, "duplicate source name, ignoring later fetch");
            continue;
        }
        let shape = Shape::of(&fetch);
        let (name, future) = fetch.into_parts();
        debug!(source = %name, "fetch started");
        tasks.push((name, shape, tokio::spawn(future)));
    }
    METRICS.add_fetches(tasks.len() as u64);

    let mut outcomes = BTreeMap::new();
    for (name, shape, task) in tasks {
        let outcome = match task.await {
            Ok(Ok(envelope)) => SourceOutcome::Ok {
                records: shape.normalize(envelope),
            },
            Ok(Err(err)) => {
                obs::emit_source_failed(&name, err.kind(), &err);
                SourceOutcome::Failed {
                    error: ErrorInfo::from(&err),
                }
            }
            Err(join_err) => {
                obs::emit_source_failed(&name, "panic", &join_err);
                SourceOutcome::Failed {
                    error: ErrorInfo {
                        kind: "panic".to_string(),
                        message: join_err.to_string(),
                        status: None,
                    },
                }
            }
        };
        if !outcome.is_ok() {
            METRICS.inc_sources_failed();
        }
        outcomes.insert(name, outcome);
    }

    let collected = SourceOutcomes { outcomes };
    let failed = collected.failed().len();
    obs::emit_fanout_completed(
        collected.len(),
        collected.len() - failed,
        failed,
        started.elapsed().as_millis() as u64,
    );
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use connecta_sources::{InjectedFailure, MemoryDataSource};
    use serde_json::json;
    use std::time::Duration;

    async fn answer(envelope: Value) -> SourceResult<Value> {
        Ok(envelope)
    }

    async fn explode() -> SourceResult<Value> {
        panic!("fetch exploded")
    }

    #[tokio::test]
    async fn failing_source_does_not_affect_siblings() {
        let source: Arc<dyn DataSource> = Arc::new(
            MemoryDataSource::new()
                .with_collection(Collection::Users, json!({ "data": [{ "_id": "u1" }, { "_id": "u2" }] }))
                .with_failure(Collection::Payments, InjectedFailure::Network),
        );
        let outcomes = collect(vec![
            NamedFetch::list(source.clone(), Collection::Users, FilterParams::new()),
            NamedFetch::list(source, Collection::Payments, FilterParams::new()),
        ])
        .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.is_ok("users"));
        assert_eq!(outcomes.records("users").len(), 2);
        assert_eq!(outcomes.records("users")[0].id().as_deref(), Some("u1"));

        let failed = outcomes.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "payments");
        assert_eq!(failed[0].1.kind, "network");
        assert!(outcomes.records("payments").is_empty());
        assert!(outcomes.is_degraded());
    }

    #[tokio::test]
    async fn fetches_run_concurrently() {
        let fake = Arc::new(MemoryDataSource::new().with_latency(Duration::from_millis(50)));
        let source: Arc<dyn DataSource> = fake.clone();
        let fetches = [Collection::Users, Collection::Jobs, Collection::Projects, Collection::Payments]
            .into_iter()
            .map(|c| NamedFetch::list(source.clone(), c, FilterParams::new()))
            .collect();

        let outcomes = collect(fetches).await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(fake.calls(), 4);
        assert!(fake.max_in_flight() > 1, "fetches were serialised");
    }

    #[tokio::test]
    async fn abandoned_collect_lets_started_fetches_finish() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let fake = Arc::new(
            MemoryDataSource::new()
                .with_collection(Collection::Jobs, json!([{ "_id": "j1" }]))
                .with_gate(gate.clone()),
        );
        let source: Arc<dyn DataSource> = fake.clone();
        let aggregation = tokio::spawn(collect(vec![NamedFetch::list(
            source,
            Collection::Jobs,
            FilterParams::new(),
        )]));
        while fake.calls() == 0 {
            tokio::task::yield_now().await;
        }

        aggregation.abort();
        assert!(aggregation.await.unwrap_err().is_cancelled());
        assert_eq!(fake.completed(), 0);

        gate.add_permits(1);
        tokio::time::timeout(Duration::from_secs(5), async {
            while fake.completed() == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fetch did not run to completion");
        assert_eq!(fake.completed(), 1);
    }

    #[tokio::test]
    async fn panicking_fetch_is_a_failed_outcome() {
        let outcomes = collect(vec![
            NamedFetch::new("boom", explode()),
            NamedFetch::new("fine", answer(json!([{ "_id": "a" }]))),
        ])
        .await;
        let boom = outcomes.get("boom").and_then(SourceOutcome::error);
        assert_eq!(boom.map(|e| e.kind.as_str()), Some("panic"));
        assert_eq!(outcomes.records("fine").len(), 1);
    }

    #[tokio::test]
    async fn keyed_envelope_is_unwrapped() {
        let source: Arc<dyn DataSource> = Arc::new(MemoryDataSource::new().with_collection(
            Collection::Subscriptions,
            json!({ "success": "yes", "subscriptions": [{ "_id": "s1" }] }),
        ));
        let outcomes = collect(vec![NamedFetch::list(
            source,
            Collection::Subscriptions,
            FilterParams::new(),
        )])
        .await;
        assert_eq!(outcomes.records("subscriptions").len(), 1);
    }

    #[tokio::test]
    async fn single_fetch_accepts_object_or_list() {
        let outcomes = collect(vec![
            NamedFetch::new("profile", answer(json!({ "success": true, "data": { "_id": "pr1" } })))
                .single(),
            NamedFetch::new("listed", answer(json!({ "success": true, "data": [{ "_id": "pr2" }] })))
                .single(),
            NamedFetch::new("nothing", answer(json!({ "success": false }))).single(),
        ])
        .await;
        assert_eq!(outcomes.records("profile")[0].id().as_deref(), Some("pr1"));
        assert_eq!(outcomes.records("listed")[0].id().as_deref(), Some("pr2"));
        assert!(outcomes.is_ok("nothing"));
        assert!(outcomes.records("nothing").is_empty());
    }

    #[tokio::test]
    async fn duplicate_names_keep_first() {
        let outcomes = collect(vec![
            NamedFetch::new("users", answer(json!([{ "_id": "first" }]))),
            NamedFetch::new("users", answer(json!([{ "_id": "second" }]))),
        ])
        .await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes.records("users")[0].id().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn require_surfaces_failure() {
        let mut outcomes = collect(vec![
            NamedFetch::new("users", answer(json!([]))),
            NamedFetch::new("payments", async {
                Err::<Value, _>(SourceError::Decode("bad body".to_string()))
            }),
        ])
        .await;
        assert!(outcomes.require("users").is_ok());
        let err = outcomes.require("payments").unwrap_err();
        assert!(matches!(err, ReportingError::SourceUnavailable { .. }));
        assert!(outcomes.take("users").is_empty());
        assert!(outcomes.get("users").is_none());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let ok = SourceOutcome::Ok { records: vec![] };
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "status": "ok", "records": [] }));
        let failed = SourceOutcome::Failed {
            error: ErrorInfo {
                kind: "http".to_string(),
                message: "HTTP 500".to_string(),
                status: Some(500),
            },
        };
        let v = serde_json::to_value(&failed).unwrap();
        assert_eq!(v["status"], json!("failed"));
        assert_eq!(v["error"]["status"], json!(500));
    }
}
