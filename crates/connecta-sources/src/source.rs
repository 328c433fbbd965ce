//! The collaborator contract every backend collection is reached through.

use async_trait::async_trait;
use serde_json::Value;

use crate::collection::{Collection, FilterParams};
use crate::SourceResult;

/// A backend that answers list and single-record queries with raw JSON.
///
/// Guarantees expected from implementations:
/// - the returned value is the body exactly as the backend sent it; no
///   unwrapping of `data`/`success` envelopes happens here
/// - absence of a single record is an `Err`, never `Ok(Value::Null)`
/// - timeouts and retries, if any, are the implementation's business
#[async_trait]
pub trait DataSource: Send + Sync {
    /// List query, optionally narrowed by `params`.
    async fn get_all(&self, collection: Collection, params: &FilterParams) -> SourceResult<Value>;

    /// Single-record lookup.
    async fn get_by_id(&self, collection: Collection, id: &str) -> SourceResult<Value>;
}
