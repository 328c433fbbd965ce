//! HTTP client for the Connecta admin REST API
//!
//! One `HttpDataSource` is shared by every fan-out fetch. Timeouts are set on
//! the underlying reqwest client; no retries happen here.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::collection::{Collection, FilterParams};
use crate::config::ApiConfig;
use crate::error::SourceError;
use crate::source::DataSource;
use crate::SourceResult;

/// reqwest-backed [`DataSource`].
pub struct HttpDataSource {
    config: ApiConfig,
    http_client: reqwest::Client,
}

impl HttpDataSource {
    /// Create a new client
    pub fn new(config: ApiConfig) -> SourceResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpDataSource {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> SourceResult<Self> {
        Self::new(ApiConfig::from_env())
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// `path` under the base URL, with `id` appended as one escaped segment.
    fn endpoint(&self, path: &str, id: Option<&str>) -> SourceResult<Url> {
        let mut url = Url::parse(&self.config.url(path))
            .map_err(|e| SourceError::Config(format!("invalid API URL {}: {e}", self.config.base_url)))?;
        if let Some(id) = id {
            url.path_segments_mut()
                .map_err(|_| SourceError::Config(format!("API URL cannot be a base: {}", self.config.base_url)))?
                .push(id);
        }
        Ok(url)
    }

    /// Resolve the endpoint for a list query.
    ///
    /// Profiles are looked up per user through a dedicated route rather than a
    /// query parameter.
    fn list_url(
        &self,
        collection: Collection,
        params: &FilterParams,
    ) -> SourceResult<(Url, Vec<(&'static str, String)>)> {
        match (collection, params.user_id.as_deref()) {
            (Collection::Profiles, Some(user_id)) => {
                let mut query = params.to_query();
                query.retain(|(k, _)| *k != "userId");
                Ok((self.endpoint("/api/profiles/user", Some(user_id))?, query))
            }
            _ => Ok((self.endpoint(collection.list_path(), None)?, params.to_query())),
        }
    }

    async fn get_json(&self, url: Url, query: &[(&'static str, String)]) -> SourceResult<Value> {
        debug!(url = %url, "GET");
        let mut request = self.http_client.get(url.clone()).query(query);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "admin API returned an error status");
            return Err(SourceError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn get_all(&self, collection: Collection, params: &FilterParams) -> SourceResult<Value> {
        let (url, query) = self.list_url(collection, params)?;
        self.get_json(url, &query).await
    }

    async fn get_by_id(&self, collection: Collection, id: &str) -> SourceResult<Value> {
        let not_found = || SourceError::NotFound {
            collection: collection.name().to_string(),
            id: id.to_string(),
        };
        if matches!(id.trim(), "" | "." | "..") {
            return Err(not_found());
        }
        let url = self.endpoint(collection.record_base(), Some(id))?;
        match self.get_json(url, &[]).await {
            Err(SourceError::Http { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(not_found())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpDataSource {
        HttpDataSource::new(ApiConfig::new("http://localhost:5000")).unwrap()
    }

    #[test]
    fn list_url_uses_admin_route() {
        let (url, query) = client().list_url(Collection::Contracts, &FilterParams::new()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/contracts/admin/all");
        assert!(query.is_empty());
    }

    #[test]
    fn profile_lookup_by_user_uses_dedicated_route() {
        let params = FilterParams::for_user("u-1").with_limit(1);
        let (url, query) = client().list_url(Collection::Profiles, &params).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/profiles/user/u-1");
        assert_eq!(query, vec![("limit", "1".to_string())]);
    }

    #[test]
    fn other_collections_keep_user_filter_as_query() {
        let params = FilterParams::for_user("u-1");
        let (url, query) = client().list_url(Collection::Payments, &params).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/payments/admin/all");
        assert_eq!(query, vec![("userId", "u-1".to_string())]);
    }

    #[test]
    fn ids_are_escaped_into_one_segment() {
        let url = client()
            .endpoint(Collection::Users.record_base(), Some("a/b?c#d"))
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/users/a%2Fb%3Fc%23d");

        let params = FilterParams::for_user("../admin");
        let (url, _) = client().list_url(Collection::Profiles, &params).unwrap();
        assert_eq!(url.path_segments().unwrap().count(), 4);
        assert!(url.as_str().starts_with("http://localhost:5000/api/profiles/user/"));
    }

    #[tokio::test]
    async fn dot_segment_ids_are_not_found() {
        let err = client().get_by_id(Collection::Users, "..").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let config = ApiConfig::new("http://127.0.0.1:9")
            .with_timeout(std::time::Duration::from_millis(500));
        let source = HttpDataSource::new(config).unwrap();
        let err = source
            .get_all(Collection::Users, &FilterParams::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network");
    }
}
