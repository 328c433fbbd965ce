//! Backend collections and list-query parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A backend collection the admin console reads from.
///
/// Each collection is versioned independently on the server side, so the
/// response shapes differ between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Jobs,
    Projects,
    Proposals,
    Payments,
    Contracts,
    Subscriptions,
    Profiles,
}

impl Collection {
    /// Every collection, in a fixed order.
    pub const ALL: [Collection; 8] = [
        Collection::Users,
        Collection::Jobs,
        Collection::Projects,
        Collection::Proposals,
        Collection::Payments,
        Collection::Contracts,
        Collection::Subscriptions,
        Collection::Profiles,
    ];

    /// Lowercase plural name, also used as the fan-out source name.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Jobs => "jobs",
            Collection::Projects => "projects",
            Collection::Proposals => "proposals",
            Collection::Payments => "payments",
            Collection::Contracts => "contracts",
            Collection::Subscriptions => "subscriptions",
            Collection::Profiles => "profiles",
        }
    }

    /// Admin list endpoint.
    pub fn list_path(&self) -> &'static str {
        match self {
            Collection::Users => "/api/users",
            Collection::Jobs => "/api/jobs",
            Collection::Projects => "/api/projects",
            Collection::Proposals => "/api/proposals",
            Collection::Payments => "/api/payments/admin/all",
            Collection::Contracts => "/api/contracts/admin/all",
            Collection::Subscriptions => "/api/subscriptions/admin/all",
            Collection::Profiles => "/api/profiles",
        }
    }

    /// Base of the single-record endpoint; the record id is appended as one
    /// escaped path segment.
    pub fn record_base(&self) -> &'static str {
        match self {
            Collection::Users => "/api/users",
            Collection::Jobs => "/api/jobs",
            Collection::Projects => "/api/projects",
            Collection::Proposals => "/api/proposals",
            Collection::Payments => "/api/payments",
            Collection::Contracts => "/api/contracts",
            Collection::Subscriptions => "/api/subscriptions",
            Collection::Profiles => "/api/profiles",
        }
    }

    /// Top-level key a source wraps its list in when it does not use `data`.
    pub fn envelope_key(&self) -> Option<&'static str> {
        match self {
            Collection::Subscriptions => Some("subscriptions"),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Collection::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| format!("unknown collection: {s}"))
    }
}

/// Optional narrowing for list queries.
///
/// Serialized with the camelCase names the admin API expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records related to one user.
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string pairs in a stable order.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(v) = &self.user_id {
            query.push(("userId", v.clone()));
        }
        if let Some(v) = &self.user_type {
            query.push(("userType", v.clone()));
        }
        if let Some(v) = &self.status {
            query.push(("status", v.clone()));
        }
        if let Some(v) = &self.search {
            query.push(("search", v.clone()));
        }
        if let Some(v) = self.limit {
            query.push(("limit", v.to_string()));
        }
        if let Some(v) = self.page {
            query.push(("page", v.to_string()));
        }
        query
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
