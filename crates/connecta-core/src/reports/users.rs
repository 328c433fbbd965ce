//! User directory: headline counts and a text search.

use std::collections::BTreeMap;

use connecta_sources::Collection;
use serde::Serialize;
use tracing::Instrument;

use crate::calculator::{count, count_where};
use crate::export::{Column, ExportDocument};
use crate::fanout::{self, SourceOutcomes, SourceStatus};
use crate::metrics::METRICS;
use crate::obs;
use crate::record::Record;
use crate::snapshot::MetricSnapshot;
use crate::status::{Status, UserType};

use super::ReportContext;

/// Fields matched by [`search_users`].
pub const SEARCH_FIELDS: [&str; 3] = ["firstName", "lastName", "email"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserDirectoryStats {
    pub total: u64,
    pub clients: u64,
    pub freelancers: u64,
    /// Users not explicitly deactivated.
    pub active: u64,
    /// Users with `isActive == false`.
    pub banned: u64,
}

impl UserDirectoryStats {
    pub fn from_users(users: &[Record]) -> Self {
        let user_type = |r: &Record| Status::<UserType>::of(r, "userType");
        let banned = count_where(users, is_banned);
        UserDirectoryStats {
            total: count(users),
            clients: count_where(users, |r| user_type(r).is(UserType::Client)),
            freelancers: count_where(users, |r| user_type(r).is(UserType::Freelancer)),
            active: count(users) - banned,
            banned,
        }
    }

    pub fn to_snapshot(&self) -> MetricSnapshot {
        MetricSnapshot::builder()
            .count("total", self.total)
            .count("clients", self.clients)
            .count("freelancers", self.freelancers)
            .count("active", self.active)
            .count("banned", self.banned)
            .build()
    }
}

fn is_banned(user: &Record) -> bool {
    user.bool_field("isActive") == Some(false)
}

/// Users whose first name, last name or email contains `query`, ignoring
/// case. A blank query matches everyone. Input order is kept.
pub fn search_users(users: &[Record], query: &str) -> Vec<Record> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return users.to_vec();
    }
    users
        .iter()
        .filter(|user| {
            SEARCH_FIELDS.iter().any(|field| {
                user.str_field(field)
                    .is_some_and(|v| v.to_lowercase().contains(&needle))
            })
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDirectoryReport {
    /// Computed over every user, regardless of the search.
    pub stats: UserDirectoryStats,
    pub users: Vec<Record>,
    pub sources: BTreeMap<String, SourceStatus>,
}

impl UserDirectoryReport {
    pub fn columns() -> Vec<Column> {
        vec![
            Column::new("ID", "_id").or("id"),
            Column::new("First Name", "firstName"),
            Column::new("Last Name", "lastName"),
            Column::new("Email", "email"),
            Column::new("Type", "userType"),
            Column::new("Active", "isActive"),
            Column::new("Joined", "createdAt"),
        ]
    }

    pub fn to_export(&self) -> ExportDocument {
        ExportDocument::from_records(&self.users, &Self::columns())
    }
}

pub fn build_user_directory(outcomes: &SourceOutcomes, search: Option<&str>) -> UserDirectoryReport {
    let all = outcomes.records(Collection::Users.name());
    UserDirectoryReport {
        stats: UserDirectoryStats::from_users(all),
        users: search_users(all, search.unwrap_or_default()),
        sources: outcomes.statuses(),
    }
}

pub async fn fetch_user_directory(ctx: &ReportContext, search: Option<&str>) -> UserDirectoryReport {
    async {
        let outcomes = fanout::collect(vec![ctx.list(Collection::Users)]).await;
        let report = build_user_directory(&outcomes, search);
        METRICS.inc_reports_built();
        obs::emit_report_built("users", report.users.len(), !outcomes.failed().is_empty());
        report
    }
    .instrument(obs::report_span("users"))
    .await
}
