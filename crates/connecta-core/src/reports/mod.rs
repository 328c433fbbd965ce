//! Concrete admin reports.
//!
//! Each report has a pure `build_*` function over collected
//! [`SourceOutcomes`](crate::fanout::SourceOutcomes) and an async `fetch_*`
//! wrapper that runs the fan-out against a [`ReportContext`].

pub mod analytics;
pub mod dashboard;
pub mod subscriptions;
pub mod user_detail;
pub mod users;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use connecta_sources::{Collection, DataSource, FilterParams};
use serde::{Deserialize, Serialize};

use crate::config::ReportingConfig;
use crate::fanout::NamedFetch;

/// The reports the console offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Dashboard,
    Analytics,
    /// Daily completed-payment revenue.
    Revenue,
    Users,
    Subscriptions,
    UserDetail,
}

impl ReportKind {
    pub const ALL: [ReportKind; 6] = [
        ReportKind::Dashboard,
        ReportKind::Analytics,
        ReportKind::Revenue,
        ReportKind::Users,
        ReportKind::Subscriptions,
        ReportKind::UserDetail,
    ];

    /// Name used in logs and export file names.
    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::Dashboard => "dashboard",
            ReportKind::Analytics => "analytics",
            ReportKind::Revenue => "revenue",
            ReportKind::Users => "users",
            ReportKind::Subscriptions => "subscriptions",
            ReportKind::UserDetail => "user-detail",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| format!("unknown report kind: {s}"))
    }
}

/// Everything a report run needs: where to read, how to compute, and the
/// instant the calendar windows end at.
#[derive(Clone)]
pub struct ReportContext {
    pub source: Arc<dyn DataSource>,
    pub config: ReportingConfig,
    pub now: DateTime<Utc>,
}

impl ReportContext {
    pub fn new(source: Arc<dyn DataSource>, config: ReportingConfig) -> Self {
        Self {
            source,
            config,
            now: Utc::now(),
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// List fetch of `collection` with the configured page limit.
    pub fn list(&self, collection: Collection) -> NamedFetch {
        NamedFetch::list(
            self.source.clone(),
            collection,
            FilterParams::new().with_limit(self.config.list_limit),
        )
    }
}

impl fmt::Debug for ReportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportContext")
            .field("config", &self.config)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_from_name() {
        for kind in ReportKind::ALL {
            assert_eq!(kind.name().parse::<ReportKind>(), Ok(kind));
        }
        assert_eq!("USER_DETAIL".parse::<ReportKind>(), Ok(ReportKind::UserDetail));
        assert!("payroll".parse::<ReportKind>().is_err());
    }
}
