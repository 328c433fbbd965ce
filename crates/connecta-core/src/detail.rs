//! Detail views: one root record plus related collections.
//!
//! The root is a hard dependency. If it cannot be fetched or decoded the
//! composition fails with [`ReportingError::RootNotFound`]. Relations are
//! soft: a failed relation becomes an empty collection and is flagged in
//! [`DetailView::statuses`].

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::calculator;
use crate::envelope::normalize_single;
use crate::error::{ReportingError, Result};
use crate::fanout::{self, NamedFetch, SourceStatus};
use crate::obs;
use crate::record::Record;
use crate::snapshot::{MetricSnapshot, MetricSnapshotBuilder};

/// A root record with its related sub-collections and summary metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub root: Record,
    pub relations: BTreeMap<String, Vec<Record>>,
    pub stats: MetricSnapshot,
    pub statuses: BTreeMap<String, SourceStatus>,
}

impl DetailView {
    /// Records of `relation`; empty when it failed or was not requested.
    pub fn relation(&self, relation: &str) -> &[Record] {
        self.relations
            .get(relation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_degraded(&self) -> bool {
        self.statuses.values().any(|s| *s == SourceStatus::Failed)
    }
}

/// Read-only view over fetched relations, handed to the summary function.
pub struct DetailComposer<'a> {
    root: &'a Record,
    relations: &'a BTreeMap<String, Vec<Record>>,
}

impl<'a> DetailComposer<'a> {
    pub fn root(&self) -> &Record {
        self.root
    }

    pub fn relation(&self, relation: &str) -> &[Record] {
        self.relations
            .get(relation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn count(&self, relation: &str) -> u64 {
        calculator::count(self.relation(relation))
    }

    pub fn count_where<P>(&self, relation: &str, predicate: P) -> u64
    where
        P: Fn(&Record) -> bool,
    {
        calculator::count_where(self.relation(relation), predicate)
    }

    pub fn sum_field(&self, relation: &str, field: &str) -> Decimal {
        calculator::sum_field(self.relation(relation), field)
    }

    pub fn sum_field_where<P>(&self, relation: &str, field: &str, predicate: P) -> Decimal
    where
        P: Fn(&Record) -> bool,
    {
        calculator::sum_field_where(self.relation(relation), field, predicate)
    }

    /// Builder pre-filled with `<relation>Count` for every relation.
    pub fn relation_counts(&self) -> MetricSnapshotBuilder {
        self.relations
            .iter()
            .fold(MetricSnapshot::builder(), |builder, (name, records)| {
                builder.count(&format!("{name}Count"), calculator::count(records))
            })
    }
}

/// Fetch `root_fetch` and every relation concurrently and assemble a view.
///
/// `summarize` sees whatever relations succeeded; failed ones are empty.
pub async fn compose_detail<F>(
    root_id: &str,
    root_fetch: NamedFetch,
    related: Vec<NamedFetch>,
    summarize: F,
) -> Result<DetailView>
where
    F: FnOnce(&DetailComposer<'_>) -> MetricSnapshot,
{
    let (_, root_future) = root_fetch.into_parts();
    let (root_result, mut outcomes) = tokio::join!(root_future, fanout::collect(related));

    let root = match root_result {
        Ok(envelope) => normalize_single(&envelope).ok_or_else(|| {
            root_missing(root_id, "response carried no record")
        })?,
        Err(err) => return Err(root_missing(root_id, &err.to_string())),
    };
    debug!(id = %root_id, relations = outcomes.len(), "detail root resolved");

    let statuses = outcomes.statuses();
    let names: Vec<String> = outcomes.names().map(str::to_string).collect();
    let relations: BTreeMap<String, Vec<Record>> = names
        .into_iter()
        .map(|name| {
            let records = outcomes.take(&name);
            (name, records)
        })
        .collect();

    let stats = summarize(&DetailComposer {
        root: &root,
        relations: &relations,
    });

    Ok(DetailView {
        root,
        relations,
        stats,
        statuses,
    })
}

fn root_missing(id: &str, reason: &str) -> ReportingError {
    obs::emit_root_missing(id, reason);
    ReportingError::RootNotFound {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}
