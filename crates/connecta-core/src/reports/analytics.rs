//! Trend charts: registrations, posted vs filled gigs, daily revenue and the
//! proposal success rate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use connecta_sources::Collection;
use serde::Serialize;
use tracing::Instrument;

use crate::calculator::{count, count_percentage};
use crate::config::ReportingConfig;
use crate::export::ExportDocument;
use crate::fanout::{self, NamedFetch, SourceOutcomes, SourceStatus};
use crate::metrics::METRICS;
use crate::obs;
use crate::record::Record;
use crate::snapshot::MetricSnapshot;
use crate::status::{JobState, PaymentState, ProposalState, Status};
use crate::timeseries::{bucket, events_from_records, Granularity, TimeBucket};

use super::dashboard::PAYMENT_DATE_FIELDS;
use super::ReportContext;

pub const SOURCES: [Collection; 4] = [
    Collection::Users,
    Collection::Jobs,
    Collection::Proposals,
    Collection::Payments,
];

/// Jobs posted per month against jobs filled per month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GigPerformance {
    pub posted: Vec<TimeBucket>,
    pub filled: Vec<TimeBucket>,
}

/// Proposal outcomes. `rate` is the accepted share of all proposals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalSuccess {
    pub total: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub pending: u64,
    /// Withdrawn, unknown or missing status.
    pub other: u64,
    pub rate: f64,
}

impl ProposalSuccess {
    pub fn from_proposals(proposals: &[Record]) -> Self {
        let mut by_state: BTreeMap<&'static str, u64> = BTreeMap::new();
        for proposal in proposals {
            let label = match Status::<ProposalState>::of(proposal, "status").known() {
                Some(ProposalState::Accepted) => "accepted",
                Some(ProposalState::Rejected) => "rejected",
                Some(ProposalState::Pending) => "pending",
                _ => "other",
            };
            *by_state.entry(label).or_default() += 1;
        }
        let get = |label: &str| by_state.get(label).copied().unwrap_or(0);
        let total = count(proposals);
        ProposalSuccess {
            total,
            accepted: get("accepted"),
            rejected: get("rejected"),
            pending: get("pending"),
            other: get("other"),
            rate: count_percentage(get("accepted"), total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub user_growth: Vec<TimeBucket>,
    pub gig_performance: GigPerformance,
    pub weekly_revenue: Vec<TimeBucket>,
    pub proposal_success_rate: ProposalSuccess,
    pub sources: BTreeMap<String, SourceStatus>,
}

impl AnalyticsReport {
    /// Monthly series side by side.
    pub fn to_export(&self) -> ExportDocument {
        ExportDocument::from_series(&[
            ("newUsers", self.user_growth.as_slice()),
            ("jobsPosted", self.gig_performance.posted.as_slice()),
            ("jobsFilled", self.gig_performance.filled.as_slice()),
        ])
    }

    /// Daily completed-payment revenue.
    pub fn revenue_export(&self) -> ExportDocument {
        ExportDocument::from_buckets(&self.weekly_revenue)
    }

    pub fn proposal_snapshot(&self) -> MetricSnapshot {
        let p = &self.proposal_success_rate;
        MetricSnapshot::builder()
            .count("totalProposals", p.total)
            .count("acceptedProposals", p.accepted)
            .count("rejectedProposals", p.rejected)
            .count("pendingProposals", p.pending)
            .percentage("proposalSuccessRate", p.rate)
            .build()
    }

    pub fn is_degraded(&self) -> bool {
        self.sources.values().any(|s| *s == SourceStatus::Failed)
    }
}

pub fn fetches(ctx: &ReportContext) -> Vec<NamedFetch> {
    SOURCES.iter().map(|c| ctx.list(*c)).collect()
}

/// A job counts as filled once it is in progress or closed.
fn is_filled(job: &Record) -> bool {
    matches!(
        Status::<JobState>::of(job, "status").known(),
        Some(JobState::InProgress | JobState::Closed)
    )
}

pub fn build_analytics(
    outcomes: &SourceOutcomes,
    config: &ReportingConfig,
    now: DateTime<Utc>,
) -> AnalyticsReport {
    let users = outcomes.records(Collection::Users.name());
    let jobs = outcomes.records(Collection::Jobs.name());
    let proposals = outcomes.records(Collection::Proposals.name());
    let payments = outcomes.records(Collection::Payments.name());

    let months = |records: &[Record], dates: &[&str], value: Option<&str>| {
        bucket(
            &events_from_records(records, dates, value),
            config.month_window,
            Granularity::Month,
            now,
        )
    };

    let filled: Vec<Record> = jobs.iter().filter(|j| is_filled(j)).cloned().collect();
    let completed: Vec<Record> = payments
        .iter()
        .filter(|p| Status::<PaymentState>::of(p, "status").is(PaymentState::Completed))
        .cloned()
        .collect();

    AnalyticsReport {
        generated_at: now,
        user_growth: months(users, &["createdAt"], None),
        gig_performance: GigPerformance {
            posted: months(jobs, &["createdAt"], None),
            filled: months(&filled, &["updatedAt", "createdAt"], None),
        },
        weekly_revenue: bucket(
            &events_from_records(&completed, &PAYMENT_DATE_FIELDS, Some("amount")),
            config.day_window,
            Granularity::Day,
            now,
        ),
        proposal_success_rate: ProposalSuccess::from_proposals(proposals),
        sources: outcomes.statuses(),
    }
}

pub async fn fetch_analytics(ctx: &ReportContext) -> AnalyticsReport {
    async {
        let outcomes = fanout::collect(fetches(ctx)).await;
        let report = build_analytics(&outcomes, &ctx.config, ctx.now);
        METRICS.inc_reports_built();
        obs::emit_report_built(
            "analytics",
            report.user_growth.len() + report.weekly_revenue.len(),
            report.is_degraded(),
        );
        report
    }
    .instrument(obs::report_span("analytics"))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::SourceOutcome;
    use crate::timeseries::total;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    fn outcomes(entries: Vec<(&str, Vec<Value>)>) -> SourceOutcomes {
        entries
            .into_iter()
            .map(|(name, values)| {
                (
                    name.to_string(),
                    SourceOutcome::Ok {
                        records: values.into_iter().map(Record::new).collect(),
                    },
                )
            })
            .collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    #[test]
    fn proposal_success_rate_is_accepted_share() {
        let records: Vec<Record> = ["accepted", "accepted", "rejected", "pending"]
            .iter()
            .map(|s| Record::new(json!({ "status": s })))
            .collect();
        let success = ProposalSuccess::from_proposals(&records);
        assert_eq!(success.total, 4);
        assert_eq!(success.accepted, 2);
        assert_eq!(success.rejected, 1);
        assert_eq!(success.pending, 1);
        assert_eq!(success.rate, 50.0);
    }

    #[test]
    fn no_proposals_means_zero_rate() {
        assert_eq!(ProposalSuccess::from_proposals(&[]).rate, 0.0);
    }

    #[test]
    fn series_have_configured_lengths() {
        let report = build_analytics(&SourceOutcomes::default(), &ReportingConfig::default(), now());
        assert_eq!(report.user_growth.len(), 12);
        assert_eq!(report.gig_performance.posted.len(), 12);
        assert_eq!(report.gig_performance.filled.len(), 12);
        assert_eq!(report.weekly_revenue.len(), 7);
        assert_eq!(report.weekly_revenue[6].key.to_string(), "2026-10-16");
    }

    #[test]
    fn gigs_and_revenue_are_bucketed() {
        let data = outcomes(vec![
            (
                "jobs",
                vec![
                    json!({ "status": "open", "createdAt": "2026-10-01" }),
                    json!({ "status": "closed", "createdAt": "2026-08-01", "updatedAt": "2026-10-03" }),
                    json!({ "status": "in_progress", "createdAt": "2026-09-01" }),
                ],
            ),
            (
                "payments",
                vec![
                    json!({ "amount": 1500, "status": "successful", "transactionDate": "2026-10-15T10:00:00Z" }),
                    json!({ "amount": 500, "status": "completed", "createdAt": "2026-10-16T01:00:00Z" }),
                    json!({ "amount": 700, "status": "pending", "createdAt": "2026-10-16T01:00:00Z" }),
                    json!({ "amount": 900, "status": "completed", "createdAt": "2026-10-01T01:00:00Z" }),
                ],
            ),
        ]);
        let report = build_analytics(&data, &ReportingConfig::default(), now());

        let posted = &report.gig_performance.posted;
        assert_eq!(total(posted), Decimal::from(3));
        let filled = &report.gig_performance.filled;
        assert_eq!(filled[11].value, Decimal::ONE);
        assert_eq!(filled[10].value, Decimal::ONE);

        assert_eq!(report.weekly_revenue[5].value, Decimal::from(1500));
        assert_eq!(report.weekly_revenue[6].value, Decimal::from(500));
        assert_eq!(total(&report.weekly_revenue), Decimal::from(2000));
    }

    #[test]
    fn export_has_one_row_per_month() {
        let report = build_analytics(&SourceOutcomes::default(), &ReportingConfig::default(), now());
        let doc = report.to_export();
        assert_eq!(doc.header(), ["period", "label", "newUsers", "jobsPosted", "jobsFilled"]);
        assert_eq!(doc.body().len(), 12);
        assert_eq!(report.revenue_export().body().len(), 7);
    }
}
