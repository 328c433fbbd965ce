//! Platform overview: headline totals, month-over-month trends and the
//! health of every source that fed them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use connecta_sources::Collection;
use serde::Serialize;
use tracing::Instrument;

use crate::calculator::{count, count_where, sum_field_where};
use crate::config::ReportingConfig;
use crate::export::ExportDocument;
use crate::fanout::{self, NamedFetch, SourceOutcomes, SourceStatus};
use crate::metrics::METRICS;
use crate::obs;
use crate::record::Record;
use crate::snapshot::MetricSnapshot;
use crate::status::{ContractState, JobState, PaymentState, ProjectState, ProposalState, Status, UserType};
use crate::timeseries::{events_from_records, month_over_month, TimedValue};

use super::ReportContext;

/// Collections the dashboard reads.
pub const SOURCES: [Collection; 6] = [
    Collection::Users,
    Collection::Jobs,
    Collection::Projects,
    Collection::Proposals,
    Collection::Payments,
    Collection::Contracts,
];

/// Timestamp fields tried, in order, to date a payment.
pub const PAYMENT_DATE_FIELDS: [&str; 2] = ["transactionDate", "createdAt"];

/// Month-over-month change, in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trends {
    pub users: f64,
    pub jobs: f64,
    pub projects: f64,
    pub proposals: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub metrics: MetricSnapshot,
    pub trends: Trends,
    pub sources: BTreeMap<String, SourceStatus>,
}

impl DashboardReport {
    /// Headline metrics followed by the trend percentages.
    pub fn to_export(&self) -> ExportDocument {
        let trends = MetricSnapshot::builder()
            .percentage("usersTrend", self.trends.users)
            .percentage("jobsTrend", self.trends.jobs)
            .percentage("projectsTrend", self.trends.projects)
            .percentage("proposalsTrend", self.trends.proposals)
            .percentage("revenueTrend", self.trends.revenue)
            .build();
        ExportDocument::from_snapshot(&self.metrics.merged(&trends))
    }

    pub fn is_degraded(&self) -> bool {
        self.sources.values().any(|s| *s == SourceStatus::Failed)
    }
}

pub fn fetches(ctx: &ReportContext) -> Vec<NamedFetch> {
    SOURCES.iter().map(|c| ctx.list(*c)).collect()
}

fn is_completed_payment(record: &Record) -> bool {
    Status::<PaymentState>::of(record, "status").is(PaymentState::Completed)
}

/// Derive the dashboard from collected outcomes. Failed sources count as
/// empty and are flagged in `sources`.
pub fn build_dashboard(
    outcomes: &SourceOutcomes,
    config: &ReportingConfig,
    now: DateTime<Utc>,
) -> DashboardReport {
    let users = outcomes.records(Collection::Users.name());
    let jobs = outcomes.records(Collection::Jobs.name());
    let projects = outcomes.records(Collection::Projects.name());
    let proposals = outcomes.records(Collection::Proposals.name());
    let payments = outcomes.records(Collection::Payments.name());
    let contracts = outcomes.records(Collection::Contracts.name());

    let user_type = |r: &Record| Status::<UserType>::of(r, "userType");
    let job = |r: &Record| Status::<JobState>::of(r, "status");
    let project = |r: &Record| Status::<ProjectState>::of(r, "status");
    let payment = |r: &Record| Status::<PaymentState>::of(r, "status");

    let metrics = MetricSnapshot::builder()
        .count("totalUsers", count(users))
        .count("totalClients", count_where(users, |r| user_type(r).is(UserType::Client)))
        .count(
            "totalFreelancers",
            count_where(users, |r| user_type(r).is(UserType::Freelancer)),
        )
        .count("totalJobs", count(jobs))
        .count("activeJobs", count_where(jobs, |r| job(r).is(JobState::Open)))
        .count("totalProjects", count(projects))
        .count(
            "activeProjects",
            count_where(projects, |r| project(r).is(ProjectState::InProgress)),
        )
        .count(
            "completedProjects",
            count_where(projects, |r| project(r).is(ProjectState::Completed)),
        )
        .currency(
            "totalRevenue",
            sum_field_where(payments, "amount", is_completed_payment),
            &config.currency,
        )
        .count(
            "pendingPayments",
            count_where(payments, |r| payment(r).is(PaymentState::Pending)),
        )
        .count("totalProposals", count(proposals))
        .count(
            "pendingProposals",
            count_where(proposals, |r| {
                Status::<ProposalState>::of(r, "status").is(ProposalState::Pending)
            }),
        )
        .count("totalContracts", count(contracts))
        .count(
            "activeContracts",
            count_where(contracts, |r| {
                Status::<ContractState>::of(r, "status").is(ContractState::Active)
            }),
        )
        .build();

    let created = |records: &[Record]| events_from_records(records, &["createdAt"], None);
    let revenue: Vec<TimedValue> = {
        let completed: Vec<Record> = payments
            .iter()
            .filter(|r| is_completed_payment(r))
            .cloned()
            .collect();
        events_from_records(&completed, &PAYMENT_DATE_FIELDS, Some("amount"))
    };
    let trends = Trends {
        users: month_over_month(&created(users), now),
        jobs: month_over_month(&created(jobs), now),
        projects: month_over_month(&created(projects), now),
        proposals: month_over_month(&created(proposals), now),
        revenue: month_over_month(&revenue, now),
    };

    DashboardReport {
        generated_at: now,
        metrics,
        trends,
        sources: outcomes.statuses(),
    }
}

pub async fn fetch_dashboard(ctx: &ReportContext) -> DashboardReport {
    async {
        let outcomes = fanout::collect(fetches(ctx)).await;
        let report = build_dashboard(&outcomes, &ctx.config, ctx.now);
        METRICS.inc_reports_built();
        obs::emit_report_built("dashboard", report.metrics.len(), report.is_degraded());
        report
    }
    .instrument(obs::report_span("dashboard"))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{ErrorInfo, SourceOutcome};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    fn ok(values: Vec<Value>) -> SourceOutcome {
        SourceOutcome::Ok {
            records: values.into_iter().map(Record::new).collect(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    #[test]
    fn headline_totals() {
        let outcomes: SourceOutcomes = [
            (
                "users".to_string(),
                ok(vec![
                    json!({ "userType": "client" }),
                    json!({ "userType": "client" }),
                    json!({ "userType": "client" }),
                    json!({ "userType": "freelancer" }),
                    json!({ "userType": "freelancer" }),
                ]),
            ),
            (
                "jobs".to_string(),
                ok(vec![
                    json!({ "status": "open" }),
                    json!({ "status": "open" }),
                    json!({ "status": "closed" }),
                ]),
            ),
            (
                "payments".to_string(),
                ok(vec![
                    json!({ "amount": 1000, "status": "completed" }),
                    json!({ "amount": 500, "status": "pending" }),
                ]),
            ),
        ]
        .into_iter()
        .collect();

        let report = build_dashboard(&outcomes, &ReportingConfig::default(), now());
        let m = &report.metrics;
        assert_eq!(m.count("totalUsers"), Some(5));
        assert_eq!(m.count("totalClients"), Some(3));
        assert_eq!(m.count("totalFreelancers"), Some(2));
        assert_eq!(m.count("activeJobs"), Some(2));
        assert_eq!(m.amount("totalRevenue"), Some(Decimal::from(1000)));
        assert_eq!(m.count("pendingPayments"), Some(1));
        assert_eq!(m.count("totalProjects"), Some(0));
    }

    #[test]
    fn failed_source_is_flagged_not_fatal() {
        let outcomes: SourceOutcomes = [
            ("users".to_string(), ok(vec![json!({ "userType": "client" })])),
            (
                "payments".to_string(),
                SourceOutcome::Failed {
                    error: ErrorInfo {
                        kind: "http".to_string(),
                        message: "HTTP 502".to_string(),
                        status: Some(502),
                    },
                },
            ),
        ]
        .into_iter()
        .collect();
        let report = build_dashboard(&outcomes, &ReportingConfig::default(), now());
        assert_eq!(report.metrics.count("totalUsers"), Some(1));
        assert_eq!(report.metrics.amount("totalRevenue"), Some(Decimal::ZERO));
        assert_eq!(report.sources["payments"], SourceStatus::Failed);
        assert_eq!(report.sources["users"], SourceStatus::Ok);
        assert!(report.is_degraded());
    }

    #[test]
    fn trends_compare_calendar_months() {
        let outcomes: SourceOutcomes = [
            (
                "users".to_string(),
                ok(vec![
                    json!({ "createdAt": "2026-09-10T00:00:00Z" }),
                    json!({ "createdAt": "2026-09-11T00:00:00Z" }),
                    json!({ "createdAt": "2026-10-01T00:00:00Z" }),
                ]),
            ),
            (
                "payments".to_string(),
                ok(vec![
                    json!({ "amount": 200, "status": "completed", "transactionDate": "2026-09-02" }),
                    json!({ "amount": 300, "status": "completed", "createdAt": "2026-10-02" }),
                    json!({ "amount": 9999, "status": "failed", "createdAt": "2026-10-02" }),
                ]),
            ),
        ]
        .into_iter()
        .collect();
        let report = build_dashboard(&outcomes, &ReportingConfig::default(), now());
        assert_eq!(report.trends.users, -50.0);
        assert_eq!(report.trends.revenue, 50.0);
        assert_eq!(report.trends.jobs, 0.0);
    }

    #[test]
    fn same_inputs_give_identical_snapshots() {
        let build = |order: &[usize]| {
            let payments = [
                json!({ "amount": 0.1, "status": "completed" }),
                json!({ "amount": 0.2, "status": "completed" }),
                json!({ "amount": 0.3, "status": "completed" }),
            ];
            let outcomes: SourceOutcomes = [(
                "payments".to_string(),
                ok(order.iter().map(|i| payments[*i].clone()).collect()),
            )]
            .into_iter()
            .collect();
            build_dashboard(&outcomes, &ReportingConfig::default(), now())
        };
        let a = build(&[0, 1, 2]);
        let b = build(&[2, 0, 1]);
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.metrics.digest(), b.metrics.digest());
        assert_eq!(a.metrics.amount("totalRevenue"), Some(Decimal::new(6, 1)));
    }
}
