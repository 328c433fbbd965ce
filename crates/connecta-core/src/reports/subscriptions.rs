//! Subscription revenue and lifecycle counts.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use connecta_sources::Collection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::Instrument;

use crate::calculator::{count, count_where, currency_totals, record_currency, sum};
use crate::config::ReportingConfig;
use crate::export::ExportDocument;
use crate::fanout::{self, SourceOutcomes, SourceStatus};
use crate::metrics::METRICS;
use crate::obs;
use crate::record::Record;
use crate::snapshot::{MetricSnapshot, Money};
use crate::status::{Status, SubscriptionState};

use super::ReportContext;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStats {
    pub active_subscriptions: u64,
    pub total_subscriptions: u64,
    pub expired_subscriptions: u64,
    pub cancelled_subscriptions: u64,
    /// Subscriptions whose status is unrecognised or absent.
    pub unclassified_subscriptions: u64,
    /// Active subscriptions created between the start of the current month
    /// and `now`, in the reporting currency.
    pub monthly_revenue: Money,
    /// Reporting currency only; other currencies are in `currency_totals`.
    pub total_revenue: Money,
    pub price_per_subscription: Money,
    pub currency_totals: BTreeMap<String, Decimal>,
}

impl SubscriptionStats {
    /// A subscription without an `amount` is valued at the configured price.
    pub fn from_subscriptions(
        subscriptions: &[Record],
        config: &ReportingConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let state = |r: &Record| Status::<SubscriptionState>::of(r, "status");
        let amount = |r: &Record| Some(r.number("amount").unwrap_or(config.subscription_price));
        let month_start = now.date_naive().with_day(1).unwrap_or(now.date_naive());
        let home = config.currency.trim().to_ascii_uppercase();
        let in_home = |r: &Record| record_currency(r, "currency", &home) == home;

        let monthly = sum(subscriptions, |r| {
            let this_month = r
                .timestamp("createdAt")
                .is_some_and(|at| at.date_naive() >= month_start && at <= now);
            if state(r).is(SubscriptionState::Active) && this_month && in_home(r) {
                amount(r)
            } else {
                None
            }
        });
        let total_revenue = sum(subscriptions, |r| if in_home(r) { amount(r) } else { None });

        let priced: Vec<Record> = subscriptions
            .iter()
            .map(|r| {
                let mut value = r.as_value().clone();
                if r.number("amount").is_none() {
                    if let Some(map) = value.as_object_mut() {
                        map.insert(
                            "amount".to_string(),
                            serde_json::Value::String(config.subscription_price.to_string()),
                        );
                    }
                }
                Record::new(value)
            })
            .collect();

        let known = |s: SubscriptionState| count_where(subscriptions, |r| state(r).is(s));
        let active = known(SubscriptionState::Active);
        let expired = known(SubscriptionState::Expired);
        let cancelled = known(SubscriptionState::Cancelled);
        let total = count(subscriptions);

        SubscriptionStats {
            active_subscriptions: active,
            total_subscriptions: total,
            expired_subscriptions: expired,
            cancelled_subscriptions: cancelled,
            unclassified_subscriptions: total - active - expired - cancelled,
            monthly_revenue: Money::new(monthly, &config.currency),
            total_revenue: Money::new(total_revenue, &config.currency),
            price_per_subscription: Money::new(config.subscription_price, &config.currency),
            currency_totals: currency_totals(&priced, "amount", "currency", &config.currency),
        }
    }

    pub fn to_snapshot(&self) -> MetricSnapshot {
        let mut builder = MetricSnapshot::builder()
            .count("activeSubscriptions", self.active_subscriptions)
            .count("totalSubscriptions", self.total_subscriptions)
            .count("expiredSubscriptions", self.expired_subscriptions)
            .count("cancelledSubscriptions", self.cancelled_subscriptions)
            .count("unclassifiedSubscriptions", self.unclassified_subscriptions)
            .currency(
                "monthlyRevenue",
                self.monthly_revenue.amount,
                &self.monthly_revenue.currency,
            )
            .currency(
                "totalRevenue",
                self.total_revenue.amount,
                &self.total_revenue.currency,
            )
            .currency(
                "pricePerSubscription",
                self.price_per_subscription.amount,
                &self.price_per_subscription.currency,
            );
        for (currency, amount) in &self.currency_totals {
            builder = builder.currency(&format!("revenue.{currency}"), *amount, currency);
        }
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionReport {
    pub stats: SubscriptionStats,
    pub sources: BTreeMap<String, SourceStatus>,
}

impl SubscriptionReport {
    pub fn to_export(&self) -> ExportDocument {
        ExportDocument::from_snapshot(&self.stats.to_snapshot())
    }
}

pub fn build_subscriptions(
    outcomes: &SourceOutcomes,
    config: &ReportingConfig,
    now: DateTime<Utc>,
) -> SubscriptionReport {
    SubscriptionReport {
        stats: SubscriptionStats::from_subscriptions(
            outcomes.records(Collection::Subscriptions.name()),
            config,
            now,
        ),
        sources: outcomes.statuses(),
    }
}

pub async fn fetch_subscriptions(ctx: &ReportContext) -> SubscriptionReport {
    async {
        let outcomes = fanout::collect(vec![ctx.list(Collection::Subscriptions)]).await;
        let report = build_subscriptions(&outcomes, &ctx.config, ctx.now);
        METRICS.inc_reports_built();
        obs::emit_report_built(
            "subscriptions",
            report.stats.to_snapshot().len(),
            !outcomes.failed().is_empty(),
        );
        report
    }
    .instrument(obs::report_span("subscriptions"))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    fn subscriptions() -> Vec<Record> {
        vec![
            json!({ "status": "active", "amount": 5000, "createdAt": "2026-10-02T08:00:00Z" }),
            json!({ "status": "Active", "createdAt": "2026-10-10T08:00:00Z" }),
            json!({ "status": "active", "amount": 5000, "createdAt": "2026-09-30T23:59:59Z" }),
            json!({ "status": "expired", "amount": 5000, "createdAt": "2026-05-01" }),
            json!({ "status": "canceled", "amount": 20, "currency": "USD", "createdAt": "2026-10-03" }),
            json!({ "status": "paused", "amount": 5000 }),
        ]
        .into_iter()
        .map(Record::new)
        .collect()
    }

    #[test]
    fn lifecycle_counts_keep_unknown_statuses_apart() {
        let stats = SubscriptionStats::from_subscriptions(&subscriptions(), &ReportingConfig::default(), now());
        assert_eq!(stats.total_subscriptions, 6);
        assert_eq!(stats.active_subscriptions, 3);
        assert_eq!(stats.expired_subscriptions, 1);
        assert_eq!(stats.cancelled_subscriptions, 1);
        assert_eq!(stats.unclassified_subscriptions, 1);
    }

    #[test]
    fn revenue_uses_price_for_missing_amounts() {
        let stats = SubscriptionStats::from_subscriptions(&subscriptions(), &ReportingConfig::default(), now());
        assert_eq!(stats.monthly_revenue.amount, Decimal::from(10000));
        assert_eq!(stats.total_revenue.amount, Decimal::from(25000));
        assert_eq!(stats.total_revenue.currency, "NGN");
        assert_eq!(stats.price_per_subscription.amount, Decimal::from(5000));
        assert_eq!(stats.currency_totals["NGN"], Decimal::from(25000));
        assert_eq!(stats.currency_totals["USD"], Decimal::from(20));
    }

    #[test]
    fn foreign_currency_stays_out_of_reporting_totals() {
        let subs: Vec<Record> = vec![
            json!({ "status": "active", "amount": 20, "currency": "usd", "createdAt": "2026-10-02" }),
            json!({ "status": "active", "amount": 15, "currency": "USD", "createdAt": "2026-10-05" }),
        ]
        .into_iter()
        .map(Record::new)
        .collect();
        let stats = SubscriptionStats::from_subscriptions(&subs, &ReportingConfig::default(), now());
        assert_eq!(stats.active_subscriptions, 2);
        assert_eq!(stats.monthly_revenue.amount, Decimal::ZERO);
        assert_eq!(stats.total_revenue.amount, Decimal::ZERO);
        assert_eq!(stats.currency_totals.len(), 1);
        assert_eq!(stats.currency_totals["USD"], Decimal::from(35));
    }

    #[test]
    fn monthly_revenue_stops_at_now() {
        let subs: Vec<Record> = vec![
            json!({ "status": "active", "amount": 5000, "createdAt": "2026-10-16T08:59:59Z" }),
            json!({ "status": "active", "amount": 5000, "createdAt": "2026-10-16T09:00:01Z" }),
            json!({ "status": "active", "amount": 5000, "createdAt": "2026-10-28T00:00:00Z" }),
        ]
        .into_iter()
        .map(Record::new)
        .collect();
        let stats = SubscriptionStats::from_subscriptions(&subs, &ReportingConfig::default(), now());
        assert_eq!(stats.monthly_revenue.amount, Decimal::from(5000));
        assert_eq!(stats.total_revenue.amount, Decimal::from(15000));
    }

    #[test]
    fn export_is_metric_value_unit_table() {
        let stats = SubscriptionStats::from_subscriptions(&[], &ReportingConfig::default(), now());
        let report = SubscriptionReport {
            stats,
            sources: BTreeMap::new(),
        };
        let doc = report.to_export();
        assert_eq!(doc.header(), ["metric", "value", "unit"]);
        assert!(doc
            .body()
            .iter()
            .any(|row| row[0] == "pricePerSubscription" && row[1] == "5000" && row[2] == "NGN"));
    }
}
