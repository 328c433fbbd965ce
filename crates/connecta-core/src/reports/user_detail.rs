//! Single-user drill-down: the user record with their projects, payments,
//! proposals and profile.

use connecta_sources::{Collection, FilterParams};
use tracing::Instrument;

use crate::detail::{compose_detail, DetailComposer, DetailView};
use crate::error::Result;
use crate::export::ExportDocument;
use crate::fanout::NamedFetch;
use crate::metrics::METRICS;
use crate::obs;
use crate::snapshot::MetricSnapshot;

use super::ReportContext;

pub const RELATIONS: [&str; 4] = ["projects", "payments", "proposals", "profile"];

/// Root lookup plus one list fetch per relation.
pub fn fetches(ctx: &ReportContext, user_id: &str) -> (NamedFetch, Vec<NamedFetch>) {
    let source = &ctx.source;
    let scoped = || FilterParams::for_user(user_id).with_limit(ctx.config.list_limit);
    let root = NamedFetch::by_id(source.clone(), Collection::Users, user_id);
    let related = vec![
        NamedFetch::list(source.clone(), Collection::Projects, scoped()),
        NamedFetch::list(source.clone(), Collection::Payments, scoped()),
        NamedFetch::list(source.clone(), Collection::Proposals, scoped()),
        NamedFetch::list(source.clone(), Collection::Profiles, FilterParams::for_user(user_id))
            .named("profile")
            .single(),
    ];
    (root, related)
}

/// `totalEarnings` sums every related payment, whatever its status.
pub fn summarize(c: &DetailComposer<'_>, currency: &str) -> MetricSnapshot {
    MetricSnapshot::builder()
        .count("totalProjects", c.count("projects"))
        .count("totalPayments", c.count("payments"))
        .count("totalProposals", c.count("proposals"))
        .currency("totalEarnings", c.sum_field("payments", "amount"), currency)
        .build()
}

pub async fn fetch_user_detail(ctx: &ReportContext, user_id: &str) -> Result<DetailView> {
    async {
        let (root, related) = fetches(ctx, user_id);
        let currency = ctx.config.currency.clone();
        let composed = compose_detail(user_id, root, related, |c| summarize(c, &currency)).await;
        if let Ok(view) = &composed {
            METRICS.inc_reports_built();
            obs::emit_report_built("user-detail", view.stats.len(), view.is_degraded());
        }
        composed
    }
    .instrument(obs::report_span("user-detail"))
    .await
}

/// The embedded stats as a `metric,value,unit` table.
pub fn to_export(view: &DetailView) -> ExportDocument {
    ExportDocument::from_snapshot(&view.stats)
}
