//! Structured events emitted by the reporting pipeline.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use connecta_core::obs::{emit_cell_unrenderable, emit_fanout_completed, ReportSpan};
use connecta_core::reports::dashboard::fetch_dashboard;
use connecta_core::{ReportContext, ReportingConfig};
use connecta_sources::{Collection, DataSource, InjectedFailure, MemoryDataSource};
use serde_json::json;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_fanout_completed_logs_counts() {
    emit_fanout_completed(6, 5, 1, 42);
    assert!(logs_contain("fanout.completed"));
}

#[traced_test]
#[test]
fn test_cell_unrenderable_is_logged() {
    emit_cell_unrenderable(3, 1, "object value");
    assert!(logs_contain("cell.unrenderable"));
    assert!(logs_contain("object value"));
}

#[traced_test]
#[test]
fn test_report_span_enter_creates_span() {
    let span = ReportSpan::enter_with_id("dashboard", "run-span-1");
    tracing::info!("inside report span");
    drop(span);
    assert!(logs_contain("run-span-1"));
}

#[traced_test]
#[tokio::test]
async fn test_failed_source_is_reported_once_and_report_still_built() {
    let source: Arc<dyn DataSource> = Arc::new(
        MemoryDataSource::new()
            .with_collection(Collection::Users, json!([{ "_id": "u1", "userType": "client" }]))
            .with_failure(Collection::Contracts, InjectedFailure::Status(503)),
    );
    let ctx = ReportContext::new(source, ReportingConfig::default())
        .at(Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap());

    let report = fetch_dashboard(&ctx).await;

    assert_eq!(report.metrics.count("totalUsers"), Some(1));
    assert!(report.is_degraded());
    assert!(logs_contain("source.failed"));
    assert!(logs_contain("report.built"));
}
