//! Structured lifecycle events for report runs.
//!
//! Every event carries an `event` field so log pipelines can filter on it,
//! e.g. `event=source.failed`.

use tracing::{info, warn};
use uuid::Uuid;

/// A `connecta.report` span with a fresh v4 run id, for instrumenting
/// async report runs.
///
/// ```ignore
/// async { /* fetch and build */ }.instrument(report_span("dashboard")).await
/// ```
pub fn report_span(report: &str) -> tracing::Span {
    let run_id = Uuid::new_v4().to_string();
    tracing::info_span!("connecta.report", report = %report, run_id = %run_id)
}

/// RAII guard entering a `connecta.report` span, for synchronous runs.
pub struct ReportSpan {
    run_id: String,
    _span: tracing::span::EnteredSpan,
}

impl ReportSpan {
    /// Enter a span with a fresh v4 run id.
    pub fn enter(report: &str) -> Self {
        Self::enter_with_id(report, &Uuid::new_v4().to_string())
    }

    pub fn enter_with_id(report: &str, run_id: &str) -> Self {
        let span = tracing::info_span!("connecta.report", report = %report, run_id = %run_id);
        Self {
            run_id: run_id.to_string(),
            _span: span.entered(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

pub fn emit_fanout_completed(sources: usize, ok: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "fanout.completed",
        sources = sources,
        ok = ok,
        failed = failed,
        duration_ms = duration_ms,
    );
}

/// A fan-out source failed and was degraded to an empty collection.
pub fn emit_source_failed(source: &str, kind: &str, error: &dyn std::fmt::Display) {
    warn!(event = "source.failed", source = %source, kind = %kind, error = %error);
}

pub fn emit_root_missing(id: &str, reason: &str) {
    warn!(event = "detail.root_missing", id = %id, reason = %reason);
}

pub fn emit_report_built(report: &str, metrics: usize, degraded: bool) {
    info!(
        event = "report.built",
        report = %report,
        metrics = metrics,
        degraded = degraded,
    );
}

pub fn emit_export_written(path: &str, rows: usize, bytes: usize) {
    info!(event = "export.written", path = %path, rows = rows, bytes = bytes);
}

/// A cell could not be rendered and was exported as an empty string.
pub fn emit_cell_unrenderable(row: usize, column: usize, reason: &str) {
    warn!(
        event = "cell.unrenderable",
        row = row,
        column = column,
        reason = %reason,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_span_generates_run_id() {
        let span = ReportSpan::enter("dashboard");
        assert!(Uuid::parse_str(span.run_id()).is_ok());
    }

    #[test]
    fn report_span_keeps_given_id() {
        let span = ReportSpan::enter_with_id("analytics", "run-1");
        assert_eq!(span.run_id(), "run-1");
    }
}
