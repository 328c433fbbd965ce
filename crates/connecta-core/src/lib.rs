//! Connecta Core: aggregation and reporting engine for the admin console.
//!
//! Data flows one way: raw source envelopes are normalized into records,
//! fanned-in per source, reduced to metrics and calendar buckets, and then
//! rendered as report JSON or CSV. Nothing here mutates another stage's
//! output.
//!
//! ## Layer 1 - Reporting
//!
//! - `envelope`: the closed set of response shapes and their normalization
//! - `fanout`: concurrent, failure-isolated collection across sources
//! - `calculator`: order-independent counts, sums and percentages
//! - `timeseries`: dense trailing-window bucketing with explicit `now`
//! - `detail`: root-plus-relations views with embedded stats
//! - `export`: RFC 4180 CSV documents
//! - `reports`: the dashboard, analytics, users, subscriptions and user-detail reports

pub mod calculator;
pub mod config;
pub mod detail;
pub mod envelope;
pub mod error;
pub mod export;
pub mod fanout;
pub mod metrics;
pub mod obs;
pub mod record;
pub mod reports;
pub mod snapshot;
pub mod status;
pub mod telemetry;
pub mod timeseries;

pub use calculator::{
    count, count_percentage, count_where, currency_totals, group_count_by, group_count_by_field,
    growth_rate, percentage, sum, sum_field, sum_field_where, GroupKey,
};
pub use config::ReportingConfig;
pub use detail::{compose_detail, DetailComposer, DetailView};
pub use envelope::{normalize, normalize_keyed, normalize_owned, normalize_single, Envelope};
pub use error::{ReportingError, Result};
pub use export::{export_filename, to_csv, write_csv, write_csv_in, Column, ExportDocument};
pub use fanout::{collect, ErrorInfo, NamedFetch, SourceOutcome, SourceOutcomes, SourceStatus};
pub use record::Record;
pub use reports::{ReportContext, ReportKind};
pub use snapshot::{MetricSnapshot, MetricValue, Money};
pub use status::{Status, Vocabulary};
pub use timeseries::{bucket, Granularity, PeriodKey, TimeBucket, TimedValue};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
