//! CSV export of computed metrics.
//!
//! An [`ExportDocument`] is an ordered list of rows whose first row is the
//! header. [`to_csv`] writes it out as RFC 4180 text: comma separated, quoted
//! only when a cell holds a comma, quote or line break, and `\n` after every
//! row. Rows are never reordered or filtered here.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde_json::Value;

use crate::error::{ReportingError, Result};
use crate::metrics::METRICS;
use crate::obs;
use crate::record::Record;
use crate::snapshot::{MetricSnapshot, MetricValue};
use crate::timeseries::TimeBucket;

/// Header row plus data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    rows: Vec<Vec<String>>,
}

impl ExportDocument {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: vec![headers.into_iter().map(Into::into).collect()],
        }
    }

    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn with_row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_row(cells);
        self
    }

    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Data rows, header excluded.
    pub fn body(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// All rows, header first.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// `metric,value,unit` with one row per metric, in name order. Currency
    /// metrics carry their currency code as the unit.
    pub fn from_snapshot(snapshot: &MetricSnapshot) -> Self {
        let mut doc = Self::new(["metric", "value", "unit"]);
        for (row, (name, value)) in snapshot.iter().enumerate() {
            doc.push_row([
                name.to_string(),
                render_metric(value, row + 1, 1),
                value.unit().to_string(),
            ]);
        }
        doc
    }

    /// `period,label,value`, oldest bucket first.
    pub fn from_buckets(buckets: &[TimeBucket]) -> Self {
        let mut doc = Self::new(["period", "label", "value"]);
        for bucket in buckets {
            doc.push_row([
                bucket.key.to_string(),
                bucket.label.clone(),
                bucket.value.to_string(),
            ]);
        }
        doc
    }

    /// `period,label,<series...>` for series bucketed over the same window.
    ///
    /// Periods come from the first series; a shorter series leaves its cells
    /// empty.
    pub fn from_series(series: &[(&str, &[TimeBucket])]) -> Self {
        let mut headers = vec!["period".to_string(), "label".to_string()];
        headers.extend(series.iter().map(|(name, _)| name.to_string()));
        let mut doc = Self::new(headers);

        let Some((_, periods)) = series.first() else {
            return doc;
        };
        for (i, bucket) in periods.iter().enumerate() {
            let mut row = vec![bucket.key.to_string(), bucket.label.clone()];
            row.extend(series.iter().map(|(_, buckets)| {
                buckets
                    .get(i)
                    .map(|b| b.value.to_string())
                    .unwrap_or_default()
            }));
            doc.push_row(row);
        }
        doc
    }

    /// One row per record with the given columns.
    pub fn from_records(records: &[Record], columns: &[Column]) -> Self {
        let mut doc = Self::new(columns.iter().map(|c| c.header.clone()));
        for (r, record) in records.iter().enumerate() {
            let row: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(c, column)| {
                    let value = column
                        .paths
                        .iter()
                        .find_map(|path| record.get(path).filter(|v| !v.is_null()));
                    match value {
                        None => String::new(),
                        Some(value) => render_value(value).unwrap_or_else(|reason| {
                            obs::emit_cell_unrenderable(r + 1, c, reason);
                            String::new()
                        }),
                    }
                })
                .collect();
            doc.push_row(row);
        }
        doc
    }
}

/// A record-table column: header text and the dotted field paths tried in
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub header: String,
    pub paths: Vec<String>,
}

impl Column {
    pub fn new(header: &str, path: &str) -> Self {
        Self {
            header: header.to_string(),
            paths: vec![path.to_string()],
        }
    }

    /// Add a fallback path used when the earlier ones are absent.
    pub fn or(mut self, path: &str) -> Self {
        self.paths.push(path.to_string());
        self
    }
}

/// Text form of a scalar JSON value. Nested values have no single-cell form.
pub fn render_value(value: &Value) -> std::result::Result<String, &'static str> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Array(_) => Err("array value"),
        Value::Object(_) => Err("object value"),
    }
}

fn render_metric(value: &MetricValue, row: usize, column: usize) -> String {
    match value {
        MetricValue::Count(n) => n.to_string(),
        MetricValue::Amount(d) => d.to_string(),
        MetricValue::Currency(money) => money.amount.to_string(),
        MetricValue::Percentage(p) if p.is_finite() => format!("{p:.2}"),
        MetricValue::Percentage(_) => {
            obs::emit_cell_unrenderable(row, column, "non-finite percentage");
            String::new()
        }
    }
}

/// Serialize `doc` as CSV text.
pub fn to_csv(doc: &ExportDocument) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());
    for row in doc.rows() {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ReportingError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReportingError::Export(e.to_string()))
}

/// `<kind>-<YYYY-MM-DD>.csv`
pub fn export_filename(kind: &str, date: NaiveDate) -> String {
    format!("{}-{}.csv", kind, date.format("%Y-%m-%d"))
}

/// Write `doc` to `path`, returning the number of bytes written.
pub fn write_csv(path: &Path, doc: &ExportDocument) -> Result<usize> {
    let content = to_csv(doc)?;
    std::fs::write(path, &content)?;
    METRICS.inc_exports_written();
    obs::emit_export_written(&path.display().to_string(), doc.body().len(), content.len());
    Ok(content.len())
}

/// Write `doc` into `dir` under [`export_filename`].
pub fn write_csv_in(dir: &Path, kind: &str, date: NaiveDate, doc: &ExportDocument) -> Result<PathBuf> {
    let path = dir.join(export_filename(kind, date));
    write_csv(&path, doc)?;
    Ok(path)
}
