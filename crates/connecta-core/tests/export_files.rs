//! CSV files written to disk.

use chrono::NaiveDate;
use connecta_core::metrics::METRICS;
use connecta_core::{export_filename, write_csv, write_csv_in, ExportDocument, MetricSnapshot};
use tempfile::TempDir;

#[test]
fn test_write_csv_in_uses_report_filename() {
    let dir = TempDir::new().unwrap();
    let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    let snapshot = MetricSnapshot::builder()
        .count("totalUsers", 5)
        .count("activeJobs", 2)
        .build();

    let before = METRICS.exports_written();
    let path = write_csv_in(dir.path(), "dashboard", date, &ExportDocument::from_snapshot(&snapshot))
        .unwrap();

    assert_eq!(path.file_name().unwrap(), "dashboard-2026-10-16.csv");
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, "metric,value,unit\nactiveJobs,2,count\ntotalUsers,5,count\n");
    assert!(METRICS.exports_written() > before);
}

#[test]
fn test_write_csv_reports_bytes_and_overwrites() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(export_filename("users", NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()));

    let long = ExportDocument::new(["Name"]).with_row(["Acme, Inc. \"Best\""]);
    write_csv(&path, &long).unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Name\n\"Acme, Inc. \"\"Best\"\"\"\n"
    );

    let short = ExportDocument::new(["Name"]);
    let bytes = write_csv(&path, &short).unwrap();
    assert_eq!(bytes, "Name\n".len());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "Name\n");
}

#[test]
fn test_write_csv_into_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing").join("report.csv");
    let err = write_csv(&path, &ExportDocument::new(["a"])).unwrap_err();
    assert!(matches!(err, connecta_core::ReportingError::Io(_)));
}
