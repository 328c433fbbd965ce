//! Dense calendar bucketing of sparse dated events.
//!
//! [`bucket`] always returns exactly `window` buckets ending at the period
//! containing `now`, oldest first. Empty periods hold zero and events outside
//! the window are dropped. All calendar math is UTC.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::calculator;
use crate::record::Record;

/// Width of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
}

impl Granularity {
    /// Period containing `date`.
    pub fn period_of(self, date: NaiveDate) -> PeriodKey {
        match self {
            Granularity::Day => PeriodKey::Day(date),
            Granularity::Month => PeriodKey::Month {
                year: date.year(),
                month: date.month(),
            },
        }
    }

    /// The `window` periods ending at the one containing `now`, oldest first.
    pub fn window(self, window: usize, now: DateTime<Utc>) -> Vec<PeriodKey> {
        let today = now.date_naive();
        let anchor = match self {
            Granularity::Day => today,
            Granularity::Month => today.with_day(1).unwrap_or(today),
        };
        (0..window)
            .rev()
            .filter_map(|back| {
                let date = match self {
                    Granularity::Day => anchor.checked_sub_days(Days::new(back as u64)),
                    Granularity::Month => u32::try_from(back)
                        .ok()
                        .and_then(|m| anchor.checked_sub_months(Months::new(m))),
                }?;
                Some(self.period_of(date))
            })
            .collect()
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => f.write_str("day"),
            Granularity::Month => f.write_str("month"),
        }
    }
}

/// Identifier of one calendar period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodKey {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
}

impl PeriodKey {
    /// First day of the period.
    pub fn start(&self) -> Option<NaiveDate> {
        match *self {
            PeriodKey::Day(date) => Some(date),
            PeriodKey::Month { year, month } => NaiveDate::from_ymd_opt(year, month, 1),
        }
    }

    /// Short human label: `Oct 2026` for months, `Oct 16` for days.
    pub fn label(&self) -> String {
        match self {
            PeriodKey::Day(date) => date.format("%b %d").to_string(),
            PeriodKey::Month { .. } => self
                .start()
                .map(|d| d.format("%b %Y").to_string())
                .unwrap_or_else(|| self.to_string()),
        }
    }
}

/// `YYYY-MM-DD` for days, `YYYY-MM` for months.
impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            PeriodKey::Month { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub key: PeriodKey,
    pub label: String,
    pub value: Decimal,
}

/// One dated event.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedValue {
    pub at: DateTime<Utc>,
    pub value: Decimal,
}

impl TimedValue {
    pub fn new(at: DateTime<Utc>, value: Decimal) -> Self {
        Self { at, value }
    }

    /// An event worth one, for counting series.
    pub fn one(at: DateTime<Utc>) -> Self {
        Self::new(at, Decimal::ONE)
    }
}

/// Map `events` onto `window` consecutive periods ending at `now`.
///
/// Events in the same period are summed. Events outside the window are
/// discarded without changing the number of buckets.
pub fn bucket(
    events: &[TimedValue],
    window: usize,
    granularity: Granularity,
    now: DateTime<Utc>,
) -> Vec<TimeBucket> {
    let keys = granularity.window(window, now);
    let mut totals: BTreeMap<PeriodKey, Decimal> =
        keys.iter().map(|k| (*k, Decimal::ZERO)).collect();

    for event in events {
        let key = granularity.period_of(event.at.date_naive());
        if let Some(total) = totals.get_mut(&key) {
            *total += event.value;
        }
    }

    keys.into_iter()
        .map(|key| TimeBucket {
            label: key.label(),
            value: totals.get(&key).copied().unwrap_or_default().normalize(),
            key,
        })
        .collect()
}

/// Events from `records`: the first parseable timestamp among `date_fields`
/// and the value of `value_field` (or one per record when `None`).
/// Records without a usable date are skipped; a missing value counts as zero.
pub fn events_from_records(
    records: &[Record],
    date_fields: &[&str],
    value_field: Option<&str>,
) -> Vec<TimedValue> {
    records
        .iter()
        .filter_map(|record| {
            let at = record.first_timestamp(date_fields)?;
            let value = match value_field {
                Some(field) => record.number(field).unwrap_or(Decimal::ZERO),
                None => Decimal::ONE,
            };
            Some(TimedValue::new(at, value))
        })
        .collect()
}

/// Percentage change between the previous month and `now`'s month.
pub fn month_over_month(events: &[TimedValue], now: DateTime<Utc>) -> f64 {
    let buckets = bucket(events, 2, Granularity::Month, now);
    match buckets.as_slice() {
        [previous, current] => calculator::growth_rate(previous.value, current.value),
        _ => 0.0,
    }
}

/// Sum of bucket values.
pub fn total(buckets: &[TimeBucket]) -> Decimal {
    buckets.iter().map(|b| b.value).sum::<Decimal>().normalize()
}
