//! Pure metric functions over normalized collections.
//!
//! Every function here is order-independent: counts are commutative and sums
//! are taken over exact decimals, so shuffling the input never changes the
//! result.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::record::Record;

/// Group key for [`group_count_by`]. Records without a value are counted
/// under `Missing` instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Value(String),
    Missing,
}

impl Serialize for GroupKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl GroupKey {
    pub fn label(&self) -> &str {
        match self {
            GroupKey::Value(v) => v,
            GroupKey::Missing => "missing",
        }
    }
}

pub fn count(records: &[Record]) -> u64 {
    records.len() as u64
}

pub fn count_where<P>(records: &[Record], predicate: P) -> u64
where
    P: Fn(&Record) -> bool,
{
    records.iter().filter(|r| predicate(r)).count() as u64
}

/// Sum of `selector` over `records`; `None` counts as zero.
pub fn sum<S>(records: &[Record], selector: S) -> Decimal
where
    S: Fn(&Record) -> Option<Decimal>,
{
    records
        .iter()
        .map(|r| selector(r).unwrap_or(Decimal::ZERO))
        .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v))
        .normalize()
}

/// Sum of a numeric field. Missing or non-numeric values count as zero.
pub fn sum_field(records: &[Record], field: &str) -> Decimal {
    sum(records, |r| r.number(field))
}

/// Sum of a numeric field over the records matching `predicate`.
pub fn sum_field_where<P>(records: &[Record], field: &str, predicate: P) -> Decimal
where
    P: Fn(&Record) -> bool,
{
    sum(records, |r| if predicate(r) { r.number(field) } else { None })
}

/// `numerator / denominator * 100`, clamped to `[0, 100]`.
///
/// A zero denominator yields 0, as do negative or non-finite inputs.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if !numerator.is_finite() || !denominator.is_finite() {
        return 0.0;
    }
    if denominator <= 0.0 || numerator <= 0.0 {
        return 0.0;
    }
    (numerator / denominator * 100.0).clamp(0.0, 100.0)
}

/// [`percentage`] over counts.
pub fn count_percentage(numerator: u64, denominator: u64) -> f64 {
    percentage(numerator as f64, denominator as f64)
}

/// Percentage change from `previous` to `current`; 0 when `previous` is 0.
pub fn growth_rate(previous: Decimal, current: Decimal) -> f64 {
    if previous.is_zero() {
        return 0.0;
    }
    let change = (current - previous) / previous * Decimal::ONE_HUNDRED;
    change.round_dp(2).to_f64().unwrap_or(0.0)
}

pub fn group_count_by<K>(records: &[Record], key: K) -> BTreeMap<GroupKey, u64>
where
    K: Fn(&Record) -> Option<String>,
{
    let mut groups = BTreeMap::new();
    for record in records {
        let group = key(record).map_or(GroupKey::Missing, GroupKey::Value);
        *groups.entry(group).or_insert(0) += 1;
    }
    groups
}

/// Count records per value of `field`. Strings are used as-is; numbers and
/// booleans are rendered; nulls, objects and arrays count as missing.
pub fn group_count_by_field(records: &[Record], field: &str) -> BTreeMap<GroupKey, u64> {
    group_count_by(records, |r| match r.get(field)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Upper-cased currency code of a record, or `default_currency` when the
/// field is absent or blank.
pub fn record_currency(record: &Record, currency_field: &str, default_currency: &str) -> String {
    record
        .str_field(currency_field)
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| default_currency.trim().to_ascii_uppercase())
}

/// Per-currency totals of `amount_field`. Records without a currency are
/// attributed to `default_currency`.
pub fn currency_totals(
    records: &[Record],
    amount_field: &str,
    currency_field: &str,
    default_currency: &str,
) -> BTreeMap<String, Decimal> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for record in records {
        let currency = record_currency(record, currency_field, default_currency);
        let amount = record.number(amount_field).unwrap_or(Decimal::ZERO);
        let entry = totals.entry(currency).or_insert(Decimal::ZERO);
        *entry = entry.saturating_add(amount);
    }
    for total in totals.values_mut() {
        *total = total.normalize();
    }
    totals
}
