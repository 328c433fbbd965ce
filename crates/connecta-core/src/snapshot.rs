//! Immutable metric snapshots.
//!
//! A [`MetricSnapshot`] maps metric names to values and is derived purely
//! from its inputs: two snapshots built from identical inputs are equal and
//! share the same [`MetricSnapshot::digest`].

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An amount in a named currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount: amount.normalize(),
            currency: currency.to_string(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// A single derived value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Count(u64),
    Amount(Decimal),
    Currency(Money),
    /// Percentage points; `percentage()` results lie in `[0, 100]`, growth
    /// rates may be negative.
    Percentage(f64),
}

impl MetricValue {
    /// Unit column used by exports.
    pub fn unit(&self) -> &str {
        match self {
            MetricValue::Count(_) => "count",
            MetricValue::Amount(_) => "amount",
            MetricValue::Currency(money) => &money.currency,
            MetricValue::Percentage(_) => "percent",
        }
    }
}

/// Name → value mapping, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSnapshot {
    metrics: BTreeMap<String, MetricValue>,
}

impl MetricSnapshot {
    pub fn builder() -> MetricSnapshotBuilder {
        MetricSnapshotBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        match self.metrics.get(name)? {
            MetricValue::Count(n) => Some(*n),
            _ => None,
        }
    }

    /// Amount of an `Amount` or `Currency` metric.
    pub fn amount(&self, name: &str) -> Option<Decimal> {
        match self.metrics.get(name)? {
            MetricValue::Amount(d) => Some(*d),
            MetricValue::Currency(money) => Some(money.amount),
            _ => None,
        }
    }

    pub fn percentage(&self, name: &str) -> Option<f64> {
        match self.metrics.get(name)? {
            MetricValue::Percentage(p) => Some(*p),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// New snapshot holding both sets of metrics; `other` wins on name clashes.
    pub fn merged(&self, other: &MetricSnapshot) -> MetricSnapshot {
        let mut metrics = self.metrics.clone();
        metrics.extend(other.metrics.iter().map(|(k, v)| (k.clone(), v.clone())));
        MetricSnapshot { metrics }
    }

    /// SHA-256 (hex) of the canonical JSON form.
    pub fn digest(&self) -> String {
        let canonical = serde_json::to_vec(&self.metrics).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }
}

/// Accumulates metrics before freezing them into a [`MetricSnapshot`].
#[derive(Debug, Default)]
pub struct MetricSnapshotBuilder {
    metrics: BTreeMap<String, MetricValue>,
}

impl MetricSnapshotBuilder {
    pub fn count(mut self, name: &str, value: u64) -> Self {
        self.metrics.insert(name.to_string(), MetricValue::Count(value));
        self
    }

    pub fn amount(mut self, name: &str, value: Decimal) -> Self {
        self.metrics
            .insert(name.to_string(), MetricValue::Amount(value.normalize()));
        self
    }

    pub fn currency(mut self, name: &str, amount: Decimal, currency: &str) -> Self {
        self.metrics.insert(
            name.to_string(),
            MetricValue::Currency(Money::new(amount, currency)),
        );
        self
    }

    pub fn percentage(mut self, name: &str, value: f64) -> Self {
        self.metrics
            .insert(name.to_string(), MetricValue::Percentage(value));
        self
    }

    pub fn value(mut self, name: &str, value: MetricValue) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    pub fn build(self) -> MetricSnapshot {
        MetricSnapshot {
            metrics: self.metrics,
        }
    }
}
