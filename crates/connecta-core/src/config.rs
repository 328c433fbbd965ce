//! Reporting parameters.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ReportingError, Result};

/// Currency used when a record names none.
pub const DEFAULT_CURRENCY: &str = "NGN";

/// Flat monthly subscription price, in [`DEFAULT_CURRENCY`].
pub const DEFAULT_SUBSCRIPTION_PRICE: i64 = 5000;

pub const DEFAULT_MONTH_WINDOW: usize = 12;
pub const DEFAULT_DAY_WINDOW: usize = 7;
pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Report configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// ISO currency code for money metrics
    pub currency: String,
    /// Price of one subscription period
    pub subscription_price: Decimal,
    /// Trailing months in monthly series
    pub month_window: usize,
    /// Trailing days in daily series
    pub day_window: usize,
    /// `limit` sent with list queries
    pub list_limit: u32,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        ReportingConfig {
            currency: DEFAULT_CURRENCY.to_string(),
            subscription_price: Decimal::from(DEFAULT_SUBSCRIPTION_PRICE),
            month_window: DEFAULT_MONTH_WINDOW,
            day_window: DEFAULT_DAY_WINDOW,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ReportingConfig {
    /// Defaults overridden by `CONNECTA_*` environment variables.
    ///
    /// A variable that is set but unparseable is an error rather than a
    /// silent fallback.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(currency) = lookup("CONNECTA_CURRENCY") {
            config.currency = currency.trim().to_ascii_uppercase();
        }
        if let Some(price) = parse_var(&lookup, "CONNECTA_SUBSCRIPTION_PRICE")? {
            config.subscription_price = price;
        }
        if let Some(window) = parse_var(&lookup, "CONNECTA_MONTH_WINDOW")? {
            config.month_window = window;
        }
        if let Some(window) = parse_var(&lookup, "CONNECTA_DAY_WINDOW")? {
            config.day_window = window;
        }
        if let Some(limit) = parse_var(&lookup, "CONNECTA_LIST_LIMIT")? {
            config.list_limit = limit;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn with_subscription_price(mut self, price: Decimal) -> Self {
        self.subscription_price = price;
        self
    }

    pub fn with_windows(mut self, months: usize, days: usize) -> Self {
        self.month_window = months;
        self.day_window = days;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.month_window == 0 {
            return Err(ReportingError::InvalidConfig(
                "month_window must be at least 1".to_string(),
            ));
        }
        if self.day_window == 0 {
            return Err(ReportingError::InvalidConfig(
                "day_window must be at least 1".to_string(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(ReportingError::InvalidConfig(
                "currency must not be empty".to_string(),
            ));
        }
        if self.subscription_price.is_sign_negative() {
            return Err(ReportingError::InvalidConfig(
                "subscription_price must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ReportingError::InvalidConfig(format!("{key}: cannot parse {raw:?}"))),
    }
}
