use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::InstrumentKey;

/// Provider-agnostic quote shape every adapter produces.
///
/// `high`, `low`, `open` and `previous_close` equal `price` when the source
/// only exposes a spot value, and `change`/`percent_change` are then zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuote {
    pub key: InstrumentKey,
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub previous_close: f64,
    /// Unix seconds at fetch time.
    pub timestamp: i64,
    /// ISO-8601 rendering of the fetch time.
    pub datetime: String,
    pub source: String,
}

impl NormalizedQuote {
    /// Quote for a source that only reports a single spot value.
    pub fn spot(
        key: InstrumentKey,
        price: f64,
        fetched_at: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            key,
            price,
            change: 0.0,
            percent_change: 0.0,
            high: price,
            low: price,
            open: price,
            previous_close: price,
            timestamp: fetched_at.timestamp(),
            datetime: iso_datetime(fetched_at),
            source: source.into(),
        }
    }
}

pub(crate) fn iso_datetime(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
