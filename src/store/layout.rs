//! Column layout of the per-class databases.
//!
//! Each asset class lives in one database that is both the watch-list
//! (enabled flag, key column) and the destination of its latest quote.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{FieldSet, FieldValue, RegistryEntry};
use crate::market_data::{AssetClass, InstrumentKey, NormalizedQuote};

const PRICE: &str = "Price";
const RATE: &str = "Rate";
const CHANGE: &str = "Change";
const PERCENT_CHANGE: &str = "Percent Change";
const HIGH: &str = "High";
const LOW: &str = "Low";
const OPEN: &str = "Open";
const PREVIOUS_CLOSE: &str = "Previous Close";
const DATETIME: &str = "DateTime";

fn default_enabled_column() -> String {
    "Enabled".to_string()
}

fn default_exchange_column() -> String {
    "Exchange".to_string()
}

fn default_timestamp_column() -> String {
    "Timestamp".to_string()
}

/// Database and column names for one asset class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassTable {
    /// Database holding this class. The class is skipped when unset.
    pub database_id: Option<String>,

    /// Checkbox column selecting the rows to refresh.
    pub enabled_column: String,

    /// Title column identifying the instrument.
    /// Defaults to `Pair` for forex and `Symbol` otherwise.
    pub key_column: Option<String>,

    /// Crypto exchange column.
    pub exchange_column: String,

    /// Number column holding the Unix time of the last write.
    pub timestamp_column: String,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self {
            database_id: None,
            enabled_column: default_enabled_column(),
            key_column: None,
            exchange_column: default_exchange_column(),
            timestamp_column: default_timestamp_column(),
        }
    }
}

impl ClassTable {
    pub fn with_database(database_id: impl Into<String>) -> Self {
        Self {
            database_id: Some(database_id.into()),
            ..Self::default()
        }
    }

    pub fn key_column(&self, class: AssetClass) -> &str {
        match (&self.key_column, class) {
            (Some(column), _) => column,
            (None, AssetClass::Forex) => "Pair",
            (None, _) => "Symbol",
        }
    }

    /// Registry entry for one stored row; `None` when the key is blank or unparseable.
    pub fn entry_from_fields(&self, class: AssetClass, fields: &FieldSet) -> Option<RegistryEntry> {
        let stored_key = fields.get(self.key_column(class)).and_then(FieldValue::as_text)?;
        let raw_key = stored_key.trim();
        if raw_key.is_empty() {
            return None;
        }

        let key = match class {
            AssetClass::Stocks => InstrumentKey::equity(raw_key),
            AssetClass::Forex => match InstrumentKey::parse_pair(raw_key) {
                Some(key) => key,
                None => {
                    warn!(pair = raw_key, "skipping forex row with malformed pair");
                    return None;
                }
            },
            AssetClass::Crypto => {
                let exchange = fields
                    .get(&self.exchange_column)
                    .and_then(FieldValue::as_text);
                InstrumentKey::crypto(raw_key, exchange)
            }
        };

        // Zero or missing means the row was never written.
        let last_update = fields
            .get(&self.timestamp_column)
            .and_then(FieldValue::as_number)
            .map(|ts| ts as i64)
            .filter(|ts| *ts > 0);

        Some(RegistryEntry {
            key,
            stored_key: stored_key.to_string(),
            last_update,
        })
    }
}

/// Tables for every asset class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreLayout {
    pub stocks: ClassTable,
    pub forex: ClassTable,
    pub crypto: ClassTable,
}

impl StoreLayout {
    pub fn table(&self, class: AssetClass) -> &ClassTable {
        match class {
            AssetClass::Stocks => &self.stocks,
            AssetClass::Forex => &self.forex,
            AssetClass::Crypto => &self.crypto,
        }
    }

    pub fn table_mut(&mut self, class: AssetClass) -> &mut ClassTable {
        match class {
            AssetClass::Stocks => &mut self.stocks,
            AssetClass::Forex => &mut self.forex,
            AssetClass::Crypto => &mut self.crypto,
        }
    }
}

/// Columns written for `quote`, including its title column.
pub fn quote_fields(quote: &NormalizedQuote, table: &ClassTable) -> FieldSet {
    let class = quote.key.asset_class();
    let mut fields = FieldSet::new().title(table.key_column(class), quote.key.identifier());

    match &quote.key {
        InstrumentKey::ForexPair { .. } => {
            fields = fields.number(RATE, quote.price);
        }
        InstrumentKey::Equity { .. } | InstrumentKey::CryptoPair { .. } => {
            if let InstrumentKey::CryptoPair { exchange, .. } = &quote.key {
                fields = fields.text(&table.exchange_column, exchange.clone());
            }
            fields = fields
                .number(PRICE, quote.price)
                .number(CHANGE, quote.change)
                .number(PERCENT_CHANGE, quote.percent_change)
                .number(HIGH, quote.high)
                .number(LOW, quote.low)
                .number(OPEN, quote.open)
                .number(PREVIOUS_CLOSE, quote.previous_close);
        }
    }

    fields
        .number(&table.timestamp_column, quote.timestamp as f64)
        .text(DATETIME, quote.datetime.clone())
}
