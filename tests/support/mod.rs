#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quotesync::clock::{Clock, FixedClock};
use quotesync::error::QuoteError;
use quotesync::market_data::{InstrumentKey, NormalizedQuote, QuoteProvider};
use quotesync::store::{ClassTable, FieldSet, MemoryRecordStore, StoreLayout};

pub const NOW: i64 = 1_705_334_400;

pub fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::at_unix(NOW))
}

pub fn layout() -> StoreLayout {
    StoreLayout {
        stocks: ClassTable::with_database("stocks-db"),
        forex: ClassTable::with_database("forex-db"),
        crypto: ClassTable::with_database("crypto-db"),
    }
}

pub fn memory_store() -> Arc<MemoryRecordStore> {
    Arc::new(MemoryRecordStore::new(layout()))
}

/// A watch-list row with the enabled flag set.
pub fn enabled_row(key_column: &str, key: &str) -> FieldSet {
    FieldSet::new()
        .title(key_column, key)
        .checkbox("Enabled", true)
}

/// Provider answering from a fixed price table and recording every request.
pub struct ScriptedProvider {
    name: &'static str,
    min_interval: Duration,
    prices: HashMap<InstrumentKey, f64>,
    calls: Mutex<Vec<InstrumentKey>>,
    clock: FixedClock,
}

impl ScriptedProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            min_interval: Duration::ZERO,
            prices: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            clock: FixedClock::at_unix(NOW),
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_price(mut self, key: InstrumentKey, price: f64) -> Self {
        self.prices.insert(key, price);
        self
    }

    pub fn calls(&self) -> Vec<InstrumentKey> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl QuoteProvider for ScriptedProvider {
    async fn fetch_quote(&self, key: &InstrumentKey) -> Result<NormalizedQuote, QuoteError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(key.clone());
        }

        let price = self.prices.get(key).copied().ok_or(QuoteError::HttpStatus {
            provider: "scripted",
            status: 500,
            body: format!("no price for {key}"),
        })?;

        let mut quote = NormalizedQuote::spot(key.clone(), price, self.clock.now(), self.name);
        if !matches!(key, InstrumentKey::ForexPair { .. }) {
            quote.change = 1.0;
            quote.percent_change = 0.67;
            quote.high = price + 1.0;
            quote.low = price - 1.0;
            quote.open = price - 0.5;
            quote.previous_close = price - 1.0;
        }
        Ok(quote)
    }

    fn name(&self) -> &str {
        self.name
    }

    fn min_refresh_interval(&self) -> Duration {
        self.min_interval
    }

    fn probe_instrument(&self) -> InstrumentKey {
        InstrumentKey::equity("AAPL")
    }
}
