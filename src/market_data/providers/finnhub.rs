//! Finnhub quote provider.
//!
//! Uses the `/quote` endpoint for equities, crypto pairs (`EXCHANGE:SYMBOL`)
//! and forex pairs (`VENUE:BASE_QUOTE`, OANDA by default).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::QuoteError;
use crate::market_data::models::iso_datetime;
use crate::market_data::{InstrumentKey, NormalizedQuote, QuoteProvider};

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";
pub const DEFAULT_FOREX_VENUE: &str = "OANDA";

const PROVIDER: &str = "finnhub";

/// Finnhub `/quote` response. Every field may be null.
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Change
    d: Option<f64>,
    /// Percent change
    dp: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    o: Option<f64>,
    /// Previous close
    pc: Option<f64>,
    /// Quote time (Unix seconds)
    t: Option<i64>,
}

pub struct FinnhubQuoteSource {
    api_key: String,
    client: Client,
    base_url: String,
    forex_venue: String,
    clock: Arc<dyn Clock>,
}

impl FinnhubQuoteSource {
    /// Creates a new Finnhub source with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(api_key, Client::new())
    }

    /// Creates a new Finnhub source with a custom reqwest client.
    pub fn with_client(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            forex_venue: DEFAULT_FOREX_VENUE.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_forex_venue(mut self, venue: impl Into<String>) -> Self {
        self.forex_venue = venue.into().to_uppercase();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Symbol string Finnhub expects for `key`.
    pub fn build_symbol(&self, key: &InstrumentKey) -> String {
        match key {
            InstrumentKey::Equity { symbol } => symbol.clone(),
            InstrumentKey::ForexPair { base, quote } => {
                format!("{}:{base}_{quote}", self.forex_venue)
            }
            InstrumentKey::CryptoPair { symbol, exchange } => format!("{exchange}:{symbol}"),
        }
    }

    async fn request_quote(&self, symbol: &str) -> Result<QuoteResponse, QuoteError> {
        let url = format!("{}/quote", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|source| QuoteError::Network {
                provider: PROVIDER,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuoteError::HttpStatus {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|source| QuoteError::Network {
            provider: PROVIDER,
            source,
        })?;

        serde_json::from_str(&body)
            .map_err(|e| QuoteError::format(PROVIDER, format!("invalid JSON: {e}")))
    }

    fn normalize(
        key: &InstrumentKey,
        data: QuoteResponse,
        fetched_at: DateTime<Utc>,
    ) -> Result<NormalizedQuote, QuoteError> {
        let price = data
            .c
            .ok_or_else(|| QuoteError::format(PROVIDER, "missing current price field `c`"))?;

        // Unknown symbols come back as all zeros rather than an error status.
        if price == 0.0 && data.t == Some(0) {
            return Err(QuoteError::format(
                PROVIDER,
                format!("no data for {key}"),
            ));
        }

        Ok(NormalizedQuote {
            key: key.clone(),
            price,
            change: data.d.unwrap_or(0.0),
            percent_change: data.dp.unwrap_or(0.0),
            high: data.h.unwrap_or(0.0),
            low: data.l.unwrap_or(0.0),
            open: data.o.unwrap_or(0.0),
            previous_close: data.pc.unwrap_or(0.0),
            timestamp: fetched_at.timestamp(),
            datetime: iso_datetime(fetched_at),
            source: PROVIDER.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl QuoteProvider for FinnhubQuoteSource {
    async fn fetch_quote(&self, key: &InstrumentKey) -> Result<NormalizedQuote, QuoteError> {
        if let InstrumentKey::ForexPair { base, quote } = key {
            if base == quote {
                return Ok(NormalizedQuote::spot(key.clone(), 1.0, self.clock.now(), PROVIDER));
            }
        }

        let symbol = self.build_symbol(key);
        debug!(instrument = %key, symbol = %symbol, "requesting finnhub quote");
        let data = self.request_quote(&symbol).await?;
        Self::normalize(key, data, self.clock.now())
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn probe_instrument(&self) -> InstrumentKey {
        InstrumentKey::equity("AAPL")
    }
}
