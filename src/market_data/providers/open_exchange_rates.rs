//! Open Exchange Rates FX provider.
//!
//! The free plan only publishes rates against USD, so every pair is derived
//! through a [`BridgeRateTable`] built from one `latest.json` response. The
//! plan also refreshes its rates hourly, which is why this source reports a
//! minimum refresh interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::QuoteError;
use crate::market_data::{
    BridgeRateTable, InstrumentKey, NormalizedQuote, QuoteProvider, BRIDGE_CURRENCY,
};

pub const DEFAULT_BASE_URL: &str = "https://openexchangerates.org/api";

/// Rates refresh once an hour on the free plan.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(60 * 60);

const PROVIDER: &str = "openexchangerates.org";

/// Response from `latest.json`.
#[derive(Debug, Deserialize)]
struct LatestResponse {
    /// Publication time of the rates (Unix seconds).
    timestamp: Option<i64>,
    /// The base currency.
    #[allow(dead_code)]
    base: Option<String>,
    /// Map of currency codes to rates against `base`.
    rates: Option<HashMap<String, f64>>,
}

pub struct OpenExchangeRatesSource {
    app_id: String,
    client: Client,
    base_url: String,
    min_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl OpenExchangeRatesSource {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self::with_client(app_id, Client::new())
    }

    pub fn with_client(app_id: impl Into<String>, client: Client) -> Self {
        Self {
            app_id: app_id.into(),
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            min_interval: DEFAULT_MIN_INTERVAL,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fetches USD-based rates for `currencies` in one request.
    async fn fetch_bridge_table(
        &self,
        currencies: &[String],
    ) -> Result<BridgeRateTable, QuoteError> {
        let url = format!("{}/latest.json", self.base_url);
        let symbols = currencies.join(",");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("app_id", self.app_id.as_str()),
                ("base", BRIDGE_CURRENCY),
                ("symbols", symbols.as_str()),
            ])
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
        let data: LatestResponse = serde_json::from_str(&body)
            .map_err(|e| QuoteError::format(PROVIDER, format!("invalid JSON: {e}")))?;
        let rates = data
            .rates
            .ok_or_else(|| QuoteError::format(PROVIDER, "missing `rates`"))?;

        debug!(published = ?data.timestamp, count = rates.len(), "bridge rates received");
        Ok(BridgeRateTable::usd(rates))
    }
}

#[async_trait::async_trait]
impl QuoteProvider for OpenExchangeRatesSource {
    async fn fetch_quote(&self, key: &InstrumentKey) -> Result<NormalizedQuote, QuoteError> {
        let InstrumentKey::ForexPair { base, quote } = key else {
            return Err(QuoteError::UnsupportedInstrument {
                provider: PROVIDER,
                instrument: key.to_string(),
            });
        };

        let needed = BridgeRateTable::currencies_needed(BRIDGE_CURRENCY, base, quote);
        if needed.is_empty() {
            return Ok(NormalizedQuote::spot(key.clone(), 1.0, self.clock.now(), PROVIDER));
        }

        debug!(instrument = %key, symbols = ?needed, "requesting bridge rates");
        let table = self.fetch_bridge_table(&needed).await?;
        let rate = table.rate(base, quote)?;

        Ok(NormalizedQuote::spot(key.clone(), rate, self.clock.now(), PROVIDER))
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn min_refresh_interval(&self) -> Duration {
        self.min_interval
    }

    fn probe_instrument(&self) -> InstrumentKey {
        InstrumentKey::forex("USD", "EUR")
    }
}
