use std::sync::Arc;

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use super::{JsonFileSink, QuoteSynchronizer};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, ForexStrategy};
use crate::market_data::providers::{http_client, FinnhubQuoteSource, OpenExchangeRatesSource};
use crate::market_data::{AssetClass, QuoteProvider};
use crate::store::{InstrumentRegistry, NotionStore, RecordStore};

/// Builds a [`QuoteSynchronizer`] from a validated [`Config`].
///
/// Providers are only created for classes whose credentials are present;
/// a class without a provider is skipped at run time.
pub struct SynchronizerBuilder<'a> {
    config: &'a Config,
    clock: Arc<dyn Clock>,
}

impl<'a> SynchronizerBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<QuoteSynchronizer> {
        let config = self.config;
        config.validate()?;

        let client = http_client(config.sync.timeout).context("Failed to build HTTP client")?;

        let store_key = config
            .store
            .api_key
            .as_ref()
            .context("store API key is not configured")?;
        let notion = Arc::new(
            NotionStore::with_client(
                SecretString::from(store_key.expose_secret().to_string()),
                config.store.layout.clone(),
                client.clone(),
            )
            .with_base_url(&config.store.base_url)
            .with_api_version(&config.store.api_version),
        );
        let registry: Arc<dyn InstrumentRegistry> = notion.clone();
        let store: Arc<dyn RecordStore> = notion;

        let mut synchronizer =
            QuoteSynchronizer::new(registry, store, config.store.layout.clone())
                .with_classes(config.sync.classes.clone())
                .with_pacing(config.sync.pacing)
                .with_clock(self.clock.clone());

        let finnhub: Option<Arc<dyn QuoteProvider>> = config.finnhub.api_key.as_ref().map(|key| {
            Arc::new(
                FinnhubQuoteSource::with_client(key.expose_secret(), client.clone())
                    .with_base_url(&config.finnhub.base_url)
                    .with_forex_venue(&config.finnhub.forex_venue)
                    .with_clock(self.clock.clone()),
            ) as Arc<dyn QuoteProvider>
        });

        let forex: Option<Arc<dyn QuoteProvider>> = match config.forex.provider {
            ForexStrategy::Finnhub => finnhub.clone(),
            ForexStrategy::OpenExchangeRates => config.forex.api_key.as_ref().map(|key| {
                Arc::new(
                    OpenExchangeRatesSource::with_client(key.expose_secret(), client.clone())
                        .with_base_url(&config.forex.base_url)
                        .with_min_interval(config.forex.min_interval)
                        .with_clock(self.clock.clone()),
                ) as Arc<dyn QuoteProvider>
            }),
        };

        for class in AssetClass::ALL {
            let provider = match class {
                AssetClass::Stocks | AssetClass::Crypto => finnhub.clone(),
                AssetClass::Forex => forex.clone(),
            };
            match provider {
                Some(provider) => {
                    debug!(class = %class, provider = provider.name(), "configured quote provider");
                    synchronizer = synchronizer.with_provider(class, provider);
                }
                None => warn!(class = %class, "no credentials for quote provider"),
            }
        }

        if config.output.save_to_file {
            synchronizer = synchronizer.with_sink(Arc::new(
                JsonFileSink::new(&config.output.dir).with_clock(self.clock.clone()),
            ));
        }

        Ok(synchronizer)
    }
}
