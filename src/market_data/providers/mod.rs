pub mod finnhub;
pub mod open_exchange_rates;

use std::time::Duration;

use reqwest::Client;

pub use finnhub::FinnhubQuoteSource;
pub use open_exchange_rates::OpenExchangeRatesSource;

/// Per-request timeout applied to every provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client shared by the provider adapters.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("quotesync/", env!("CARGO_PKG_VERSION")))
        .build()
}
