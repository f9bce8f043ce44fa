mod cross_rate;
mod freshness;
mod instrument;
pub(crate) mod models;
mod provider;
pub mod providers;

pub use cross_rate::{BridgeRateTable, BRIDGE_CURRENCY};
pub use freshness::{FreshnessCheck, FreshnessGate};
pub use instrument::{AssetClass, InstrumentKey, DEFAULT_CRYPTO_EXCHANGE};
pub use models::NormalizedQuote;
pub use provider::QuoteProvider;
