use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Exchange assumed for crypto pairs whose registry row leaves it blank.
pub const DEFAULT_CRYPTO_EXCHANGE: &str = "BINANCE";

/// The three watch-lists the registry keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Stocks,
    Forex,
    Crypto,
}

impl AssetClass {
    /// Processing order for a full run.
    pub const ALL: [AssetClass; 3] = [AssetClass::Stocks, AssetClass::Forex, AssetClass::Crypto];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stocks => "stocks",
            Self::Forex => "forex",
            Self::Crypto => "crypto",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stocks" | "stock" | "equity" | "equities" => Ok(Self::Stocks),
            "forex" | "fx" => Ok(Self::Forex),
            "crypto" => Ok(Self::Crypto),
            other => Err(format!("unknown asset class {other:?}")),
        }
    }
}

/// Identity of one tracked instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstrumentKey {
    Equity { symbol: String },
    ForexPair { base: String, quote: String },
    CryptoPair { symbol: String, exchange: String },
}

impl InstrumentKey {
    pub fn equity(symbol: impl AsRef<str>) -> Self {
        Self::Equity {
            symbol: normalize(symbol.as_ref()),
        }
    }

    pub fn forex(base: impl AsRef<str>, quote: impl AsRef<str>) -> Self {
        Self::ForexPair {
            base: normalize(base.as_ref()),
            quote: normalize(quote.as_ref()),
        }
    }

    /// Crypto pair; a blank exchange falls back to [`DEFAULT_CRYPTO_EXCHANGE`].
    pub fn crypto(symbol: impl AsRef<str>, exchange: Option<&str>) -> Self {
        let exchange = exchange
            .map(normalize)
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_CRYPTO_EXCHANGE.to_string());
        Self::CryptoPair {
            symbol: normalize(symbol.as_ref()),
            exchange,
        }
    }

    /// Parse a `BASE/QUOTE` pair such as `usd/cny`.
    pub fn parse_pair(pair: &str) -> Option<Self> {
        let (base, quote) = pair.split_once('/')?;
        let (base, quote) = (normalize(base), normalize(quote));
        if base.is_empty() || quote.is_empty() || quote.contains('/') {
            return None;
        }
        Some(Self::ForexPair { base, quote })
    }

    pub fn asset_class(&self) -> AssetClass {
        match self {
            Self::Equity { .. } => AssetClass::Stocks,
            Self::ForexPair { .. } => AssetClass::Forex,
            Self::CryptoPair { .. } => AssetClass::Crypto,
        }
    }

    /// Value of the store's title column for this instrument.
    pub fn identifier(&self) -> String {
        match self {
            Self::Equity { symbol } | Self::CryptoPair { symbol, .. } => symbol.clone(),
            Self::ForexPair { base, quote } => format!("{base}/{quote}"),
        }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CryptoPair { symbol, exchange } => write!(f, "{exchange}:{symbol}"),
            other => f.write_str(&other.identifier()),
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}
