//! Cross-rate computation through a bridge currency.
//!
//! Sources that only publish rates against one currency (USD for Open
//! Exchange Rates) need every other pair derived from two bridge legs:
//! `base/quote = (bridge/quote) / (bridge/base)`.

use std::collections::HashMap;

use crate::error::QuoteError;

/// Pivot currency for bridged rates.
pub const BRIDGE_CURRENCY: &str = "USD";

/// Rates of each currency against the bridge, for one batch of lookups.
///
/// Built from a single provider response and dropped afterwards; it is
/// never cached across runs.
#[derive(Debug, Clone)]
pub struct BridgeRateTable {
    bridge: String,
    rates: HashMap<String, f64>,
}

impl BridgeRateTable {
    pub fn new(bridge: impl Into<String>, rates: HashMap<String, f64>) -> Self {
        Self {
            bridge: bridge.into().to_uppercase(),
            rates: rates
                .into_iter()
                .map(|(code, rate)| (code.to_uppercase(), rate))
                .collect(),
        }
    }

    /// Table against the default USD bridge.
    pub fn usd(rates: HashMap<String, f64>) -> Self {
        Self::new(BRIDGE_CURRENCY, rates)
    }

    pub fn bridge(&self) -> &str {
        &self.bridge
    }

    pub fn get(&self, currency: &str) -> Option<f64> {
        self.rates.get(&currency.to_uppercase()).copied()
    }

    /// Rate of `base` priced in `quote`.
    ///
    /// Checks run in a fixed order: same currency, base is the bridge,
    /// quote is the bridge, general cross.
    pub fn rate(&self, base: &str, quote: &str) -> Result<f64, QuoteError> {
        let base = base.to_uppercase();
        let quote = quote.to_uppercase();

        if base == quote {
            return Ok(1.0);
        }
        if base == self.bridge {
            return self.leg(&quote);
        }
        if quote == self.bridge {
            return Ok(1.0 / self.nonzero_leg(&base)?);
        }

        let bridge_to_quote = self.leg(&quote)?;
        let bridge_to_base = self.nonzero_leg(&base)?;
        Ok(bridge_to_quote / bridge_to_base)
    }

    /// Currencies that must be requested to price `base/quote`.
    ///
    /// Empty when no lookup is needed at all.
    pub fn currencies_needed(bridge: &str, base: &str, quote: &str) -> Vec<String> {
        let bridge = bridge.to_uppercase();
        let base = base.to_uppercase();
        let quote = quote.to_uppercase();
        if base == quote {
            return Vec::new();
        }
        let mut needed = Vec::with_capacity(2);
        for code in [base, quote] {
            if code != bridge && !needed.contains(&code) {
                needed.push(code);
            }
        }
        needed
    }

    fn leg(&self, currency: &str) -> Result<f64, QuoteError> {
        self.get(currency).ok_or_else(|| QuoteError::MissingRate {
            currency: currency.to_string(),
        })
    }

    fn nonzero_leg(&self, currency: &str) -> Result<f64, QuoteError> {
        let rate = self.leg(currency)?;
        if rate == 0.0 {
            return Err(QuoteError::ZeroRate {
                currency: currency.to_string(),
            });
        }
        Ok(rate)
    }
}
