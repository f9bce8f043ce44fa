use std::time::Duration;

use super::{InstrumentKey, NormalizedQuote};
use crate::error::QuoteError;

/// Upstream source able to quote some instruments.
///
/// One call is one network round trip at most; implementations never retry
/// and report every failure through [`QuoteError`].
#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, key: &InstrumentKey) -> Result<NormalizedQuote, QuoteError>;

    fn name(&self) -> &str;

    /// Minimum time between two fetches of the same instrument.
    ///
    /// Zero means the source publishes no refresh limit.
    fn min_refresh_interval(&self) -> Duration {
        Duration::ZERO
    }

    /// Instrument used by connectivity probes.
    fn probe_instrument(&self) -> InstrumentKey;

    /// Fetch the probe instrument once, reporting whether the source answers.
    async fn check_connectivity(&self) -> Result<NormalizedQuote, QuoteError> {
        self.fetch_quote(&self.probe_instrument()).await
    }
}
