//! Freshness gate: decides whether enough time has passed since the last
//! successful write to spend another request on an instrument.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::InstrumentKey;
use crate::clock::{Clock, SystemClock};
use crate::duration::format_duration;

/// Result of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessCheck {
    pub should_fetch: bool,
    /// Seconds since the last update, `None` if never updated.
    pub age_secs: Option<i64>,
    pub min_interval: Duration,
}

impl FreshnessCheck {
    /// Time left before the next fetch is allowed.
    pub fn remaining(&self) -> Duration {
        match self.age_secs {
            Some(age) if !self.should_fetch => {
                let age = Duration::from_secs(age.max(0) as u64);
                self.min_interval.saturating_sub(age)
            }
            _ => Duration::ZERO,
        }
    }
}

pub struct FreshnessGate {
    min_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl FreshnessGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            clock: Arc::new(SystemClock),
        }
    }

    /// Gate that never blocks a fetch.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn check(&self, last_update: Option<i64>) -> FreshnessCheck {
        let Some(last_update) = last_update else {
            return FreshnessCheck {
                should_fetch: true,
                age_secs: None,
                min_interval: self.min_interval,
            };
        };

        let age = self.clock.unix_now() - last_update;
        let interval = i64::try_from(self.min_interval.as_secs()).unwrap_or(i64::MAX);
        FreshnessCheck {
            // A zero interval never blocks, even for timestamps ahead of the clock.
            should_fetch: self.min_interval.is_zero() || age >= interval,
            age_secs: Some(age),
            min_interval: self.min_interval,
        }
    }

    /// True when `key` is due for a fetch; logs the remaining wait when not.
    pub fn should_fetch(&self, key: &InstrumentKey, last_update: Option<i64>) -> bool {
        let check = self.check(last_update);
        if !check.should_fetch {
            info!(
                instrument = %key,
                remaining = %format_duration(check.remaining()),
                min_interval = %format_duration(self.min_interval),
                "updated recently, skipping request"
            );
        }
        check.should_fetch
    }
}
