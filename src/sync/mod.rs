//! Per-class quote synchronization: read the watch-list, gate, fetch,
//! write back, and optionally export the batch.

mod builder;
mod export;
mod synchronizer;

pub use builder::SynchronizerBuilder;
pub use export::{JsonFileSink, QuoteSink};
pub use synchronizer::QuoteSynchronizer;

use std::path::PathBuf;

use crate::error::{QuoteError, StoreError};
use crate::market_data::{AssetClass, FreshnessCheck, InstrumentKey, NormalizedQuote};
use crate::store::UpsertOutcome;

/// What happened to one instrument of a batch.
#[derive(Debug)]
pub enum InstrumentOutcome {
    /// Updated recently; no request was made.
    Skipped(FreshnessCheck),
    /// Fetched and written.
    Written {
        quote: NormalizedQuote,
        upsert: UpsertOutcome,
    },
    FetchFailed(QuoteError),
    /// Fetched, but the write to the store failed.
    WriteFailed {
        quote: NormalizedQuote,
        error: StoreError,
    },
}

/// How far a class got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassStatus {
    Completed,
    /// No database or no provider for this class.
    NotConfigured,
    /// The watch-list could not be read; nothing was fetched.
    RegistryFailed(String),
}

/// Result of syncing one asset class.
#[derive(Debug)]
pub struct ClassReport {
    pub class: AssetClass,
    pub status: ClassStatus,
    /// Enabled rows found in the watch-list.
    pub enabled: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: Vec<(InstrumentKey, String)>,
    /// Every quote fetched in this batch, in watch-list order.
    pub quotes: Vec<NormalizedQuote>,
    pub export_path: Option<PathBuf>,
}

impl ClassReport {
    pub fn new(class: AssetClass) -> Self {
        Self {
            class,
            status: ClassStatus::Completed,
            enabled: 0,
            fetched: 0,
            skipped: 0,
            created: 0,
            updated: 0,
            failed: Vec::new(),
            quotes: Vec::new(),
            export_path: None,
        }
    }

    pub fn written(&self) -> usize {
        self.created + self.updated
    }

    pub fn record(&mut self, key: &InstrumentKey, outcome: InstrumentOutcome) {
        match outcome {
            InstrumentOutcome::Skipped(_) => self.skipped += 1,
            InstrumentOutcome::Written { quote, upsert } => {
                self.fetched += 1;
                match upsert {
                    UpsertOutcome::Created { .. } => self.created += 1,
                    UpsertOutcome::Updated { .. } => self.updated += 1,
                }
                self.quotes.push(quote);
            }
            InstrumentOutcome::FetchFailed(error) => {
                self.failed.push((key.clone(), error.to_string()));
            }
            InstrumentOutcome::WriteFailed { quote, error } => {
                self.fetched += 1;
                self.failed.push((key.clone(), error.to_string()));
                self.quotes.push(quote);
            }
        }
    }
}
