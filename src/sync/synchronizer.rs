use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::{ClassReport, ClassStatus, InstrumentOutcome, QuoteSink};
use crate::clock::{Clock, SystemClock};
use crate::error::QuoteError;
use crate::market_data::{AssetClass, FreshnessGate, NormalizedQuote, QuoteProvider};
use crate::store::{
    quote_fields, upsert, ClassTable, InstrumentRegistry, RecordStore, RegistryEntry, StoreLayout,
};

/// Drives one pass over the watch-lists.
///
/// Instruments are processed one at a time in watch-list order with a fixed
/// pause between network fetches. A failing instrument is logged and counted;
/// the rest of its batch still runs.
pub struct QuoteSynchronizer {
    registry: Arc<dyn InstrumentRegistry>,
    store: Arc<dyn RecordStore>,
    layout: StoreLayout,
    providers: HashMap<AssetClass, Arc<dyn QuoteProvider>>,
    classes: Vec<AssetClass>,
    pacing: Duration,
    sink: Option<Arc<dyn QuoteSink>>,
    clock: Arc<dyn Clock>,
}

impl QuoteSynchronizer {
    pub fn new(
        registry: Arc<dyn InstrumentRegistry>,
        store: Arc<dyn RecordStore>,
        layout: StoreLayout,
    ) -> Self {
        Self {
            registry,
            store,
            layout,
            providers: HashMap::new(),
            classes: AssetClass::ALL.to_vec(),
            pacing: Duration::ZERO,
            sink: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_provider(mut self, class: AssetClass, provider: Arc<dyn QuoteProvider>) -> Self {
        self.providers.insert(class, provider);
        self
    }

    /// Classes [`run_all`](Self::run_all) processes, in order.
    pub fn with_classes(mut self, classes: Vec<AssetClass>) -> Self {
        self.classes = classes;
        self
    }

    pub fn classes(&self) -> &[AssetClass] {
        &self.classes
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn QuoteSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn provider(&self, class: AssetClass) -> Option<&Arc<dyn QuoteProvider>> {
        self.providers.get(&class)
    }

    /// Only forex is gated; other classes fetch on every run.
    fn gate_for(&self, class: AssetClass, provider: &dyn QuoteProvider) -> Option<FreshnessGate> {
        match class {
            AssetClass::Forex => Some(
                FreshnessGate::new(provider.min_refresh_interval()).with_clock(self.clock.clone()),
            ),
            AssetClass::Stocks | AssetClass::Crypto => None,
        }
    }

    /// Sync every configured class. Classes without a database or provider
    /// are reported as not configured.
    pub async fn run_all(&self) -> Vec<ClassReport> {
        self.run(&self.classes).await
    }

    /// Sync the given classes in order. Each class is independent.
    pub async fn run(&self, classes: &[AssetClass]) -> Vec<ClassReport> {
        let mut reports = Vec::with_capacity(classes.len());
        for class in classes {
            reports.push(self.run_class(*class).await);
        }

        info!(
            classes = reports.len(),
            written = reports.iter().map(ClassReport::written).sum::<usize>(),
            skipped = reports.iter().map(|r| r.skipped).sum::<usize>(),
            failed = reports.iter().map(|r| r.failed.len()).sum::<usize>(),
            "sync run complete"
        );
        reports
    }

    pub async fn run_class(&self, class: AssetClass) -> ClassReport {
        let mut report = ClassReport::new(class);
        let table = self.layout.table(class);

        let Some(database_id) = table.database_id.as_deref() else {
            warn!(class = %class, "no database configured, skipping class");
            report.status = ClassStatus::NotConfigured;
            return report;
        };
        let Some(provider) = self.providers.get(&class) else {
            warn!(class = %class, "no quote provider configured, skipping class");
            report.status = ClassStatus::NotConfigured;
            return report;
        };

        let entries = match self.registry.list_enabled(class).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(class = %class, kind = %e.kind(), error = %e, "failed to read watch-list");
                report.status = ClassStatus::RegistryFailed(e.to_string());
                return report;
            }
        };
        report.enabled = entries.len();

        if entries.is_empty() {
            info!(class = %class, "no enabled instruments");
            return report;
        }

        info!(
            class = %class,
            count = entries.len(),
            provider = provider.name(),
            "syncing quotes"
        );

        let gate = self.gate_for(class, provider.as_ref());
        let mut fetched_any = false;
        for entry in &entries {
            if let Some(gate) = &gate {
                if !gate.should_fetch(&entry.key, entry.last_update) {
                    let check = gate.check(entry.last_update);
                    report.record(&entry.key, InstrumentOutcome::Skipped(check));
                    continue;
                }
            }

            if fetched_any && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            fetched_any = true;

            let outcome = self
                .sync_instrument(provider.as_ref(), database_id, table, entry)
                .await;
            report.record(&entry.key, outcome);
        }

        self.export(&mut report).await;

        info!(
            class = %class,
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed.len(),
            "class sync complete"
        );
        report
    }

    async fn sync_instrument(
        &self,
        provider: &dyn QuoteProvider,
        database_id: &str,
        table: &ClassTable,
        entry: &RegistryEntry,
    ) -> InstrumentOutcome {
        let key = &entry.key;
        let quote = match provider.fetch_quote(key).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(instrument = %key, kind = %e.kind(), error = %e, "failed to fetch quote");
                return InstrumentOutcome::FetchFailed(e);
            }
        };

        let key_column = table.key_column(key.asset_class());
        let fields = quote_fields(&quote, table);
        match upsert(
            self.store.as_ref(),
            database_id,
            key_column,
            &entry.stored_key,
            &fields,
        )
        .await
        {
            Ok(upsert) => {
                info!(instrument = %key, price = quote.price, source = %quote.source, "quote written");
                InstrumentOutcome::Written { quote, upsert }
            }
            Err(e) => {
                error!(instrument = %key, kind = %e.kind(), error = %e, "failed to write quote");
                InstrumentOutcome::WriteFailed { quote, error: e }
            }
        }
    }

    async fn export(&self, report: &mut ClassReport) {
        let Some(sink) = &self.sink else {
            return;
        };
        match sink.export(report.class, &report.quotes).await {
            Ok(path) => report.export_path = path,
            Err(e) => warn!(class = %report.class, error = %e, "failed to export quotes"),
        }
    }

    /// Fetch each distinct provider's probe instrument once.
    pub async fn check_providers(&self) -> Vec<(String, Result<NormalizedQuote, QuoteError>)> {
        let mut seen: Vec<String> = Vec::new();
        let mut results = Vec::new();
        for class in AssetClass::ALL {
            let Some(provider) = self.providers.get(&class) else {
                continue;
            };
            let name = provider.name().to_string();
            if seen.contains(&name) {
                continue;
            }
            seen.push(name.clone());

            let result = provider.check_connectivity().await;
            match &result {
                Ok(quote) => info!(provider = %name, instrument = %quote.key, price = quote.price, "provider reachable"),
                Err(e) => warn!(provider = %name, kind = %e.kind(), error = %e, "provider check failed"),
            }
            results.push((name, result));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::market_data::InstrumentKey;
    use crate::store::MemoryRecordStore;

    struct NoopProvider(Duration);

    #[async_trait::async_trait]
    impl QuoteProvider for NoopProvider {
        async fn fetch_quote(&self, key: &InstrumentKey) -> Result<NormalizedQuote, QuoteError> {
            Err(QuoteError::UnsupportedInstrument {
                provider: "noop",
                instrument: key.to_string(),
            })
        }

        fn name(&self) -> &str {
            "noop"
        }

        fn min_refresh_interval(&self) -> Duration {
            self.0
        }

        fn probe_instrument(&self) -> InstrumentKey {
            InstrumentKey::equity("AAPL")
        }
    }

    fn synchronizer(min_interval: Duration) -> QuoteSynchronizer {
        let store = Arc::new(MemoryRecordStore::default());
        QuoteSynchronizer::new(store.clone(), store, StoreLayout::default())
            .with_provider(AssetClass::Forex, Arc::new(NoopProvider(min_interval)))
            .with_clock(Arc::new(FixedClock::at_unix(10_000)))
    }

    #[test]
    fn test_only_forex_is_gated() {
        let sync = synchronizer(Duration::from_secs(3600));
        let provider = NoopProvider(Duration::from_secs(3600));

        let forex = sync
            .gate_for(AssetClass::Forex, &provider)
            .expect("forex is gated");
        assert_eq!(forex.min_interval(), Duration::from_secs(3600));
        assert!(!forex.check(Some(9_000)).should_fetch);

        assert!(sync.gate_for(AssetClass::Stocks, &provider).is_none());
        assert!(sync.gate_for(AssetClass::Crypto, &provider).is_none());
    }

    #[tokio::test]
    async fn test_class_without_database_is_not_configured() {
        let sync = synchronizer(Duration::ZERO);
        let report = sync.run_class(AssetClass::Forex).await;
        assert_eq!(report.status, ClassStatus::NotConfigured);
        assert_eq!(report.enabled, 0);
    }

    #[tokio::test]
    async fn test_check_providers_reports_each_provider_once() {
        let sync = synchronizer(Duration::ZERO)
            .with_provider(AssetClass::Stocks, Arc::new(NoopProvider(Duration::ZERO)));
        let results = sync.check_providers().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "noop");
        assert!(results[0].1.is_err());
    }
}
