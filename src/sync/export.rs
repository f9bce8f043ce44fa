use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::market_data::{AssetClass, NormalizedQuote};

/// Destination for a class's batch of quotes after it is written.
#[async_trait::async_trait]
pub trait QuoteSink: Send + Sync {
    /// Returns where the batch went, or `None` if nothing was written.
    async fn export(&self, class: AssetClass, quotes: &[NormalizedQuote])
        -> Result<Option<PathBuf>>;
}

/// Writes each batch to `{dir}/{class}_{YYYYmmdd_HHMMSS}.json`.
pub struct JsonFileSink {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonFileSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, class: AssetClass) -> PathBuf {
        let stamp = self.clock.now().format("%Y%m%d_%H%M%S");
        self.dir.join(format!("{class}_{stamp}.json"))
    }
}

#[async_trait::async_trait]
impl QuoteSink for JsonFileSink {
    async fn export(
        &self,
        class: AssetClass,
        quotes: &[NormalizedQuote],
    ) -> Result<Option<PathBuf>> {
        if quotes.is_empty() {
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;

        let path = self.file_path(class);
        let json = serde_json::to_vec_pretty(quotes).context("Failed to serialize quotes")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(class = %class, count = quotes.len(), path = %path.display(), "exported quotes");
        Ok(Some(path))
    }
}
