use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::duration::deserialize_duration;
use crate::market_data::providers::{finnhub, open_exchange_rates, DEFAULT_TIMEOUT};
use crate::market_data::AssetClass;
use crate::store::{notion, StoreLayout};

pub const FINNHUB_API_KEY_ENV: &str = "FINNHUB_API_KEY";
pub const OPEN_EXCHANGE_RATES_API_KEY_ENV: &str = "OPEN_EXCHANGE_RATES_API_KEY";
pub const NOTION_API_KEY_ENV: &str = "NOTION_API_KEY";

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from))
}

/// Finnhub quote API settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FinnhubConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    pub base_url: String,
    /// Venue prefix for forex symbols, e.g. `OANDA:EUR_USD`.
    pub forex_venue: String,
}

impl Default for FinnhubConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: finnhub::DEFAULT_BASE_URL.to_string(),
            forex_venue: finnhub::DEFAULT_FOREX_VENUE.to_string(),
        }
    }
}

/// How forex pairs are quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForexStrategy {
    /// Direct venue-qualified quote from Finnhub.
    Finnhub,
    /// USD-bridged rates from Open Exchange Rates.
    #[default]
    OpenExchangeRates,
}

fn default_forex_min_interval() -> Duration {
    open_exchange_rates::DEFAULT_MIN_INTERVAL
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ForexConfig {
    pub provider: ForexStrategy,
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    pub base_url: String,
    /// Minimum time between two fetches of the same pair.
    #[serde(deserialize_with = "deserialize_duration")]
    pub min_interval: Duration,
}

impl Default for ForexConfig {
    fn default() -> Self {
        Self {
            provider: ForexStrategy::default(),
            api_key: None,
            base_url: open_exchange_rates::DEFAULT_BASE_URL.to_string(),
            min_interval: default_forex_min_interval(),
        }
    }
}

/// Workspace database settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub api_version: String,
    #[serde(flatten)]
    pub layout: StoreLayout,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: notion::DEFAULT_BASE_URL.to_string(),
            api_version: notion::DEFAULT_API_VERSION.to_string(),
            layout: StoreLayout::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay between two consecutive provider requests.
    #[serde(deserialize_with = "deserialize_duration")]
    pub pacing: Duration,

    /// Per-request timeout.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    /// Asset classes to process, in order.
    pub classes: Vec<AssetClass>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(200),
            timeout: DEFAULT_TIMEOUT,
            classes: AssetClass::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write each class's quotes to a JSON file per run.
    pub save_to_file: bool,
    /// Output directory. If relative, resolved from the config file location.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_to_file: false,
            dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Startup validation failure. Always fatal: no class runs.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing {service} API key: set `{key}` in the config file or ${env}")]
    MissingApiKey {
        service: &'static str,
        key: &'static str,
        env: &'static str,
    },

    #[error("no asset class has a database configured")]
    NothingToSync,
}

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub finnhub: FinnhubConfig,
    pub forex: ForexConfig,
    pub store: StoreConfig,
    pub sync: SyncConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if let Some(config_dir) = path.parent() {
            config.output.dir = resolve_relative(&config.output.dir, config_dir);
        }

        Ok(config)
    }

    /// Load config from a file, or return default config if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Fill API keys from the process environment; set variables win over the file.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let secret = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
        };
        if let Some(key) = secret(FINNHUB_API_KEY_ENV) {
            self.finnhub.api_key = Some(key);
        }
        if let Some(key) = secret(OPEN_EXCHANGE_RATES_API_KEY_ENV) {
            self.forex.api_key = Some(key);
        }
        if let Some(key) = secret(NOTION_API_KEY_ENV) {
            self.store.api_key = Some(key);
        }
    }

    /// Classes that are requested and have a database configured.
    pub fn active_classes(&self) -> Vec<AssetClass> {
        self.sync
            .classes
            .iter()
            .copied()
            .filter(|class| self.store.layout.table(*class).database_id.is_some())
            .collect()
    }

    /// Check that every credential the active classes need is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let classes = self.active_classes();
        if classes.is_empty() {
            return Err(ConfigError::NothingToSync);
        }

        if self.store.api_key.is_none() {
            return Err(ConfigError::MissingApiKey {
                service: "store",
                key: "store.api_key",
                env: NOTION_API_KEY_ENV,
            });
        }

        let needs_finnhub = classes.iter().any(|class| match class {
            AssetClass::Stocks | AssetClass::Crypto => true,
            AssetClass::Forex => self.forex.provider == ForexStrategy::Finnhub,
        });
        if needs_finnhub && self.finnhub.api_key.is_none() {
            return Err(ConfigError::MissingApiKey {
                service: "Finnhub",
                key: "finnhub.api_key",
                env: FINNHUB_API_KEY_ENV,
            });
        }

        let needs_oxr = classes.contains(&AssetClass::Forex)
            && self.forex.provider == ForexStrategy::OpenExchangeRates;
        if needs_oxr && self.forex.api_key.is_none() {
            return Err(ConfigError::MissingApiKey {
                service: "Open Exchange Rates",
                key: "forex.api_key",
                env: OPEN_EXCHANGE_RATES_API_KEY_ENV,
            });
        }

        Ok(())
    }
}

fn resolve_relative(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./quotesync.toml` if it exists in current directory
/// 2. `~/.local/share/quotesync/quotesync.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("quotesync.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("quotesync").join("quotesync.toml");
    }

    local_config
}
