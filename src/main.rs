use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quotesync::config::{default_config_path, Config};
use quotesync::duration::format_duration;
use quotesync::market_data::AssetClass;
use quotesync::sync::{ClassStatus, SynchronizerBuilder};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")");

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    quotesync::duration::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "quotesync")]
#[command(about = "Refresh watched stock, forex and crypto quotes in a workspace database")]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Sync quotes for every configured asset class (the default)
    Run {
        /// Restrict the run to these classes (stocks, forex, crypto)
        #[arg(long, value_name = "CLASS")]
        only: Vec<AssetClass>,

        /// Override the delay between provider requests (e.g. "500ms")
        #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
        pacing: Option<Duration>,

        /// Also write each class's quotes to a JSON file
        #[arg(long)]
        save: bool,
    },
    /// Fetch one probe quote from each configured provider
    Check,
    /// Show current configuration with secrets redacted
    Config,
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let json = config.logging.json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().with_writer(std::io::stderr).json()))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr).with_target(false)))
        .init();
}

fn secret_status<T>(value: &Option<T>) -> &'static str {
    if value.is_some() {
        "set"
    } else {
        "not set"
    }
}

fn print_config(path: &std::path::Path, config: &Config) {
    println!("Config file: {}", path.display());
    println!("Finnhub API key: {}", secret_status(&config.finnhub.api_key));
    println!("Finnhub base URL: {}", config.finnhub.base_url);
    println!("Forex provider: {:?}", config.forex.provider);
    println!("Forex API key: {}", secret_status(&config.forex.api_key));
    println!(
        "Forex minimum refresh interval: {}",
        format_duration(config.forex.min_interval)
    );
    println!("Store API key: {}", secret_status(&config.store.api_key));
    for class in AssetClass::ALL {
        let table = config.store.layout.table(class);
        println!(
            "  {class}: database={} key_column={} enabled_column={}",
            table.database_id.as_deref().unwrap_or("(none)"),
            table.key_column(class),
            table.enabled_column
        );
    }
    println!("Pacing: {}", format_duration(config.sync.pacing));
    println!("Request timeout: {}", format_duration(config.sync.timeout));
    if config.output.save_to_file {
        println!("Export directory: {}", config.output.dir.display());
    } else {
        println!("Export: disabled");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    config.apply_env();

    init_logging(&config);

    match cli.command.unwrap_or(Command::Run {
        only: Vec::new(),
        pacing: None,
        save: false,
    }) {
        Command::Config => print_config(&cli.config, &config),
        Command::Check => {
            let synchronizer = SynchronizerBuilder::new(&config).build()?;
            let mut failures = 0;
            for (provider, result) in synchronizer.check_providers().await {
                match result {
                    Ok(quote) => println!("{provider}: ok ({} = {})", quote.key, quote.price),
                    Err(e) => {
                        failures += 1;
                        println!("{provider}: {} failure: {e}", e.kind());
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} provider(s) unreachable");
            }
        }
        Command::Run { only, pacing, save } => {
            if !only.is_empty() {
                config.sync.classes = AssetClass::ALL
                    .into_iter()
                    .filter(|class| only.contains(class))
                    .collect();
            }
            if let Some(pacing) = pacing {
                config.sync.pacing = pacing;
            }
            if save {
                config.output.save_to_file = true;
            }

            let synchronizer = SynchronizerBuilder::new(&config).build()?;
            info!(classes = ?synchronizer.classes(), "starting quote sync");

            for report in synchronizer.run_all().await {
                match &report.status {
                    ClassStatus::Completed => println!(
                        "{}: {} enabled, {} written ({} new), {} skipped, {} failed",
                        report.class,
                        report.enabled,
                        report.written(),
                        report.created,
                        report.skipped,
                        report.failed.len()
                    ),
                    ClassStatus::NotConfigured => println!("{}: not configured", report.class),
                    ClassStatus::RegistryFailed(reason) => {
                        error!(class = %report.class, reason = %reason, "class skipped");
                        println!("{}: watch-list unavailable", report.class);
                    }
                }
                for (key, reason) in &report.failed {
                    println!("  {key}: {reason}");
                }
                if let Some(path) = &report.export_path {
                    println!("  exported to {}", path.display());
                }
            }
        }
    }

    Ok(())
}
