//! Press-Harvest main entry point
//!
//! This is the command-line interface for the Press-Harvest crawler.

use anyhow::Context;
use clap::Parser;
use press_harvest::config::{load_config_with_hash, Config, SourceConfig};
use press_harvest::crawler::{Coordinator, CycleScheduler};
use press_harvest::output::ArchiveWriter;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Press-Harvest: an incremental content-ingestion crawler
///
/// Press-Harvest polls feeds, a monthly digest listing and browser-rendered
/// news pages on a fixed interval, and appends every article it has not
/// seen before to a per-source, per-day text archive.
#[derive(Parser, Debug)]
#[command(name = "press-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An incremental content-ingestion crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "crawler.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a single cycle, print its summary and exit
    #[arg(long, conflicts_with = "dry_run")]
    once: bool,

    /// Validate config and show the configured sources without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    bootstrap_directories(&config)?;
    let coordinator = Coordinator::new(config).context("Failed to initialize crawler")?;

    if cli.once {
        let report = coordinator.run_cycle().await?;
        report.log_summary();
        report.print_summary();
        return Ok(());
    }

    let scheduler = CycleScheduler::new(coordinator.config().crawler.cycle_interval());
    tracing::info!(
        "Crawling {} source(s) every {} minutes",
        coordinator.sources().len(),
        coordinator.config().crawler.cycle_interval_minutes
    );

    scheduler
        .run(&coordinator, shutdown_signal())
        .await
        .context("Crawl aborted")?;

    tracing::info!("Crawler stopped");
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("press_harvest=info,warn"),
            1 => EnvFilter::new("press_harvest=debug,info"),
            2 => EnvFilter::new("press_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves on Ctrl-C; if the handler cannot be installed, never resolves
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Creates the archive, per-source and debug directories plus the ledger's parent
fn bootstrap_directories(config: &Config) -> anyhow::Result<()> {
    ArchiveWriter::new(&config.output.data_dir)
        .prepare(config.sources.iter().map(SourceConfig::id))
        .context("Failed to create archive directories")?;

    fs::create_dir_all(&config.output.debug_dir)
        .with_context(|| format!("Failed to create debug directory {}", config.output.debug_dir))?;

    if let Some(parent) = Path::new(&config.output.ledger_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create ledger directory {}", parent.display()))?;
    }

    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Press-Harvest Dry Run ===\n");

    println!("Schedule:");
    println!("  Cycle interval: {} minutes", config.crawler.cycle_interval_minutes);
    println!("  Ledger retention: {} days", config.crawler.retention_days);

    println!("\nNetwork:");
    println!(
        "  Proxy: {}",
        config.network.proxy.as_deref().unwrap_or("(none)")
    );
    println!("  User agent: {}", config.network.user_agent);
    println!(
        "  Retries: {} (backoff {}s x{}, politeness {}-{}s)",
        config.retry.max_retries,
        config.retry.min_delay,
        config.retry.backoff_factor,
        config.retry.min_delay,
        config.retry.max_delay
    );

    println!("\nOutput:");
    println!("  Ledger: {}", config.output.ledger_path);
    println!("  Archives: {}", config.output.data_dir);
    println!("  Debug captures: {}", config.output.debug_dir);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!("  - {} ({})", source.id(), source.kind());
        match source {
            SourceConfig::Feed(s) => {
                for feed in &s.feeds {
                    println!("    * {}", feed);
                }
            }
            SourceConfig::Rendered(s) => {
                println!(
                    "    renderer: {} (headless: {}, window {})",
                    config.renderer.chrome_executable.as_deref().unwrap_or("auto-detected chrome"),
                    config.renderer.headless,
                    config.renderer.window_size
                );
                for feed in &s.feeds {
                    println!("    * {}", feed);
                }
            }
            SourceConfig::ListPage(s) => {
                println!("    * {}/<YYYY>/<MM>", s.list_url.trim_end_matches('/'));
            }
        }
    }

    println!("\n✓ Configuration is valid");
}
