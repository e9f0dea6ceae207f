//! Snapgraph main entry point
//!
//! This is the command-line interface for the Snapgraph rendering crawler.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use snapgraph::config::{load_config_with_hash, resolve_config, Config, EngineKind, Overrides};
use snapgraph::crawler::crawl;
use snapgraph::output::{load_statistics, print_statistics};
use snapgraph::storage::SqliteStorage;
use snapgraph::RenderMode;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Snapgraph: a rendering site crawler
///
/// Snapgraph crawls a site from a seed URL. Pages on the seed's host are
/// rendered in a browser and fingerprinted; everything else only gets a
/// status check. Every attempt is stored as a snapshot together with the
/// links it discovered.
#[derive(Parser, Debug)]
#[command(name = "snapgraph")]
#[command(version)]
#[command(about = "A rendering site crawler with snapshot history", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides the config file)
    #[arg(long, global = true, env = "SNAPGRAPH_DATABASE", value_name = "PATH")]
    database: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site starting from a seed URL
    Crawl(CrawlArgs),

    /// Create the database tables if they do not exist
    Init,

    /// Drop all crawler tables
    Drop,

    /// Show statistics for a crawl run
    Stats {
        /// Run to report on (defaults to the latest run)
        #[arg(long)]
        run: Option<i64>,
    },
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// URL to start crawling from
    #[arg(value_name = "START_URL")]
    start_url: String,

    /// Rendering profile
    #[arg(long, value_enum)]
    mode: Option<RenderMode>,

    /// Number of concurrent workers
    #[arg(long)]
    concurrency: Option<u32>,

    /// Rendering engine
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut overrides = Overrides {
        database_path: cli.database.clone(),
        ..Overrides::default()
    };
    if let Command::Crawl(args) = &cli.command {
        overrides.mode = args.mode;
        overrides.concurrency = args.concurrency;
        overrides.engine = args.engine;
    }
    let config = load_configuration(cli.config.as_deref(), overrides)?;

    match cli.command {
        Command::Crawl(args) => handle_crawl(&config, &args.start_url).await,
        Command::Init => handle_init(&config),
        Command::Drop => handle_drop(&config),
        Command::Stats { run } => handle_stats(&config, run),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("snapgraph=info,warn"),
            1 => EnvFilter::new("snapgraph=debug,info"),
            2 => EnvFilter::new("snapgraph=trace,debug"),
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

/// Loads the config file if one was given, then applies command-line
/// overrides and validates the result
fn load_configuration(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Config> {
    let loaded = match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Some(config)
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            None
        }
    };

    resolve_config(loaded, overrides).context("invalid configuration")
}

/// Handles the crawl command
async fn handle_crawl(config: &Config, start_url: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling {} with {} workers (mode={}, engine={:?})",
        start_url,
        config.crawler.concurrency,
        config.crawler.mode,
        config.browser.engine
    );

    match crawl(config, start_url).await {
        Ok(summary) => {
            tracing::info!(
                "Crawl run {} completed: {} URLs claimed, {} errors",
                summary.run_id,
                summary.report.claimed,
                summary.report.errors
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the init command: provisions the schema
fn handle_init(config: &Config) -> anyhow::Result<()> {
    SqliteStorage::new(Path::new(&config.output.database_path))
        .with_context(|| format!("failed to initialize {}", config.output.database_path))?;
    println!("✓ Database ready: {}", config.output.database_path);
    Ok(())
}

/// Handles the drop command: removes every crawler table
fn handle_drop(config: &Config) -> anyhow::Result<()> {
    let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    storage.drop_tables()?;
    println!("✓ Tables dropped from: {}", config.output.database_path);
    Ok(())
}

/// Handles the stats command: shows statistics from the database
fn handle_stats(config: &Config, run: Option<i64>) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    match load_statistics(&storage, run)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No crawl runs recorded yet"),
    }

    Ok(())
}
