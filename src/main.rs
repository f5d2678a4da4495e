//! # Subscription Browser CLI (`subs`)
//!
//! The `subs` binary ingests channel and video metadata into a local SQLite
//! database.
//!
//! ## Usage
//!
//! ```bash
//! subs --config ./config/subs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `subs init` | Create the SQLite database and apply the schema |
//! | `subs sync subscriptions` | Ingest every channel the authenticated user subscribes to |
//! | `subs sync takeout <csv>` | Ingest the channels listed in a subscriptions CSV export |
//! | `subs import videos <paths...>` | Ingest video info-JSON files |
//! | `subs stats` | Show database statistics |
//!
//! ## Examples
//!
//! ```bash
//! export YOUTUBE_ACCESS_TOKEN=ya29....
//! subs init
//! subs sync subscriptions --progress human
//! subs sync takeout ./takeout/subscriptions.csv --refresh-cache
//! subs import videos ./downloads
//! RUST_LOG=subscription_browser=debug subs stats
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use subscription_browser::cache::CacheMode;
use subscription_browser::progress::ProgressMode;
use subscription_browser::{config, ingest, migrate, stats};

/// Subscription Browser: ingest channel and video metadata into SQLite.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/subs.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "subs",
    about = "Subscription Browser — ingest channel and video metadata into SQLite",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/subs.toml")]
    config: PathBuf,

    /// Bypass the content cache entirely for this run.
    #[arg(long, global = true, conflicts_with = "refresh_cache")]
    no_cache: bool,

    /// Ignore cached responses but write fresh ones back.
    #[arg(long, global = true)]
    refresh_cache: bool,

    /// Progress output on stderr. Defaults to `human` on a TTY, otherwise `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all tables. Idempotent.
    Init,

    /// Fetch channel metadata from the upstream API and ingest it.
    Sync {
        #[command(subcommand)]
        source: SyncSource,
    },

    /// Ingest locally stored metadata.
    Import {
        #[command(subcommand)]
        what: ImportKind,
    },

    /// Show database statistics.
    Stats,
}

#[derive(Subcommand)]
enum SyncSource {
    /// Every channel the authenticated user subscribes to.
    Subscriptions,

    /// Channels listed in column 0 of a subscriptions CSV export.
    Takeout {
        /// Path to the CSV file.
        csv: PathBuf,
    },
}

#[derive(Subcommand)]
enum ImportKind {
    /// Video info-JSON files or directories containing them.
    Videos {
        /// Files or directories to import.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = config::load_config(&cli.config)?;
    if cli.no_cache {
        cfg.cache.mode = CacheMode::Disabled;
    } else if cli.refresh_cache {
        cfg.cache.mode = CacheMode::Refresh;
    }

    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync { source } => match source {
            SyncSource::Subscriptions => {
                ingest::run_sync_subscriptions(&cfg, progress.as_ref()).await?;
            }
            SyncSource::Takeout { csv } => {
                ingest::run_sync_takeout(&cfg, &csv, progress.as_ref()).await?;
            }
        },
        Commands::Import { what } => match what {
            ImportKind::Videos { paths } => {
                ingest::run_import_videos(&cfg, &paths, progress.as_ref()).await?;
            }
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
