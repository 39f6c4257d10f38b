//! # ThreadPulse CLI (`tpulse`)
//!
//! The `tpulse` binary drives the whole pipeline: fetching threads,
//! flattening comment trees, enriching units through the oracle, and
//! serving aggregate views.
//!
//! ## Usage
//!
//! ```bash
//! tpulse --config ./config/tpulse.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tpulse fetch` | Pull threads from the configured source into the raw corpus |
//! | `tpulse flatten` | Flatten comment trees into the unit corpus |
//! | `tpulse enrich` | Attach sentiment and keywords via the oracle |
//! | `tpulse probe` | Round-trip connectivity check against the oracle |
//! | `tpulse stats` | Print corpus and enrichment counts |
//! | `tpulse serve` | Start the HTTP query server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use threadpulse::{config, enrich, flatten, ingest, oracle, server, stats};

/// ThreadPulse CLI — a sentiment pipeline for discussion threads.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tpulse.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tpulse",
    about = "ThreadPulse — a sentiment pipeline for discussion threads",
    version,
    long_about = "ThreadPulse fetches threaded discussions, flattens each comment tree into a \
    linear corpus of text units, enriches every unit with sentiment and keywords from a local \
    LLM oracle, and serves aggregate views over a JSON HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/tpulse.toml`. All corpus, source, oracle, and
    /// server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/tpulse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch threads from the configured source.
    ///
    /// Searches the source with the configured query, drops threads whose
    /// ids are already in the raw corpus, and appends the rest. Running it
    /// twice in a row is safe.
    Fetch {
        /// Maximum number of threads to request, overriding the config.
        #[arg(long)]
        limit: Option<u32>,

        /// Show fetched/new/skipped counts without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Flatten comment trees into the unit corpus.
    ///
    /// Walks every thread in the raw corpus, keeps posts and qualifying
    /// comments, resolves parent text for comments, and rewrites the flat
    /// corpus. Deterministic: the same raw corpus always produces the same
    /// output.
    Flatten {
        /// Show unit counts without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Enrich flat units with sentiment and keywords.
    ///
    /// Skips units already present in the enriched corpus, waits for the
    /// oracle to come up, enriches the remainder in order, and appends the
    /// results. A permanent oracle failure aborts the run without writing.
    Enrich {
        /// Maximum number of units to enrich in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Show pending counts without calling the oracle.
        #[arg(long)]
        dry_run: bool,
    },

    /// Round-trip connectivity check against the oracle.
    ///
    /// Sends a fixed generation prompt and prints the raw response.
    Probe,

    /// Print corpus and enrichment counts.
    Stats,

    /// Start the HTTP query server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// aggregate view endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Fetch { limit, dry_run } => {
            ingest::run_fetch(&cfg, limit, dry_run).await?;
        }
        Commands::Flatten { dry_run } => {
            flatten::run_flatten(&cfg, dry_run)?;
        }
        Commands::Enrich { limit, dry_run } => {
            enrich::run_enrich(&cfg, limit, dry_run).await?;
        }
        Commands::Probe => {
            let transport = oracle::OllamaTransport::new(&cfg.oracle)?;
            let client = oracle::OracleClient::new(transport, &cfg.oracle);
            client.wait_ready().await?;
            let response = client.probe().await?;
            println!("{}", response);
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
