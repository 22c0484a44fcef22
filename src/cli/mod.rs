//! CLI parser and command dispatch.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::models::ReviewStatus;

#[derive(Parser)]
#[command(name = "prop")]
#[command(about = "Property listing acquisition and review system")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, short = 't', global = true)]
    target: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Review status filter for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StatusFilter {
    Unset,
    Yes,
    No,
    Maybe,
}

impl From<StatusFilter> for ReviewStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Unset => ReviewStatus::Unset,
            StatusFilter::Yes => ReviewStatus::Yes,
            StatusFilter::No => ReviewStatus::No,
            StatusFilter::Maybe => ReviewStatus::Maybe,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory, skeleton files, and database
    Init,

    /// Scrape every URL in the inbox and sync the review ledger
    Scrape {
        /// Skip URLs that already have a record
        #[arg(short, long)]
        skip_existing: bool,
        /// Number of concurrent workers
        #[arg(short, long, default_value = "2")]
        workers: usize,
        /// Limit number of URLs to process (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },

    /// Re-sync the review ledger into the database without scraping
    Sync,

    /// List persisted listings
    List {
        /// Only show listings with this review status
        #[arg(short, long, value_enum)]
        status: Option<StatusFilter>,
    },

    /// Export all listings to a CSV file
    Export {
        /// Path to the output CSV file
        #[arg(short, long, default_value = "data/properties_export.csv")]
        output: PathBuf,
    },

    /// Show database statistics
    Stats,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref(), cli.target.as_deref())?;

    match cli.command {
        Commands::Init => commands::init::cmd_init(&settings).await,
        Commands::Scrape {
            skip_existing,
            workers,
            limit,
        } => commands::scrape::cmd_scrape(&settings, skip_existing, workers, limit).await,
        Commands::Sync => commands::sync::cmd_sync(&settings).await,
        Commands::List { status } => {
            commands::list::cmd_list(&settings, status.map(Into::into)).await
        }
        Commands::Export { output } => commands::export::cmd_export(&settings, &output).await,
        Commands::Stats => commands::stats::cmd_stats(&settings).await,
    }
}
