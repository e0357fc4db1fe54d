//! Command-line definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Downloads Sejm RP transcripts, MP data and clubs from the public API.
#[derive(Parser, Debug)]
#[command(name = "sejmbot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log as JSON lines
    #[arg(long, global = true, env = "SEJMBOT_LOG_JSON", hide_env = true)]
    pub log_json: bool,

    /// Bypass cached API responses
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// TOML configuration file (replaces SEJMBOT_CONFIG_FILE)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the output directory
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download transcripts of a term
    Scrape {
        /// Term number (defaults to the configured term)
        #[arg(short, long)]
        term: Option<u32>,

        /// Only this proceeding
        #[arg(short, long)]
        proceeding: Option<u32>,

        /// Ignore refresh markers
        #[arg(long)]
        force: bool,

        /// Skip per-statement HTML
        #[arg(long)]
        no_statements: bool,

        /// Also download day PDFs and store their text
        #[arg(long)]
        pdf: bool,
    },

    /// Download MP list, details, photos and voting stats
    Members {
        #[arg(short, long)]
        term: Option<u32>,

        #[arg(long)]
        no_photos: bool,

        #[arg(long)]
        no_voting_stats: bool,
    },

    /// Download clubs with details and logos
    Clubs {
        #[arg(short, long)]
        term: Option<u32>,
    },

    /// Poll current proceedings for new days
    Schedule {
        #[arg(short, long)]
        term: Option<u32>,

        /// Single cycle (default)
        #[arg(long, group = "mode")]
        once: bool,

        /// Keep polling until Ctrl-C
        #[arg(long, group = "mode")]
        continuous: bool,

        /// Minutes between cycles in continuous mode
        #[arg(long)]
        interval: Option<u64>,

        /// Print scheduler state
        #[arg(long, group = "mode")]
        status: bool,

        /// Print health (healthy, stale, unknown)
        #[arg(long, group = "mode")]
        health: bool,

        /// Forget processed days older than this many days
        #[arg(long, group = "mode", value_name = "DAYS")]
        cleanup: Option<i64>,
    },

    /// Inspect and maintain the cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Run a local file through the extraction pipeline
    Extract {
        file: PathBuf,

        /// URL used for type detection and meeting-number hints
        #[arg(long)]
        url: Option<String>,

        /// Print a JSON report instead of the text
        #[arg(long)]
        json: bool,
    },

    /// List parliamentary terms
    Terms,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Stats,

    /// Drop expired entries, old entries and fingerprints of deleted files
    Clean,

    /// Clear a cache partition
    Reset {
        /// api, files or all
        #[arg(long, default_value = "all")]
        scope: String,
    },
}
