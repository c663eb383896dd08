//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use paper_harvest::sources::SourceKind;

/// Collect conference paper metadata and download the PDFs.
///
/// Crawls DBLP and venue program pages into a local `SQLite` store, fills
/// missing abstracts from Semantic Scholar, and downloads the artifacts with
/// a bounded worker pool.
#[derive(Parser, Debug)]
#[command(name = "paper-harvest")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/paper-harvest/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Database file (overrides `db_path` from the config file)
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl venues and store the paper records
    Ingest(IngestArgs),
    /// Download PDFs of pending papers
    Download(DownloadArgs),
    /// Reset failed downloads to pending, then download again
    Retry(DownloadArgs),
    /// Fill missing abstracts from Semantic Scholar
    Enrich(ScopeArgs),
    /// Show totals by conference and by download status
    Stats,
    /// Ingest, optionally enrich, then download
    All(AllArgs),
    /// List the supported venues
    Venues,
}

/// Which upstream to crawl.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceArg {
    /// DBLP search API
    #[default]
    Dblp,
    /// The venue's own program page
    Site,
}

impl From<SourceArg> for SourceKind {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Dblp => Self::Dblp,
            SourceArg::Site => Self::Site,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Venue tag or name (see `paper-harvest venues`)
    #[arg(long = "venue", value_name = "TAG", required = true, num_args = 1..)]
    pub venues: Vec<String>,

    /// Conference year
    #[arg(long = "year", value_name = "YEAR", required = true, num_args = 1.., value_parser = clap::value_parser!(i32).range(1900..=2100))]
    pub years: Vec<i32>,

    /// Upstream to crawl
    #[arg(long, value_enum, default_value_t = SourceArg::Dblp)]
    pub source: SourceArg,
}

/// Narrows a pass to one conference and/or year.
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Only papers of this conference (display name, e.g. "CRYPTO")
    #[arg(long)]
    pub conference: Option<String>,

    /// Only papers of this year
    #[arg(long, value_parser = clap::value_parser!(i32).range(1900..=2100))]
    pub year: Option<i32>,

    /// Process at most this many papers
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub limit: Option<i64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PoolArgs {
    /// Concurrent downloads (1-100)
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: Option<u8>,

    /// Root directory for PDFs (overrides `pdf_dir` from the config file)
    #[arg(long, value_name = "DIR")]
    pub pdf_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    #[command(flatten)]
    pub pool: PoolArgs,
}

#[derive(Args, Debug, Clone)]
pub struct AllArgs {
    #[command(flatten)]
    pub ingest: IngestArgs,

    #[command(flatten)]
    pub pool: PoolArgs,

    /// Run the enrichment pass between ingest and download
    #[arg(long)]
    pub with_abstract: bool,
}
