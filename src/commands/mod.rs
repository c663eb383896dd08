//! Command handlers, one per subcommand.

mod all;
mod download;
mod enrich;
mod ingest;
mod stats;
mod venues;

pub(crate) use all::run_all_command;
pub(crate) use download::{run_download_command, run_retry_command};
pub(crate) use enrich::run_enrich_command;
pub(crate) use ingest::run_ingest_command;
pub(crate) use stats::run_stats_command;
pub(crate) use venues::run_venues_command;
