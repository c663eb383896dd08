//! Configuration lifecycle: load the file config, then layer CLI overrides
//! over file values over built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use paper_harvest::download::DEFAULT_WORKERS;
use paper_harvest::fetch::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT, FetchConfig};
use paper_harvest::sources::{DEFAULT_ENRICH_DELAY, DEFAULT_MAX_RESULTS};
use paper_harvest::user_agent::default_user_agent;

use crate::app_config::{FileConfig, VerbositySetting, load_config};
use crate::cli::{Cli, PoolArgs};

pub(crate) const DEFAULT_DB_PATH: &str = "data/papers.db";
pub(crate) const DEFAULT_PDF_DIR: &str = "data/pdfs";
pub(crate) const DEFAULT_DOWNLOAD_DELAY: Duration = Duration::from_millis(500);

/// Effective settings for one run.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) db_path: PathBuf,
    pub(crate) pdf_dir: PathBuf,
    pub(crate) fetch: FetchConfig,
    pub(crate) workers: usize,
    pub(crate) download_delay: Duration,
    pub(crate) enrich_delay: Duration,
    pub(crate) dblp_max_results: u32,
    pub(crate) verbosity: Option<VerbositySetting>,
    /// Config file the file layer came from, if one was read.
    pub(crate) config_file: Option<PathBuf>,
}

impl Settings {
    /// Applies per-command pool overrides.
    pub(crate) fn with_pool(&self, pool: &PoolArgs) -> Self {
        let mut settings = self.clone();
        if let Some(workers) = pool.workers {
            settings.workers = usize::from(workers);
        }
        if let Some(pdf_dir) = &pool.pdf_dir {
            settings.pdf_dir.clone_from(pdf_dir);
        }
        settings
    }
}

/// Loads the config file named by `--config` (or the default one) and
/// resolves the effective settings.
pub(crate) fn resolve_config(cli: &Cli) -> Result<Settings> {
    let loaded = load_config(cli.config.as_deref())?;
    let mut settings = resolve_settings(cli, loaded.config.as_ref());
    if loaded.loaded_from_file {
        settings.config_file = loaded.path;
    }
    Ok(settings)
}

pub(crate) fn resolve_settings(cli: &Cli, file: Option<&FileConfig>) -> Settings {
    let file = file.cloned().unwrap_or_default();

    let fetch = FetchConfig {
        timeout: file
            .timeout_secs
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
        retry_times: file
            .retry_times
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_ATTEMPTS),
        retry_delay: file
            .retry_delay_ms
            .map_or(DEFAULT_RETRY_DELAY, Duration::from_millis),
        user_agent: file
            .user_agent
            .clone()
            .unwrap_or_else(|| default_user_agent().to_string()),
    };

    Settings {
        db_path: cli
            .db
            .clone()
            .or(file.db_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
        pdf_dir: file
            .pdf_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PDF_DIR)),
        fetch,
        workers: file.workers.map_or(DEFAULT_WORKERS, usize::from),
        download_delay: file
            .download_delay_ms
            .map_or(DEFAULT_DOWNLOAD_DELAY, Duration::from_millis),
        enrich_delay: file
            .enrich_delay_ms
            .map_or(DEFAULT_ENRICH_DELAY, Duration::from_millis),
        dblp_max_results: file
            .dblp_max_results
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_RESULTS),
        verbosity: file.verbosity,
        config_file: None,
    }
}
