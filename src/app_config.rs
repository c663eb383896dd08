//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// TOML-style file configuration for harvester defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Database file location.
    pub db_path: Option<PathBuf>,
    /// Root directory for downloaded PDFs.
    pub pdf_dir: Option<PathBuf>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Attempts per metadata request and per artifact.
    pub retry_times: Option<u64>,
    /// Backoff unit between attempts in milliseconds.
    pub retry_delay_ms: Option<u64>,
    pub user_agent: Option<String>,
    /// Download worker pool size.
    pub workers: Option<u8>,
    /// Minimum spacing between requests to one host in milliseconds.
    pub download_delay_ms: Option<u64>,
    /// Pause after each successful enrichment lookup in milliseconds.
    pub enrich_delay_ms: Option<u64>,
    /// DBLP `h` parameter.
    pub dblp_max_results: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers
            && !(1..=100).contains(&workers)
        {
            bail!("Invalid config value for `workers`: {workers}. Expected range: 1..=100");
        }
        if let Some(user_agent) = &self.user_agent
            && user_agent.trim().is_empty()
        {
            bail!("Invalid config value for `user_agent`: must not be empty");
        }

        validate_range("timeout_secs", self.timeout_secs, 1, 3600)?;
        validate_range("retry_times", self.retry_times, 1, 10)?;
        validate_range("retry_delay_ms", self.retry_delay_ms, 0, 60_000)?;
        validate_range("download_delay_ms", self.download_delay_ms, 0, 60_000)?;
        validate_range("enrich_delay_ms", self.enrich_delay_ms, 0, 60_000)?;
        validate_range("dblp_max_results", self.dblp_max_results, 1, 1000)?;

        Ok(())
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }

    /// Tracing level this mode maps to when no CLI flag is given.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/paper-harvest/config.toml`
/// 2. `$HOME/.config/paper-harvest/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("paper-harvest")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("paper-harvest")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads an explicitly requested config file, or the default one if present.
///
/// An explicit path must exist; a missing default file is not an error.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = explicit else {
        return load_default_file_config();
    };
    if !path.exists() {
        bail!("Config file '{}' does not exist", path.display());
    }
    let config = load_file_config(path)?;
    Ok(LoadedConfig {
        path: Some(path.to_path_buf()),
        config: Some(config),
        loaded_from_file: true,
    })
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;

        match key {
            "db_path" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `db_path` value on line {line_no}"))?;
                cfg.db_path = Some(PathBuf::from(parsed));
            }
            "pdf_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `pdf_dir` value on line {line_no}"))?;
                cfg.pdf_dir = Some(PathBuf::from(parsed));
            }
            "user_agent" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `user_agent` value on line {line_no}"))?;
                cfg.user_agent = Some(parsed);
            }
            "workers" => {
                let parsed = parse_integer_u8(value)
                    .with_context(|| format!("Invalid `workers` value on line {line_no}"))?;
                cfg.workers = Some(parsed);
            }
            "timeout_secs" => cfg.timeout_secs = Some(parse_u64_key(key, value, line_no)?),
            "retry_times" => cfg.retry_times = Some(parse_u64_key(key, value, line_no)?),
            "retry_delay_ms" => cfg.retry_delay_ms = Some(parse_u64_key(key, value, line_no)?),
            "download_delay_ms" => {
                cfg.download_delay_ms = Some(parse_u64_key(key, value, line_no)?);
            }
            "enrich_delay_ms" => cfg.enrich_delay_ms = Some(parse_u64_key(key, value, line_no)?),
            "dblp_max_results" => {
                cfg.dblp_max_results = Some(parse_u64_key(key, value, line_no)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `verbosity` value on line {line_no}"))?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn parse_u64_key(key: &str, value: &str, line_no: usize) -> Result<u64> {
    parse_integer_u64(value).with_context(|| format!("Invalid `{key}` value on line {line_no}"))
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
