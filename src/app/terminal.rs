use crate::app_config::VerbositySetting;

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_use_spinner(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

/// Default log level when `RUST_LOG` is unset.
///
/// Priority: quiet flag > verbose flag > config file verbosity > info.
pub(crate) fn resolve_default_log_level(
    quiet: bool,
    verbose: u8,
    file_verbosity: Option<VerbositySetting>,
) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => file_verbosity.map_or("info", VerbositySetting::log_level),
        1 => "debug",
        _ => "trace",
    }
}

pub(crate) fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!is_dumb_terminal())
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_wins_over_everything() {
        assert_eq!(
            resolve_default_log_level(true, 2, Some(VerbositySetting::Debug)),
            "error"
        );
    }

    #[test]
    fn test_verbose_flag_wins_over_config() {
        assert_eq!(
            resolve_default_log_level(false, 1, Some(VerbositySetting::Quiet)),
            "debug"
        );
        assert_eq!(resolve_default_log_level(false, 3, None), "trace");
    }

    #[test]
    fn test_config_verbosity_used_without_flags() {
        assert_eq!(
            resolve_default_log_level(false, 0, Some(VerbositySetting::Quiet)),
            "error"
        );
        assert_eq!(resolve_default_log_level(false, 0, None), "info");
    }

    #[test]
    fn test_spinner_requires_interactive_stderr() {
        assert!(should_use_spinner(true, false, false));
        assert!(!should_use_spinner(false, false, false));
        assert!(!should_use_spinner(true, true, false));
        assert!(!should_use_spinner(true, false, true));
    }
}
