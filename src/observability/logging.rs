//! Logging initialization.
//!
//! Diagnostics go to stderr through `tracing`, in human-readable or JSON
//! form. Plugin `vprint` output rides on the same subscriber: level 0 is
//! logged as an error, 1 as info, 2 as debug and 3 or more as trace, so
//! `-v` repeated n times shows every `vprint` of level n and below.
//!
//! The verbosity only raises this crate's own targets; dependencies stay at
//! `warn`. `RANGEFORGE_LOG_LEVEL` replaces the whole filter.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Maps a verbosity level to a tracing directive string.
///
/// - 0 → `"warn"`
/// - 1 → `"info"`
/// - 2 → `"debug"`
/// - 3+ → `"trace"` (saturates)
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Filter directives for `verbosity` when no override is set.
#[must_use]
pub fn filter_directives(verbosity: u8) -> String {
    match verbosity {
        0 => "warn".to_owned(),
        v => format!("warn,{}={}", env!("CARGO_CRATE_NAME"), verbosity_to_directive(v)),
    }
}

/// Initializes the global tracing subscriber.
///
/// If `RANGEFORGE_LOG_LEVEL` is set it takes precedence over `verbosity`.
/// Uses `try_init()` so calling this more than once (e.g. in tests) is safe.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env("RANGEFORGE_LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbosity)));

    let show_target = verbosity >= 2;

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    match format {
        LogFormat::Human => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(use_ansi)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;
    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn log_format_default_is_human() {
        assert_eq!(LogFormat::default(), LogFormat::Human);
    }

    #[test]
    fn init_logging_does_not_panic() {
        init_logging(LogFormat::Human, 0, ColorChoice::Auto);
        init_logging(LogFormat::Json, 3, ColorChoice::Never);
    }

    #[test]
    fn verbosity_0_is_warn() {
        assert_eq!(verbosity_to_directive(0), "warn");
        assert_eq!(filter_directives(0), "warn");
    }

    #[test]
    fn verbosity_1_raises_only_this_crate() {
        assert_eq!(verbosity_to_directive(1), "info");
        assert_eq!(filter_directives(1), "warn,rangeforge=info");
    }

    #[test]
    fn verbosity_saturates_at_trace() {
        assert_eq!(verbosity_to_directive(3), "trace");
        assert_eq!(verbosity_to_directive(255), "trace");
        assert_eq!(filter_directives(7), "warn,rangeforge=trace");
    }

    #[test]
    fn directives_parse() {
        for verbosity in 0..=3 {
            assert!(EnvFilter::try_new(filter_directives(verbosity)).is_ok());
        }
    }

    #[test]
    fn each_verbosity_shows_matching_vprint_level() {
        let vprint_levels = [Level::ERROR, Level::INFO, Level::DEBUG, Level::TRACE];
        for (verbosity, level) in (0u8..).zip(vprint_levels) {
            let filter: LevelFilter = verbosity_to_directive(verbosity).parse().unwrap();
            assert!(filter >= level, "-v x{verbosity} hides {level}");
        }
    }
}
