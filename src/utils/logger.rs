//! Logging setup
//!
//! Only `unitpool` events pass the filter; engine output goes straight to the
//! terminal and is never routed through tracing.

use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Level chosen from `--verbose`, then `UNITPOOL_LOG`, then info.
///
/// An unparseable `UNITPOOL_LOG` value falls back to info.
pub fn log_level(verbose: bool, env_value: Option<&str>) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    match env_value.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("warning") => Level::WARN,
        Some(v) => Level::from_str(v).unwrap_or(Level::INFO),
        None => Level::INFO,
    }
}

fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::new(format!("unitpool={level}"))
}

/// Install the global subscriber
pub fn init_logger(verbose: bool, env_value: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(log_level(verbose, env_value)))
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_wins() {
        assert_eq!(log_level(true, Some("error")), Level::DEBUG);
    }

    #[test]
    fn test_env_level() {
        assert_eq!(log_level(false, Some("warn")), Level::WARN);
        assert_eq!(log_level(false, Some(" Warning ")), Level::WARN);
        assert_eq!(log_level(false, Some("TRACE")), Level::TRACE);
        assert_eq!(log_level(false, Some("bogus")), Level::INFO);
        assert_eq!(log_level(false, None), Level::INFO);
    }

    #[test]
    fn test_filter_targets_crate() {
        assert_eq!(
            filter_for(Level::DEBUG).to_string().to_lowercase(),
            "unitpool=debug"
        );
    }
}
