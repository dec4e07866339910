//! Logging initialisation via tracing-subscriber.
//!
//! Logs go to stderr. Stdout is reserved for the operator lines in
//! [`crate::announce`].

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Initialise the global tracing subscriber.
///
/// `level` is a bare level (`"info"`) or a list of `EnvFilter` directives
/// (`"info,libp2p_kad=debug"`). With `prefer_level` (set when `LOG_LEVEL` was
/// given) the level wins over `RUST_LOG` and an invalid one is fatal;
/// otherwise `RUST_LOG` wins and `level` is the fallback.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    let filter = build_filter(level, prefer_level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

fn build_filter(level: &str, prefer_level: bool) -> Result<EnvFilter, AppError> {
    if prefer_level {
        // EnvFilter reads a lone word as a target name, so `verbose` would
        // silently disable every log instead of failing.
        if is_bare_level(level) {
            parse_level(level)?;
        }
        EnvFilter::try_new(level)
            .map_err(|e| AppError::Config(format!("LOG_LEVEL '{level}' is not a valid filter: {e}")))
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
    }
}

fn is_bare_level(level: &str) -> bool {
    !level.contains(['=', ',', '[', ':'])
}

/// Parse a bare level string (`"error"` .. `"trace"`, `"off"`) into a [`LevelFilter`].
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.is_empty() {
        return Err(AppError::Config("LOG_LEVEL must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Config(format!("LOG_LEVEL: unrecognised log level '{level}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_levels_parse() {
        for l in &["error", "warn", "info", "debug", "trace", "off"] {
            assert!(parse_level(l).is_ok(), "expected '{l}' to be valid");
        }
        assert_eq!(parse_level("warn").unwrap(), LevelFilter::WARN);
    }

    #[test]
    fn invalid_level_errors() {
        assert!(parse_level("verbose").is_err());
        assert!(parse_level("").is_err());
        assert!(parse_level("INFO_LEVEL").is_err());
    }

    #[test]
    fn explicit_unknown_word_is_a_config_error() {
        let err = build_filter("verbose", true).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("unrecognised log level 'verbose'"));
    }

    #[test]
    fn explicit_bad_directive_is_a_config_error() {
        let err = build_filter("kad_bootstrap=loud", true).unwrap_err();
        assert!(err.to_string().starts_with("config error: LOG_LEVEL 'kad_bootstrap=loud'"));
    }

    #[test]
    fn per_target_directives_build() {
        assert!(build_filter("info,libp2p_kad=debug", true).is_ok());
        assert!(build_filter("debug", true).is_ok());
    }

    #[test]
    fn bare_level_detection() {
        assert!(is_bare_level("info"));
        assert!(!is_bare_level("info,libp2p_kad=debug"));
        assert!(!is_bare_level("libp2p_swarm=trace"));
    }

    #[test]
    fn init_info_succeeds_or_already_init() {
        match init("info", false) {
            Ok(()) => {}
            Err(AppError::Logger(msg)) if msg.contains("set subscriber") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
