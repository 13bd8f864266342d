//! Logging initialization for the daemon.
//!
//! Structured JSON logs to stderr, level controlled by `RUST_LOG` or the
//! supplied default.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the `tracing` subscriber for the process.
///
/// # Arguments
///
/// * `level` - default log level (trace, debug, info, warn, error), used
///   when `RUST_LOG` is unset.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_current_span(false)
        .try_init()
        .ok();
}

/// Parse a log level string, falling back to `info` for anything
/// unrecognized rather than failing startup over a typo in config.
pub fn parse_level(level: &str) -> &str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_normalizes_case() {
        assert_eq!(parse_level("DEBUG"), "debug");
        assert_eq!(parse_level("Warning"), "warn");
    }

    #[test]
    fn parse_level_falls_back_to_info() {
        assert_eq!(parse_level("garbage"), "info");
    }
}
