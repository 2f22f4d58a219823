//! Tracing setup: compact stderr output plus `spl.log` in the working directory

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{CliError, Result};

pub const LOG_FILE: &str = "spl.log";

/// Parse a `--level` value, case-insensitive (`INFO` and `info` both work).
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .trim()
        .to_lowercase()
        .parse::<LevelFilter>()
        .map_err(|_| CliError::user(format!("Invalid log level '{level}'")))
}

/// Install the global subscriber. The returned guard flushes the file
/// writer and must live until the process ends.
pub fn init(level: &str, log_dir: &Path) -> Result<WorkerGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(parse_level(level)?.into())
        .from_env_lossy();

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(log_dir)
        .map_err(|e| CliError::Logging(e.to_string()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_any_case() {
        assert_eq!(parse_level("INFO").unwrap(), LevelFilter::INFO);
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level(" Warn ").unwrap(), LevelFilter::WARN);
    }

    #[test]
    fn test_parse_level_rejects_unknown() {
        let err = parse_level("chatty").unwrap_err();
        assert_eq!(err.to_string(), "Invalid log level 'chatty'");
    }
}
