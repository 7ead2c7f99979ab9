//! Tracing subscriber setup.
//!
//! Events go to `<home>/logs/inkpost.log` through a non-blocking writer and,
//! when `log.stderr` is set, to stderr as well. `INKPOST_LOG` takes precedence
//! over `log.level`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::LogConfig;

/// Env var holding a filter directive that overrides `log.level`.
pub const LOG_ENV: &str = "INKPOST_LOG";

const LOG_FILE_NAME: &str = "inkpost.log";

/// Builds the env filter: `INKPOST_LOG` if valid, else the configured level,
/// else `info`.
fn build_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber.
///
/// Keep the returned guard alive until the process exits, otherwise
/// buffered log lines are lost.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(config: &LogConfig, logs_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

    let appender = tracing_appender::rolling::never(logs_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(build_filter(config));

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(build_filter(config))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// Returns the log file path for a logs directory.
pub fn log_file(logs_dir: &Path) -> std::path::PathBuf {
    logs_dir.join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_level_used_without_env() {
        if std::env::var(LOG_ENV).is_ok() {
            return;
        }
        let config = LogConfig {
            level: "warn".to_string(),
            stderr: false,
        };
        assert_eq!(build_filter(&config).to_string(), "warn");
    }

    #[test]
    fn test_log_file_lives_in_logs_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(log_file(dir.path()), dir.path().join("inkpost.log"));
    }
}
