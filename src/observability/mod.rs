//! Logging setup.
//!
//! Adapters only emit `tracing` events and `metrics` samples; installing a
//! subscriber is left to the host process. [`init_logging`] is a ready-made
//! subscriber for hosts that have none of their own.

use crate::{Error, Result};
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-line.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

fn default_filter() -> String {
    "info".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directives, overridden by `RUST_LOG` when set.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Append to this file instead of writing to stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
            file: None,
        }
    }
}

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

fn logging_error(operation: &str, cause: impl ToString) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        target: "logging".to_string(),
        cause: cause.to_string(),
    }
}

fn open_log_file(path: &Path) -> Result<BoxMakeWriter> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| logging_error("create_log_dir", e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| logging_error("open_log_file", format!("{}: {e}", path.display())))?;
    Ok(BoxMakeWriter::new(Mutex::new(file)))
}

/// Builds the event filter: `RUST_LOG` if set, else the configured directives.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the directives do not parse.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| logging_error("parse_log_filter", e))
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if logging was already initialised, if
/// another subscriber is installed, if the filter does not parse or if the
/// log file cannot be opened.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(logging_error("logging_init", "logging already initialized"));
    }

    let filter = build_filter(config)?;
    let writer = match &config.file {
        Some(path) => open_log_file(path)?,
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let ansi = config.file.is_none();

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .with(filter)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(writer)
                    .with_ansi(ansi)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .with(filter)
            .try_init(),
    }
    .map_err(|e| logging_error("logging_init", e))?;

    LOGGING_INIT
        .set(())
        .map_err(|()| logging_error("logging_init", "failed to mark logging initialized"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: LoggingConfig = toml::from_str("").unwrap();
        assert_eq!(config, LoggingConfig::default());
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter, "info");
    }

    #[test]
    fn test_config_from_toml() {
        let config: LoggingConfig = toml::from_str(
            r#"
            format = "json"
            filter = "omnistore=debug"
            file = "/tmp/omnistore.log"
            "#,
        )
        .unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/omnistore.log")));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LoggingConfig {
            filter: "omnistore=[".to_string(),
            ..LoggingConfig::default()
        };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(build_filter(&config).is_err());
        }
    }

    #[test]
    fn test_second_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            format: LogFormat::Json,
            file: Some(dir.path().join("logs").join("test.log")),
            ..LoggingConfig::default()
        };
        // The first call may lose to a subscriber installed elsewhere in the
        // test binary; the second must always fail.
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
