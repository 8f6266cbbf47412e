//! Tracing subscriber bootstrap.
//!
//! Human-readable logs go to stderr. When `json` is enabled, structured logs
//! are additionally written to a daily-rolling file in `log_dir` (or the
//! user data directory).

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::LoggingConfig;

/// Keeps the non-blocking file writer alive; drop it to flush.
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber. Calling it again is a no-op, which keeps
/// tests that share a process from panicking.
pub fn init(config: &LoggingConfig) -> LoggingGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let mut guard = LoggingGuard::default();
    let json_layer = if config.json {
        let log_dir = resolve_log_dir(config);
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "sleuth.log");
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard._file = Some(file_guard);
        Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug")),
        )
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init();
    guard
}

fn resolve_log_dir(config: &LoggingConfig) -> PathBuf {
    config.log_dir.clone().unwrap_or_else(|| {
        directories::ProjectDirs::from("dev", "sleuth", "sleuth")
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}
