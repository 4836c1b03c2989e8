use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "gold-vault";
const LOG_FILE_SUFFIX: &str = "log";
const DEFAULT_FILTER: &str = "gold_vault=info,warn";

/// Install the global subscriber: JSON lines to a daily-rolled file plus a
/// compact stderr stream. `RUST_LOG` overrides the default filter.
///
/// The returned [`WorkerGuard`] flushes the file writer on drop and must be
/// held for the life of the process.
pub fn init_tracing(logging: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender(&logging.log_dir)?);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .json(),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .try_init()?;

    Ok(guard)
}

/// Daily files named `gold-vault.YYYY-MM-DD.log`.
fn file_appender(dir: impl AsRef<Path>) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(dir.as_ref())
        .with_context(|| format!("failed to open log dir {}", dir.as_ref().display()))
}
