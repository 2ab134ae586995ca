//! tracing setup for the retention binary.
//!
//! Interactive runs log to stderr. Scheduled runs (no terminal) go to the
//! systemd journal when it is reachable, otherwise to a daily log file in the
//! data directory, keeping [`KEPT_LOG_FILES`] days.

use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter directive,
/// e.g. `TRIPFRIEND_LOG=tripfriend::retention=debug`.
pub const LOG_ENV: &str = "TRIPFRIEND_LOG";

pub const KEPT_LOG_FILES: usize = 14;

const DEFAULT_DIRECTIVE: &str = "info";

/// Filter from `filter_env`, falling back to `info` when unset or invalid.
fn env_filter(filter_env: &str) -> EnvFilter {
    EnvFilter::try_from_env(filter_env).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. `identifier` names the journald source and
/// the log file prefix.
pub fn init(identifier: &str, filter_env: &str, log_dir: Option<PathBuf>) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(filter_env));

    if std::io::stderr().is_terminal() {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
        return Ok(());
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald) = tracing_journald::layer() {
            registry
                .with(journald.with_syslog_identifier(identifier.to_string()))
                .try_init()?;
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(|| crate::config::Config::data_dir().join("logs"));
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(identifier)
        .filename_suffix("log")
        .max_log_files(KEPT_LOG_FILES)
        .build(&log_dir)
        .with_context(|| format!("Failed to open log directory {}", log_dir.display()))?;

    // Written synchronously: the job is short-lived and exits right after
    // its last log line.
    registry
        .with(fmt::layer().with_writer(appender).with_ansi(false))
        .try_init()?;
    tracing::debug!(dir = %log_dir.display(), "Logging to file");
    Ok(())
}
