// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging setup: stderr plus a daily-rotated file under the data dir.
//!
//! `log.level` is the default directive; each `log.levels` entry becomes a
//! per-target directive. The filter resolves hierarchy by target prefix at
//! query time, so flat dotted entries like `skiff_engine.runner` coexist
//! with broader ones like `skiff_engine`.

use crate::config::{ConfigError, LogConfig};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keep this alive for the life of the process; dropping it flushes and
/// stops the file writer.
pub struct LogGuard {
    _file: WorkerGuard,
}

pub fn init(log: &LogConfig, data_dir: &Path) -> Result<LogGuard, ConfigError> {
    let filter = build_filter(log)?;

    let file_appender = tracing_appender::rolling::daily(data_dir.join("logs"), "skiffd.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Ok(LogGuard { _file: guard })
}

fn build_filter(log: &LogConfig) -> Result<EnvFilter, ConfigError> {
    let mut filter = EnvFilter::new(&log.level);
    for (target, level) in &log.levels {
        // Config names are dotted; tracing targets use `::`.
        let directive = format!("{}={level}", target.replace('.', "::"));
        filter = filter.add_directive(directive.parse().map_err(|e| ConfigError::Invalid {
            option: "log.levels",
            reason: format!("{target}: {e}"),
        })?);
    }
    Ok(filter)
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
