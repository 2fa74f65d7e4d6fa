// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! skiffd: the sync manager daemon.

use skiff_daemon::lifecycle::{Daemon, DaemonError};
use skiff_daemon::{logging, Config};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("skiffd: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), DaemonError> {
    let config_path = std::env::var_os("SKIFF_CONFIG").map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    std::fs::create_dir_all(&config.app.data_dir)?;
    let _log_guard = logging::init(&config.log, &config.app.data_dir)?;

    let daemon = Daemon::start(config).await?;
    tokio::signal::ctrl_c().await.ok();
    info!("interrupt received, shutting down");
    daemon.stop().await;
    Ok(())
}
