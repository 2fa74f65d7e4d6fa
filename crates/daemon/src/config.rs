// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration: TOML file plus `SKIFF_*` environment overrides.
//!
//! Every recognized dotted option maps to an environment variable by
//! uppercasing and replacing `.` with `_` (`database.path` →
//! `SKIFF_DATABASE_PATH`). Environment wins over file, file over default.

use cron::Schedule;
use serde::Deserialize;
use skiff_core::{Classify, ErrorKind, MAX_TRANSFERS, MIN_TRANSFERS};
use skiff_storage::MigrationMode;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "SKIFF_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for {option}: {reason}")]
    Invalid { option: &'static str, reason: String },
}

impl Classify for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

fn invalid(option: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { option, reason: reason.into() }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8787 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Empty resolves to `{app.data_dir}/skiff.db`.
    pub path: PathBuf,
    pub migration_mode: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: PathBuf::new(), migration_mode: "versioned".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Flat dotted-logger-name → level map; hierarchy resolves at query
    /// time in the filter, never at load time.
    pub levels: HashMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), levels: HashMap::new() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobSection {
    pub auto_delete_empty_jobs: bool,
    /// 0 disables log cleanup.
    pub max_logs_per_connection: u32,
    pub cleanup_schedule: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Global parallel-transfer fallback.
    pub transfers: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub environment: String,
    pub job: JobSection,
    pub sync: SyncSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            environment: "production".to_string(),
            job: JobSection::default(),
            sync: SyncSection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Empty means config blobs are stored as plaintext JSON.
    pub encryption_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub log: LogConfig,
    pub app: AppConfig,
    pub security: SecurityConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Load from `path` (defaults apply when the file is absent and `path`
    /// is `None`), then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
                toml::from_str(&raw)?
            }
            None => Config::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Database path with the empty default resolved under the data dir.
    pub fn database_path(&self) -> PathBuf {
        if self.database.path.as_os_str().is_empty() {
            self.app.data_dir.join("skiff.db")
        } else {
            self.database.path.clone()
        }
    }

    pub fn migration_mode(&self) -> Result<MigrationMode, ConfigError> {
        MigrationMode::from_str(&self.database.migration_mode)
            .map_err(|e| invalid("database.migration_mode", e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_override("server.host") {
            self.server.host = v;
        }
        if let Some(v) = env_override("server.port").and_then(|v| v.parse().ok()) {
            self.server.port = v;
        }
        if let Some(v) = env_override("database.path") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = env_override("database.migration_mode") {
            self.database.migration_mode = v;
        }
        if let Some(v) = env_override("log.level") {
            self.log.level = v;
        }
        if let Some(v) = env_override("app.data_dir") {
            self.app.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_override("app.environment") {
            self.app.environment = v;
        }
        if let Some(v) = env_override("app.job.auto_delete_empty_jobs") {
            self.app.job.auto_delete_empty_jobs = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = env_override("app.job.max_logs_per_connection").and_then(|v| v.parse().ok())
        {
            self.app.job.max_logs_per_connection = v;
        }
        if let Some(v) = env_override("app.job.cleanup_schedule") {
            self.app.job.cleanup_schedule = v;
        }
        if let Some(v) = env_override("app.sync.transfers").and_then(|v| v.parse().ok()) {
            self.app.sync.transfers = Some(v);
        }
        if let Some(v) = env_override("security.encryption_key") {
            self.security.encryption_key = v;
        }
        if let Some(v) = env_override("auth.username") {
            self.auth.username = v;
        }
        if let Some(v) = env_override("auth.password") {
            self.auth.password = v;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.migration_mode()?;

        if let Some(transfers) = self.app.sync.transfers {
            if !(MIN_TRANSFERS..=MAX_TRANSFERS).contains(&transfers) {
                return Err(invalid(
                    "app.sync.transfers",
                    format!("must be between {MIN_TRANSFERS} and {MAX_TRANSFERS}"),
                ));
            }
        }
        if !self.app.job.cleanup_schedule.is_empty() {
            Schedule::from_str(&self.app.job.cleanup_schedule)
                .map_err(|e| invalid("app.job.cleanup_schedule", e.to_string()))?;
        }
        if self.auth.username.is_empty() != self.auth.password.is_empty() {
            return Err(invalid(
                "auth",
                "username and password must be configured together",
            ));
        }
        Ok(())
    }
}

fn env_override(option: &str) -> Option<String> {
    let var = format!("{ENV_PREFIX}{}", option.replace('.', "_").to_uppercase());
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("skiff")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
