// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The narrow transfer-engine interface the orchestrator consumes.
//!
//! Implementations own a process-wide configuration space (named sections
//! of key→value pairs) and a cache of resolved filesystem handles keyed
//! `remote:path`. Section writes invalidate cached handles for that remote
//! under the same critical section (see [`config::ConfigRegistry`]).

pub mod config;
pub mod fake;
pub mod local;
pub mod stats;

use async_trait::async_trait;
use glob::PatternError;
use skiff_core::{Classify, ConfigMap, ConflictResolution, ErrorKind, FilterParseError, FilterRule};
use stats::StatsGroup;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Engine default for the parallel-transfer setting, the last tier of the
/// task → global config → engine fallback.
pub const DEFAULT_TRANSFERS: u32 = 4;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown remote: {0}")]
    UnknownRemote(String),
    #[error(transparent)]
    InvalidFilter(#[from] FilterParseError),
    #[error("invalid filter pattern {rule:?}: {source}")]
    BadPattern {
        rule: String,
        #[source]
        source: PatternError,
    },
    #[error("remote {0} is misconfigured: {1}")]
    Misconfigured(String, String),
    #[error("transfer cancelled")]
    Cancelled,
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
}

impl Classify for EngineError {
    fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownRemote(_) => ErrorKind::NotFound,
            EngineError::InvalidFilter(_) | EngineError::BadPattern { .. } => ErrorKind::Validation,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::Misconfigured(..) | EngineError::Io(_) | EngineError::Failed(_) => {
                ErrorKind::External
            }
        }
    }
}

/// Opaque handle identifying a resolved filesystem root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsHandle {
    key: String,
    root: PathBuf,
    generation: u64,
}

impl FsHandle {
    pub fn new(key: impl Into<String>, root: impl Into<PathBuf>, generation: u64) -> Self {
        Self { key: key.into(), root: root.into(), generation }
    }

    /// `remote:path` cache key, or the bare path for direct local handles.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bumped every time the handle is rebuilt from fresh config; stable
    /// across cache hits.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Options for a one-way copy.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub filters: Vec<FilterRule>,
    pub transfers: u32,
    /// Remove destination files with no source counterpart.
    pub delete_extraneous: bool,
}

/// Options for a bidirectional run.
#[derive(Debug, Clone)]
pub struct BisyncOptions {
    pub filters: Vec<FilterRule>,
    pub transfers: u32,
    pub conflict_resolution: ConflictResolution,
}

/// The thin interface the sync orchestrator drives.
///
/// `run_copy` / `run_bisync` are one-shot blocking invocations; live
/// counters and the per-file transfer lists stream through the
/// caller-supplied [`StatsGroup`], which isolates one job's numbers from
/// every other job on the same engine.
#[async_trait]
pub trait TransferEngine: Send + Sync + 'static {
    /// Resolve a filesystem root. A cached handle for `remote:path`, or a
    /// non-cached direct handle when `remote` is empty.
    async fn resolve_fs(&self, remote: &str, path: &str) -> Result<FsHandle, EngineError>;

    /// Drop cached handles prefixed by the remote name.
    fn invalidate_fs(&self, remote: &str);

    /// Install or replace a named config section, invalidating cached
    /// handles for that name in the same critical section.
    fn set_section(&self, name: &str, config: ConfigMap);

    /// Remove a named config section, invalidating its cached handles.
    fn delete_section(&self, name: &str);

    /// Validate a single filter rule (shape and pattern syntax).
    fn validate_filter_rule(&self, rule: &str) -> Result<(), EngineError>;

    async fn run_copy(
        &self,
        cancel: CancellationToken,
        src: &FsHandle,
        dst: &FsHandle,
        options: &CopyOptions,
        stats: &StatsGroup,
    ) -> Result<(), EngineError>;

    async fn run_bisync(
        &self,
        cancel: CancellationToken,
        first: &FsHandle,
        second: &FsHandle,
        workdir: &Path,
        options: &BisyncOptions,
        stats: &StatsGroup,
    ) -> Result<(), EngineError>;
}

/// Shared filter-rule validation: rule shape plus glob syntax.
pub(crate) fn validate_rule(rule: &str) -> Result<(), EngineError> {
    let parsed = FilterRule::parse(rule)?;
    glob::Pattern::new(parsed.pattern())
        .map(|_| ())
        .map_err(|source| EngineError::BadPattern { rule: rule.to_string(), source })
}
