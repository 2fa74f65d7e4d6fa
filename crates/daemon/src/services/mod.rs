// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service façades consumed by the HTTP/GraphQL layer.
//!
//! Edge validation lives here: anything invalid is rejected before a row
//! is written or a trigger source touched.

pub mod connections;
pub mod jobs;
pub mod tasks;

pub use connections::{ConnectionService, ConnectionView, NewConnection};
pub use jobs::JobService;
pub use tasks::{NewTask, TaskService};

use skiff_adapters::{CredentialError, EngineError};
use skiff_core::{Classify, ErrorKind, OptionsError};
use skiff_engine::{RunnerError, SchedulerError, WatchError};
use skiff_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("{0}")]
    Validation(String),
}

impl Classify for ServiceError {
    fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Storage(e) => e.kind(),
            ServiceError::Credential(e) => e.kind(),
            ServiceError::Engine(e) => e.kind(),
            ServiceError::Options(e) => e.kind(),
            ServiceError::Scheduler(e) => e.kind(),
            ServiceError::Watch(e) => e.kind(),
            ServiceError::Runner(e) => e.kind(),
            ServiceError::Validation(_) => ErrorKind::Validation,
        }
    }
}
