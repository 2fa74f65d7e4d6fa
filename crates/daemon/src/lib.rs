// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! skiff-daemon: the ambient shell around the orchestration core.
//!
//! Configuration loading with environment overrides, logging setup, the
//! service façades the HTTP/GraphQL layer consumes, and the lifecycle
//! wiring that assembles database, engine, runner, scheduler, watcher,
//! and cleanup into one process.

pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod services;

pub use config::{Config, ConfigError};
pub use lifecycle::{Daemon, DaemonError};
pub use services::{
    ConnectionService, ConnectionView, JobService, NewConnection, NewTask, ServiceError,
    TaskService,
};
