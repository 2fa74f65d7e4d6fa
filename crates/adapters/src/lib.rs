// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! skiff-adapters: seams to the outside world.
//!
//! The narrow [`TransferEngine`] interface the orchestrator consumes, the
//! process-wide connection-config registry with fs-handle cache
//! invalidation, per-job stats groups, a local-filesystem engine, and the
//! credential cipher.

pub mod credential;
pub mod engine;

pub use credential::{CredentialCipher, CredentialError};
pub use engine::config::ConfigRegistry;
pub use engine::local::LocalTransferEngine;
pub use engine::stats::{CompletedTransfer, StatsGroup, StatsSnapshot};
pub use engine::{
    BisyncOptions, CopyOptions, EngineError, FsHandle, TransferEngine, DEFAULT_TRANSFERS,
};

#[cfg(any(test, feature = "test-support"))]
pub use engine::fake::{FakeBehavior, FakeEngine, ReleaseHandle};
