// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named remote endpoints.
//!
//! The persisted shape (with its encrypted config blob) lives in the
//! storage gateway; this module owns the identifier and the decrypted
//! in-memory config form shared with the engine seam.

use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a connection.
    pub struct ConnectionId;
}

/// Key→value provider configuration, decrypted in-memory form.
///
/// Only the service layer and the engine's config registry ever hold the
/// plaintext map; it is never returned through the API surface.
pub type ConfigMap = HashMap<String, String>;
