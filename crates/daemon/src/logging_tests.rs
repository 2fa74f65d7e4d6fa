// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::LogConfig;
use std::collections::HashMap;

#[test]
fn filter_accepts_default_and_dotted_targets() {
    let log = LogConfig {
        level: "info".to_string(),
        levels: HashMap::from([
            ("skiff_engine".to_string(), "debug".to_string()),
            ("skiff_engine.runner".to_string(), "trace".to_string()),
        ]),
    };
    build_filter(&log).unwrap();
}

#[test]
fn bad_level_in_map_is_rejected() {
    let log = LogConfig {
        level: "info".to_string(),
        levels: HashMap::from([("skiff_engine".to_string(), "shouty".to_string())]),
    };
    assert!(build_filter(&log).is_err());
}
