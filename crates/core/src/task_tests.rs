// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    upload = { SyncDirection::Upload, "UPLOAD" },
    download = { SyncDirection::Download, "DOWNLOAD" },
    bidirectional = { SyncDirection::Bidirectional, "BIDIRECTIONAL" },
)]
fn direction_string_round_trip(direction: SyncDirection, tag: &str) {
    assert_eq!(direction.as_str(), tag);
    assert_eq!(tag.parse::<SyncDirection>().unwrap(), direction);
}

#[test]
fn direction_rejects_unknown_tag() {
    assert!("SIDEWAYS".parse::<SyncDirection>().is_err());
}

#[test]
fn default_options_validate() {
    assert_eq!(TaskOptions::default().validate(), Ok(()));
}

#[parameterized(
    min = { 1 },
    mid = { 4 },
    max = { 64 },
)]
fn transfers_in_range_accepted(n: u32) {
    let options = TaskOptions { transfers: Some(n), ..TaskOptions::default() };
    assert_eq!(options.validate(), Ok(()));
}

#[parameterized(
    zero = { 0 },
    above = { 65 },
)]
fn transfers_out_of_range_rejected(n: u32) {
    let options = TaskOptions { transfers: Some(n), ..TaskOptions::default() };
    assert_eq!(options.validate(), Err(OptionsError::TransfersOutOfRange(n)));
}

#[test]
fn bad_filter_rule_rejected() {
    let options = TaskOptions { filters: vec!["*.tmp".into()], ..TaskOptions::default() };
    assert!(matches!(options.validate(), Err(OptionsError::Filter(_))));
}

#[test]
fn filter_rules_preserve_order() {
    let options = TaskOptions {
        filters: vec!["- *.tmp".into(), "+ **".into()],
        ..TaskOptions::default()
    };
    let rules = options.filter_rules().unwrap();
    assert!(!rules[0].is_include());
    assert!(rules[1].is_include());
}

#[test]
fn no_delete_is_ignored_for_bidirectional() {
    let task = Task::builder()
        .direction(SyncDirection::Bidirectional)
        .options(TaskOptions { no_delete: true, ..TaskOptions::default() })
        .build();
    assert!(!task.deletes_extraneous());

    let task = Task::builder()
        .direction(SyncDirection::Upload)
        .options(TaskOptions { no_delete: true, ..TaskOptions::default() })
        .build();
    assert!(!task.deletes_extraneous());

    let task = Task::builder().direction(SyncDirection::Download).build();
    assert!(task.deletes_extraneous());
}

#[test]
fn options_serde_defaults_missing_fields() {
    let options: TaskOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(options, TaskOptions::default());

    let options: TaskOptions =
        serde_json::from_str(r#"{"filters":["- *.log"],"transfers":8}"#).unwrap();
    assert_eq!(options.transfers, Some(8));
    assert_eq!(options.conflict_resolution, ConflictResolution::Newer);
}
