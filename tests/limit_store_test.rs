mod common;

use chrono::{TimeZone, Utc};
use claude_tokens::models::LimitEvent;
use claude_tokens::LimitStore;
use common::TestHome;
use std::fs;

#[test]
fn test_history_survives_reopen() {
    let home = TestHome::new().unwrap();
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();

    let mut store = LimitStore::open(home.limits_file(), home.status_file());
    for (i, tokens) in [40_000u64, 48_000, 52_000].into_iter().enumerate() {
        let at = start + chrono::Duration::hours(6 * i as i64);
        store.append(LimitEvent::new(at, tokens, None)).unwrap();
    }

    let reopened = LimitStore::open(home.limits_file(), home.status_file());
    assert_eq!(reopened.event_count(), 3);
    assert_eq!(reopened.estimated_limit(), Some(48_000));
    assert!(reopened.is_calibrated());
    assert_eq!(reopened.events(), store.events());
}

#[test]
fn test_even_count_uses_integer_mean_of_middle_pair() {
    let home = TestHome::new().unwrap();
    let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();

    let mut store = LimitStore::open(home.limits_file(), home.status_file());
    store.append(LimitEvent::new(at, 40_001, None)).unwrap();
    store.append(LimitEvent::new(at, 48_000, None)).unwrap();
    assert_eq!(store.estimated_limit(), Some(44_000));
}

#[test]
fn test_undo_patches_usage_summary_in_place() {
    let home = TestHome::new().unwrap();
    home.write_usage(24_000, 50_000).unwrap();
    home.write_history(serde_json::json!([
        {"timestamp": "2025-06-01T04:00:00Z", "tokens_at_limit": 40000},
        {"timestamp": "2025-06-01T09:00:00Z", "tokens_at_limit": 48000,
         "reset_timestamp": "2025-06-01T14:00:00Z"}
    ]))
    .unwrap();

    let mut store = LimitStore::open(home.limits_file(), home.status_file());
    assert!(store.remove_last().unwrap());
    assert_eq!(store.event_count(), 1);
    assert_eq!(store.estimated_limit(), Some(40_000));

    let status = home.read_json(&home.status_file()).unwrap();
    assert_eq!(status["limit_event_count"], 1);
    assert_eq!(status["estimated_limit"], 40_000);
    assert_eq!(status["window_start"], "2025-06-01T04:00:00Z");
    // Totals and unknown keys are left alone
    assert_eq!(status["window"]["total"], 50_000);
    assert_eq!(status["session"]["total"], 24_000);
    assert_eq!(status["collector_version"], "1.2.0");

    let history = home.read_json(&home.limits_file()).unwrap();
    assert_eq!(history["events"].as_array().unwrap().len(), 1);
}

#[test]
fn test_undo_last_event_clears_window_start() {
    let home = TestHome::new().unwrap();
    home.write_usage(1_000, 2_000).unwrap();
    home.write_history(serde_json::json!([
        {"timestamp": "2025-06-01T09:00:00Z", "tokens_at_limit": 48000}
    ]))
    .unwrap();

    let mut store = LimitStore::open(home.limits_file(), home.status_file());
    assert!(store.remove_last().unwrap());
    assert_eq!(store.estimated_limit(), None);

    let status = home.read_json(&home.status_file()).unwrap();
    assert_eq!(status["limit_event_count"], 0);
    assert!(status["estimated_limit"].is_null());
    assert!(status["window_start"].is_null());
}

#[test]
fn test_undo_on_empty_history_writes_nothing() {
    let home = TestHome::new().unwrap();

    let mut store = LimitStore::open(home.limits_file(), home.status_file());
    assert!(!store.remove_last().unwrap());
    assert!(!home.limits_file().exists());
    assert!(!home.status_file().exists());
}

#[test]
fn test_corrupt_history_is_backed_up_and_replaced() {
    let home = TestHome::new().unwrap();
    fs::write(home.limits_file(), "{ not json").unwrap();

    let mut store = LimitStore::open(home.limits_file(), home.status_file());
    assert_eq!(store.event_count(), 0);

    let backup = home.path().join("token_limits.json.bak");
    assert_eq!(fs::read_to_string(&backup).unwrap(), "{ not json");

    let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
    store.append(LimitEvent::new(at, 45_000, None)).unwrap();
    let history = home.read_json(&home.limits_file()).unwrap();
    assert_eq!(history["events"][0]["tokens_at_limit"], 45_000);
}

#[test]
fn test_append_keeps_events_written_by_another_process() {
    let home = TestHome::new().unwrap();
    let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();

    let mut engine = LimitStore::open(home.limits_file(), home.status_file());
    let mut cli = LimitStore::open(home.limits_file(), home.status_file());

    engine.append(LimitEvent::new(at, 40_000, None)).unwrap();
    cli.append(LimitEvent::new(at, 50_000, None)).unwrap();

    let reopened = LimitStore::open(home.limits_file(), home.status_file());
    assert_eq!(reopened.event_count(), 2);
    assert_eq!(reopened.estimated_limit(), Some(45_000));
}
