//! Usage summary access
//!
//! The usage summary file belongs to the external collector hook. This crate
//! reads it on every poll and writes to it in exactly one case: after an undo,
//! the three event-derived fields are patched so the visible window totals are
//! kept while the estimate reflects the shortened history. The patch is a
//! merge into the generic JSON object, never a re-serialization of
//! [`UsageSnapshot`], so fields this crate does not model survive.

use crate::models::{LimitsHistory, UsageSnapshot};
use crate::persist::{read_json, write_atomic};
use crate::timestamp_parser::TimestampParser;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Read the current usage snapshot
pub fn read_usage_snapshot(path: &Path) -> Result<UsageSnapshot> {
    read_json(path)
}

/// Partial update of the event-derived fields of the usage summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPatch {
    pub limit_event_count: u64,
    pub estimated_limit: Option<u64>,
    pub window_start: Option<String>,
}

impl StatusPatch {
    pub fn from_history(history: &LimitsHistory) -> Self {
        Self {
            limit_event_count: history.len() as u64,
            estimated_limit: history.estimated_limit(),
            window_start: history.last().map(|e| TimestampParser::format(&e.timestamp)),
        }
    }

    /// Overwrite the three owned keys, leaving every other key untouched
    pub fn apply(&self, doc: &mut Map<String, Value>) {
        doc.insert(
            "limit_event_count".to_string(),
            Value::from(self.limit_event_count),
        );
        doc.insert(
            "estimated_limit".to_string(),
            self.estimated_limit.map(Value::from).unwrap_or(Value::Null),
        );
        doc.insert(
            "window_start".to_string(),
            self.window_start.clone().map(Value::from).unwrap_or(Value::Null),
        );
    }

    /// Patch the usage summary file in place.
    ///
    /// Returns `Ok(false)` without writing when the file is missing or is not
    /// a JSON object; there is nothing to preserve in that case.
    pub fn write_to(&self, path: &Path) -> Result<bool> {
        let mut doc = match read_json::<Value>(path) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                debug!(path = %path.display(), "Usage summary is not an object, skipping patch");
                return Ok(false);
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Usage summary unreadable, skipping patch");
                return Ok(false);
            }
        };

        self.apply(&mut doc);
        let bytes = serde_json::to_vec(&Value::Object(doc))
            .context("Failed to serialize patched usage summary")?;
        write_atomic(path, &bytes)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LimitEvent;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    #[test]
    fn test_apply_preserves_unknown_fields() {
        let mut doc: Map<String, Value> = serde_json::from_str(
            r#"{"window":{"total":500},"extra":"keep","estimated_limit":9,"limit_event_count":3}"#,
        )
        .unwrap();

        let patch = StatusPatch {
            limit_event_count: 0,
            estimated_limit: None,
            window_start: None,
        };
        patch.apply(&mut doc);

        assert_eq!(doc["extra"], "keep");
        assert_eq!(doc["window"]["total"], 500);
        assert_eq!(doc["limit_event_count"], 0);
        assert!(doc["estimated_limit"].is_null());
        assert!(doc["window_start"].is_null());
    }

    #[test]
    fn test_patch_from_history() {
        let ts = Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();
        let history = LimitsHistory {
            events: vec![LimitEvent::new(ts, 100, None), LimitEvent::new(ts, 300, None)],
        };
        let patch = StatusPatch::from_history(&history);
        assert_eq!(patch.limit_event_count, 2);
        assert_eq!(patch.estimated_limit, Some(200));
        assert_eq!(patch.window_start.as_deref(), Some("2025-02-03T04:05:06Z"));
    }

    #[test]
    fn test_write_to_missing_file_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token_status.json");
        let patch = StatusPatch::from_history(&LimitsHistory::default());
        assert!(!patch.write_to(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_read_usage_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token_status.json");
        std::fs::write(
            &path,
            r#"{"updated_ts":"x","session":{"total":5},"window":{"total":50000},"window_start":null,"estimated_limit":null,"limit_event_count":0}"#,
        )
        .unwrap();

        let snapshot = read_usage_snapshot(&path).unwrap();
        assert_eq!(snapshot.window.total, 50_000);
        assert!(read_usage_snapshot(&dir.path().join("nope.json")).is_err());
    }
}
