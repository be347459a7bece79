//! Core Data Models
//!
//! This module defines the data structures shared by the limit tracker: the
//! persisted limit history, and the usage summary written by the external
//! collector hook.
//!
//! ## Core Types
//!
//! ### Owned state
//! - [`LimitEvent`] - One observed "ran out of tokens" occurrence
//! - [`LimitsHistory`] - Append-only sequence of events, persisted as JSON
//!
//! ### External state (read-only)
//! - [`UsageSnapshot`] - Session and window counters from the usage summary file
//! - [`TokenCounts`] - Token counters for one accounting scope
//!
//! ## Derived values
//!
//! The estimated limit is never stored by this crate; it is the median of
//! `tokens_at_limit` across the history, see [`estimated_limit`].

use crate::timestamp_parser::{serde_instant, serde_instant_opt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitEvent {
    /// When this process noticed (or the user reported) the limit
    #[serde(with = "serde_instant")]
    pub timestamp: DateTime<Utc>,
    /// Window total at the moment of the event
    pub tokens_at_limit: u64,
    /// Absent for manual and legacy events
    #[serde(
        default,
        with = "serde_instant_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub reset_timestamp: Option<DateTime<Utc>>,
}

impl LimitEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        tokens_at_limit: u64,
        reset_timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            timestamp,
            tokens_at_limit,
            reset_timestamp,
        }
    }

    /// Reset instant if it is still ahead of `now`
    pub fn pending_reset(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.reset_timestamp.filter(|reset| *reset > now)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsHistory {
    #[serde(default)]
    pub events: Vec<LimitEvent>,
}

impl LimitsHistory {
    pub fn last(&self) -> Option<&LimitEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn estimated_limit(&self) -> Option<u64> {
        estimated_limit(&self.events)
    }
}

/// Median of `tokens_at_limit`; an even count averages the two middle values
pub fn estimated_limit(events: &[LimitEvent]) -> Option<u64> {
    if events.is_empty() {
        return None;
    }

    let mut values: Vec<u64> = events.iter().map(|e| e.tokens_at_limit).collect();
    values.sort_unstable();
    let mid = values.len() / 2;

    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        let (a, b) = (values[mid - 1], values[mid]);
        Some(a / 2 + b / 2 + (a % 2 + b % 2) / 2)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub cache_write: u64,
    #[serde(default)]
    pub cache_read: u64,
}

/// Contents of the usage summary file, as last written by the collector hook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    #[serde(default)]
    pub updated_ts: String,
    pub session: TokenCounts,
    pub window: TokenCounts,
    #[serde(default)]
    pub window_start: Option<String>,
    #[serde(default)]
    pub estimated_limit: Option<u64>,
    #[serde(default)]
    pub limit_event_count: u64,
}
