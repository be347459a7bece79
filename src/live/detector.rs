//! Rate-limit and reset detection over tailed transcript lines
//!
//! Both detectors take lines newest first (see [`crate::live::tail`]) and only
//! care about the newest relevant entry. Lines that are not JSON objects or
//! carry no parseable timestamp are skipped.

use crate::config::DetectionConfig;
use crate::models::LimitEvent;
use crate::reset_phrase::parse_reset_phrase;
use crate::timestamp_parser::TimestampParser;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a detected limit's reset instant was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetSource {
    Phrase,
    Fallback,
}

/// A rate-limit error newly seen in a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedLimit {
    /// Timestamp of the error line in the transcript
    pub logged_at: DateTime<Utc>,
    /// When this process noticed it
    pub detected_at: DateTime<Utc>,
    pub reset_at: DateTime<Utc>,
    pub reset_source: ResetSource,
}

impl DetectedLimit {
    pub fn into_event(self, tokens_at_limit: u64) -> LimitEvent {
        LimitEvent::new(self.detected_at, tokens_at_limit, Some(self.reset_at))
    }
}

pub struct RateLimitDetector {
    rate_limit_markers: Vec<String>,
    error_markers: Vec<String>,
    fallback: Duration,
    /// Lower bound applied to every file, seeded from stored history
    floor: Option<DateTime<Utc>>,
    cursors: HashMap<PathBuf, DateTime<Utc>>,
}

impl RateLimitDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            rate_limit_markers: lowercase_all(&config.rate_limit_markers),
            error_markers: lowercase_all(&config.error_markers),
            fallback: Duration::hours(config.fallback_reset_hours),
            floor: None,
            cursors: HashMap::new(),
        }
    }

    /// Ignore errors logged at or before `instant` in every file
    pub fn seed_floor(&mut self, instant: DateTime<Utc>) {
        self.floor = Some(self.floor.map_or(instant, |f| f.max(instant)));
    }

    pub fn last_seen(&self, path: &Path) -> Option<DateTime<Utc>> {
        let cursor = self.cursors.get(path).copied();
        match (cursor, self.floor) {
            (Some(c), Some(f)) => Some(c.max(f)),
            (c, f) => c.or(f),
        }
    }

    /// Look for a rate-limit error newer than anything already seen in `path`
    pub fn scan(&mut self, path: &Path, lines: &[String], now: DateTime<Utc>) -> Option<DetectedLimit> {
        let (logged_at, entry) = lines
            .iter()
            .filter(|line| self.is_candidate(line))
            .find_map(|line| parse_timestamped(line))?;

        if self.last_seen(path).is_some_and(|seen| logged_at <= seen) {
            debug!(path = %path.display(), %logged_at, "Rate limit already seen");
            return None;
        }
        self.cursors.insert(path.to_path_buf(), logged_at);

        let phrase_reset = first_text(&entry).and_then(|text| parse_reset_phrase(text, now));
        let (reset_at, reset_source) = match phrase_reset {
            Some(reset_at) => (reset_at, ResetSource::Phrase),
            None => (now + self.fallback, ResetSource::Fallback),
        };

        Some(DetectedLimit {
            logged_at,
            detected_at: now,
            reset_at,
            reset_source,
        })
    }

    fn is_candidate(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        contains_any(&lower, &self.rate_limit_markers) && contains_any(&lower, &self.error_markers)
    }
}

/// Watches for the first successful response after a limit
pub struct ResetDetector {
    debounce: Duration,
    limit_instant: Option<DateTime<Utc>>,
}

impl ResetDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            debounce: Duration::seconds(config.reset_debounce_secs),
            limit_instant: None,
        }
    }

    pub fn arm(&mut self, limit_instant: DateTime<Utc>) {
        self.limit_instant = Some(limit_instant);
    }

    pub fn disarm(&mut self) {
        self.limit_instant = None;
    }

    pub fn armed(&self) -> Option<DateTime<Utc>> {
        self.limit_instant
    }

    /// Returns the timestamp of the recovering response, at most once per arm
    pub fn scan(&mut self, lines: &[String]) -> Option<DateTime<Utc>> {
        let threshold = self.limit_instant? + self.debounce;

        let recovered_at = lines
            .iter()
            .filter_map(|line| parse_timestamped(line))
            .filter(|(_, entry)| is_assistant_success(entry))
            .map(|(ts, _)| ts)
            .find(|ts| *ts > threshold)?;

        self.limit_instant = None;
        Some(recovered_at)
    }
}

fn parse_timestamped(line: &str) -> Option<(DateTime<Utc>, Value)> {
    let entry: Value = serde_json::from_str(line).ok()?;
    let raw = entry.as_object()?.get("timestamp")?.as_str()?;
    let ts = TimestampParser::parse(raw).ok()?;
    Some((ts, entry))
}

fn is_assistant_success(entry: &Value) -> bool {
    if entry.get("type").and_then(Value::as_str) != Some("assistant") {
        return false;
    }
    let api_error = entry
        .get("isApiErrorMessage")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let has_error = entry.get("error").is_some_and(|e| !e.is_null());
    !api_error && !has_error
}

/// First `message.content[].text`, or `message.content` when it is a string
fn first_text(entry: &Value) -> Option<&str> {
    match entry.get("message")?.get("content")? {
        Value::String(text) => Some(text),
        Value::Array(parts) => parts
            .iter()
            .find_map(|part| part.get("text").and_then(Value::as_str)),
        _ => None,
    }
}

fn lowercase_all(markers: &[String]) -> Vec<String> {
    markers.iter().map(|m| m.to_lowercase()).collect()
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_str()))
}
