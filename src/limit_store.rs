//! Limit Event Store
//!
//! Owns the append-only history of limit events and the estimate derived from
//! it. Every mutation re-reads the file first, applies the change, and rewrites
//! the whole file, so a one-shot CLI command and a running engine never lose
//! each other's events.
//!
//! Loading never fails: a missing file is an empty history, and an unreadable
//! one is copied aside to `<name>.bak` and then treated as empty.

use crate::models::{LimitEvent, LimitsHistory};
use crate::persist::{read_json, write_atomic};
use crate::usage::StatusPatch;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct LimitStore {
    path: PathBuf,
    status_path: PathBuf,
    history: LimitsHistory,
    estimated_limit: Option<u64>,
}

impl LimitStore {
    /// Open the store backed by `path`; `status_path` is the usage summary
    /// patched after an undo
    pub fn open(path: impl Into<PathBuf>, status_path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let history = Self::load(&path);
        let estimated_limit = history.estimated_limit();

        debug!(
            path = %path.display(),
            events = history.len(),
            estimated_limit = ?estimated_limit,
            "Opened limit history"
        );

        Self {
            path,
            status_path: status_path.into(),
            history,
            estimated_limit,
        }
    }

    /// Read persisted history, substituting an empty one on any failure
    pub fn load(path: &Path) -> LimitsHistory {
        if !path.exists() {
            return LimitsHistory::default();
        }

        match read_json::<LimitsHistory>(path) {
            Ok(history) => history,
            Err(e) => {
                // Polling reloads the same corrupt file repeatedly; only report it once
                if preserve_corrupt(path) {
                    warn!(path = %path.display(), error = %e, "Limit history unreadable, starting empty");
                } else {
                    debug!(path = %path.display(), error = %e, "Limit history still unreadable");
                }
                LimitsHistory::default()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn history(&self) -> &LimitsHistory {
        &self.history
    }

    pub fn events(&self) -> &[LimitEvent] {
        &self.history.events
    }

    pub fn last_event(&self) -> Option<&LimitEvent> {
        self.history.last()
    }

    pub fn event_count(&self) -> usize {
        self.history.len()
    }

    pub fn is_calibrated(&self) -> bool {
        self.event_count() >= 1
    }

    pub fn estimated_limit(&self) -> Option<u64> {
        self.estimated_limit
    }

    /// Pick up changes written by another process
    pub fn reload(&mut self) {
        self.history = Self::load(&self.path);
        self.recompute();
    }

    /// Append an event and persist the full history
    pub fn append(&mut self, event: LimitEvent) -> Result<()> {
        self.reload();
        self.history.events.push(event);
        self.recompute();
        self.save()?;

        info!(
            events = self.event_count(),
            estimated_limit = ?self.estimated_limit,
            "Recorded limit event"
        );
        Ok(())
    }

    /// Remove the most recent event.
    ///
    /// Returns `Ok(false)` without touching disk when the history is empty.
    /// Otherwise persists, then patches the usage summary's event-derived
    /// fields so its window totals stay visible.
    pub fn remove_last(&mut self) -> Result<bool> {
        self.reload();
        let Some(removed) = self.history.events.pop() else {
            debug!("Undo requested on empty limit history");
            return Ok(false);
        };

        self.recompute();
        self.save()?;

        let patch = StatusPatch::from_history(&self.history);
        if let Err(e) = patch.write_to(&self.status_path) {
            warn!(
                path = %self.status_path.display(),
                error = %e,
                "Failed to patch usage summary after undo"
            );
        }

        info!(
            removed_tokens = removed.tokens_at_limit,
            events = self.event_count(),
            estimated_limit = ?self.estimated_limit,
            "Removed last limit event"
        );
        Ok(true)
    }

    fn recompute(&mut self) {
        self.estimated_limit = self.history.estimated_limit();
    }

    fn save(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.history)
            .context("Failed to serialize limit history")?;
        write_atomic(&self.path, &bytes)
    }
}

/// Copy an unreadable history to `<name>.bak`. Returns false when the backup
/// already holds these exact bytes.
fn preserve_corrupt(path: &Path) -> bool {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".bak");
    let backup = PathBuf::from(backup);

    let current = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read unreadable limit history");
            return true;
        }
    };
    if fs::read(&backup).is_ok_and(|saved| saved == current) {
        return false;
    }

    match fs::write(&backup, &current) {
        Ok(()) => info!(backup = %backup.display(), "Saved unreadable limit history"),
        Err(e) => warn!(backup = %backup.display(), error = %e, "Failed to back up limit history"),
    }
    true
}
