//! Transcript directory watcher
//!
//! Subscribes to recursive change notifications on the transcript directory
//! and hands every changed transcript path to the engine's message channel.
//! The callback runs on notify's own thread and never touches engine state.

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::live::EngineMessage;

/// Keeps the underlying notify watcher alive; dropping it stops notifications
pub struct TranscriptWatcher {
    _watcher: RecommendedWatcher,
}

impl TranscriptWatcher {
    /// Start watching `root` for changes to files ending in `.{extension}`
    pub fn start(root: &Path, extension: &str, tx: mpsc::Sender<EngineMessage>) -> Result<Self> {
        let extension = extension.trim_start_matches('.').to_string();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => forward_event(event, &extension, &tx),
                Err(e) => warn!(error = %e, "Transcript watcher error"),
            },
            NotifyConfig::default(),
        )
        .context("Failed to create transcript watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        info!(root = %root.display(), "Watching transcripts");

        Ok(Self { _watcher: watcher })
    }
}

fn forward_event(event: Event, extension: &str, tx: &mpsc::Sender<EngineMessage>) {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return;
    }

    for path in event.paths {
        if !is_transcript(&path, extension) {
            continue;
        }
        match tx.try_send(EngineMessage::TranscriptChanged(path)) {
            Ok(()) => {}
            Err(TrySendError::Full(EngineMessage::TranscriptChanged(path))) => {
                debug!(path = %path.display(), "Engine busy, dropping change notification");
            }
            Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Closed(_)) => return,
        }
    }
}

/// Whether `path` names a transcript file
pub fn is_transcript(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension.trim_start_matches('.')))
        .unwrap_or(false)
}
