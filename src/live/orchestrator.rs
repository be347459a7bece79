//! Live mode orchestrator
//!
//! The orchestrator is the single writer of everything the live engine owns:
//! - the limit history (through [`LimitStore`])
//! - both transcript detectors and their dedup cursors
//! - the display [`StateMachine`]
//!
//! Its `run` loop multiplexes engine messages, the usage poll, the countdown
//! tick and (only while refilling) the animation interval. After every input
//! the current [`DisplayState`] is published on a `watch` channel.
//!
//! The handler methods take the current instant explicitly so they can be
//! driven directly without the timers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration as StdDuration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::display::DisplayState;
use crate::limit_store::LimitStore;
use crate::live::detector::{DetectedLimit, RateLimitDetector, ResetDetector};
use crate::live::hook::HookNotifier;
use crate::live::state_machine::{StateMachine, Timing};
use crate::live::tail::tail_lines;
use crate::live::watcher::TranscriptWatcher;
use crate::live::EngineMessage;
use crate::models::{LimitEvent, UsageSnapshot};
use crate::usage::read_usage_snapshot;

/// Cloneable front door to a running orchestrator
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineMessage>,
    display: watch::Receiver<DisplayState>,
}

impl EngineHandle {
    pub async fn send(&self, message: EngineMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .context("Live engine has stopped")
    }

    pub fn sender(&self) -> mpsc::Sender<EngineMessage> {
        self.tx.clone()
    }

    /// A receiver positioned at the latest published state
    pub fn display(&self) -> watch::Receiver<DisplayState> {
        self.display.clone()
    }
}

/// Main orchestrator for live mode operations
pub struct LiveOrchestrator {
    config: Config,
    store: LimitStore,
    rate_limits: RateLimitDetector,
    resets: ResetDetector,
    machine: StateMachine,
    hook: HookNotifier,
    tx: mpsc::Sender<EngineMessage>,
    rx: mpsc::Receiver<EngineMessage>,
    display_tx: watch::Sender<DisplayState>,
    /// Bumped whenever a refill starts so the run loop restarts its animation timer
    refill_generation: u64,
}

impl LiveOrchestrator {
    /// Create an orchestrator resumed from persisted history at the current instant
    pub fn new(config: &Config) -> Self {
        Self::new_at(config, Utc::now())
    }

    /// Create an orchestrator resumed from persisted history at `now`.
    ///
    /// A countdown whose reset instant is still ahead is restored and the
    /// reset detector re-armed; otherwise the engine starts idle.
    pub fn new_at(config: &Config, now: DateTime<Utc>) -> Self {
        let store = LimitStore::open(&config.paths.limits_file, &config.paths.status_file);

        let mut rate_limits = RateLimitDetector::new(&config.detection);
        let mut resets = ResetDetector::new(&config.detection);

        let last = store.last_event();
        if let Some(event) = last {
            rate_limits.seed_floor(event.timestamp);
            if let Some(reset_at) = event.pending_reset(now) {
                resets.arm(event.timestamp);
                info!(%reset_at, "Resuming countdown from limit history");
            }
        }

        let mut machine = StateMachine::resume(Timing::from(&config.live), last, now);
        machine.set_calibration(store.event_count(), store.estimated_limit());
        machine.on_usage(read_usage(&config.paths.status_file), now);

        let initial = DisplayState::build(&machine, store.events(), now);
        let (display_tx, _) = watch::channel(initial);
        let (tx, rx) = mpsc::channel(config.live.channel_buffer.max(1));

        Self {
            config: config.clone(),
            store,
            rate_limits,
            resets,
            machine,
            hook: HookNotifier::new(&config.hook),
            tx,
            rx,
            display_tx,
            refill_generation: 0,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.tx.clone(),
            display: self.display_tx.subscribe(),
        }
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn store(&self) -> &LimitStore {
        &self.store
    }

    pub fn reset_armed(&self) -> Option<DateTime<Utc>> {
        self.resets.armed()
    }

    pub fn display(&self, now: DateTime<Utc>) -> DisplayState {
        DisplayState::build(&self.machine, self.store.events(), now)
    }

    /// Run until a `Shutdown` message arrives.
    ///
    /// A transcript directory that cannot be watched is logged and the engine
    /// keeps running on timers and commands alone.
    pub async fn run(mut self) -> Result<()> {
        let live = self.config.live.clone();
        let projects_dir = self.config.paths.projects_dir.clone();

        let _watcher = match TranscriptWatcher::start(
            &projects_dir,
            &self.config.detection.transcript_extension,
            self.tx.clone(),
        ) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(
                    path = %projects_dir.display(),
                    error = %e,
                    "Transcript watching unavailable, limits will not be detected automatically"
                );
                None
            }
        };

        let mut poll = time::interval(StdDuration::from_secs(live.poll_interval_secs));
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut countdown = time::interval(StdDuration::from_millis(live.countdown_tick_ms));
        countdown.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let frame = StdDuration::from_millis((1000 / live.refill_steps_per_sec.max(1)).max(1));

        let mut animation: Option<Interval> = None;
        let mut animation_generation = self.refill_generation;

        info!(
            events = self.store.event_count(),
            estimated_limit = ?self.store.estimated_limit(),
            "Live engine started"
        );
        self.publish(Utc::now());

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(EngineMessage::Shutdown) | None => break,
                    Some(message) => self.handle_message(message, Utc::now()),
                },
                _ = poll.tick() => self.poll_usage(Utc::now()),
                _ = countdown.tick() => self.countdown_tick(Utc::now()),
                _ = next_frame(&mut animation) => self.animation_tick(Utc::now()),
            }

            if !self.machine.is_refilling() {
                animation = None;
            } else if animation.is_none() || animation_generation != self.refill_generation {
                animation = Some(time::interval(frame));
                animation_generation = self.refill_generation;
            }

            self.publish(Utc::now());
        }

        info!("Live engine stopped");
        Ok(())
    }

    pub fn handle_message(&mut self, message: EngineMessage, now: DateTime<Utc>) {
        match message {
            EngineMessage::TranscriptChanged(path) => self.on_transcript_changed(&path, now),
            EngineMessage::RecordLimit => {
                if let Err(e) = self.record_manual(now) {
                    warn!(error = %e, "Manual limit not recorded");
                }
            }
            EngineMessage::UndoLast => {
                if let Err(e) = self.undo(now) {
                    error!(error = %e, "Failed to undo last limit event");
                }
            }
            EngineMessage::Shutdown => {}
        }
    }

    /// Scan a changed transcript: rate limits first, then recovery
    pub fn on_transcript_changed(&mut self, path: &Path, now: DateTime<Utc>) {
        match tail_lines(path, self.config.detection.rate_limit_tail_bytes) {
            Ok(lines) => {
                if let Some(hit) = self.rate_limits.scan(path, &lines, now) {
                    self.on_rate_limit(hit, now);
                    return;
                }
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Could not read transcript tail");
                return;
            }
        }

        if self.resets.armed().is_none() {
            return;
        }

        match tail_lines(path, self.config.detection.reset_tail_bytes) {
            Ok(lines) => {
                if let Some(recovered_at) = self.resets.scan(&lines) {
                    info!(%recovered_at, "Successful response after limit, tokens refilled");
                    if self.machine.on_recovery(now) {
                        self.refill_generation += 1;
                    }
                }
            }
            Err(e) => debug!(path = %path.display(), error = %e, "Could not read transcript tail"),
        }
    }

    fn on_rate_limit(&mut self, hit: DetectedLimit, now: DateTime<Utc>) {
        info!(
            logged_at = %hit.logged_at,
            reset_at = %hit.reset_at,
            source = ?hit.reset_source,
            "Rate limit detected"
        );

        let fresh = read_usage(&self.config.paths.status_file);
        let tokens = fresh
            .as_ref()
            .or(self.machine.usage())
            .map(|usage| usage.window.total);

        let logged_at = hit.logged_at;
        let reset_at = hit.reset_at;

        match tokens {
            Some(tokens) => match self.store.append(hit.into_event(tokens)) {
                Ok(()) => {
                    self.sync_calibration();
                    self.hook.notify();
                }
                Err(e) => error!(error = %e, "Failed to persist limit event"),
            },
            None => warn!("Usage summary unavailable, limit event not recorded"),
        }

        if fresh.is_some() {
            self.machine.on_usage(fresh, now);
        }
        self.machine.on_limit(reset_at);
        self.resets.arm(logged_at);
    }

    /// Record "tokens ran out" now with the current window total
    pub fn record_manual(&mut self, now: DateTime<Utc>) -> Result<LimitEvent> {
        let usage = read_usage_snapshot(&self.config.paths.status_file)
            .context("Usage summary unavailable")?;

        let event = LimitEvent::new(now, usage.window.total, None);
        self.store.append(event.clone())?;
        self.sync_calibration();
        self.machine.on_usage(Some(usage), now);
        self.hook.notify();

        info!(tokens = event.tokens_at_limit, "Recorded manual limit event");
        Ok(event)
    }

    /// Remove the newest event and re-derive the countdown from what remains.
    /// Returns whether an event was removed.
    pub fn undo(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if !self.store.remove_last()? {
            return Ok(false);
        }

        self.sync_calibration();
        self.resync_countdown(now);
        self.machine.on_usage(read_usage(&self.config.paths.status_file), now);
        Ok(true)
    }

    /// Regular poll: re-read the usage summary and pick up history changes
    /// made by other processes (a CLI `record` or `undo`)
    pub fn poll_usage(&mut self, now: DateTime<Utc>) {
        let previous_last = self.store.last_event().cloned();
        let previous_count = self.store.event_count();
        self.store.reload();
        self.sync_calibration();

        let last = self.store.last_event();
        if last != previous_last.as_ref() {
            let pending = last.is_some_and(|e| e.pending_reset(now).is_some());
            let removed = self.store.event_count() < previous_count;
            // Appended manual events leave the current phase alone
            if pending || (removed && self.machine.remaining(now).is_some()) {
                info!(events = self.store.event_count(), "Limit history changed externally");
                self.resync_countdown(now);
            }
        }

        self.machine.on_usage(read_usage(&self.config.paths.status_file), now);
    }

    pub fn countdown_tick(&mut self, now: DateTime<Utc>) {
        if self.machine.on_tick(now) {
            info!("Reset time reached, tokens refilled");
            self.resets.disarm();
            self.refill_generation += 1;
        }
    }

    pub fn animation_tick(&mut self, now: DateTime<Utc>) {
        if self.machine.on_animation_tick(now) {
            debug!("Refill animation complete");
        }
    }

    /// Re-derive the countdown and the reset detector from the newest event
    fn resync_countdown(&mut self, now: DateTime<Utc>) {
        let last = self.store.last_event();
        self.machine.reevaluate(last, now);
        match last.filter(|e| e.pending_reset(now).is_some()) {
            Some(event) => self.resets.arm(event.timestamp),
            None => self.resets.disarm(),
        }
    }

    fn sync_calibration(&mut self) {
        self.machine
            .set_calibration(self.store.event_count(), self.store.estimated_limit());
    }

    fn publish(&self, now: DateTime<Utc>) {
        let next = self.display(now);
        self.display_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

fn read_usage(path: &Path) -> Option<UsageSnapshot> {
    match read_usage_snapshot(path) {
        Ok(usage) => Some(usage),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Usage summary unreadable");
            None
        }
    }
}

async fn next_frame(animation: &mut Option<Interval>) {
    match animation {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
