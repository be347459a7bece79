//! Display phase state machine
//!
//! ```text
//!   Calibrating ──limit──▶ CountingDown ──recovery / reset_at passed──▶ Refilling
//!        ▲                     ▲  ▲ tick                                   │ animation done
//!        │                     │  └──────────                              ▼
//!   Calibrated ◀──usage poll───┼─────────────────────────────────────── Ready (dwell)
//!                              └── limit (from any phase)
//! ```
//!
//! The machine is pure: every input carries the current instant, and timers
//! live in the orchestrator. Idle phases (`Calibrating` / `Calibrated`) are
//! derived from the latest usage snapshot and the history's estimate.

use crate::config::LiveConfig;
use crate::models::{LimitEvent, UsageSnapshot};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Calibrating,
    CountingDown { reset_at: DateTime<Utc> },
    Refilling { progress: f64 },
    Ready,
    Calibrated { window_total: u64, limit: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub refill_duration: Duration,
    pub ready_dwell: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self::from(&LiveConfig::default())
    }
}

impl From<&LiveConfig> for Timing {
    fn from(config: &LiveConfig) -> Self {
        Self {
            refill_duration: Duration::milliseconds(config.refill_duration_ms as i64),
            ready_dwell: Duration::milliseconds(config.ready_dwell_ms as i64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Idle,
    CountingDown { reset_at: DateTime<Utc> },
    Refilling { started_at: DateTime<Utc>, progress: f64 },
    Ready { since: DateTime<Utc> },
}

#[derive(Debug)]
pub struct StateMachine {
    timing: Timing,
    mode: Mode,
    usage: Option<UsageSnapshot>,
    usage_unavailable: bool,
    event_count: usize,
    estimated_limit: Option<u64>,
}

impl StateMachine {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            mode: Mode::Idle,
            usage: None,
            usage_unavailable: false,
            event_count: 0,
            estimated_limit: None,
        }
    }

    /// Start from persisted history; a pending reset resumes the countdown
    pub fn resume(timing: Timing, last_event: Option<&LimitEvent>, now: DateTime<Utc>) -> Self {
        let mut machine = Self::new(timing);
        machine.reevaluate(last_event, now);
        machine
    }

    pub fn phase(&self) -> Phase {
        match self.mode {
            Mode::CountingDown { reset_at } => Phase::CountingDown { reset_at },
            Mode::Refilling { progress, .. } => Phase::Refilling { progress },
            Mode::Ready { .. } => Phase::Ready,
            Mode::Idle => match (self.calibrated_limit(), &self.usage) {
                (Some(limit), Some(usage)) => Phase::Calibrated {
                    window_total: usage.window.total,
                    limit,
                },
                _ => Phase::Calibrating,
            },
        }
    }

    pub fn usage(&self) -> Option<&UsageSnapshot> {
        self.usage.as_ref()
    }

    /// True when the last poll of the usage summary failed
    pub fn usage_unavailable(&self) -> bool {
        self.usage_unavailable
    }

    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Idle
    }

    pub fn is_refilling(&self) -> bool {
        matches!(self.mode, Mode::Refilling { .. })
    }

    pub fn estimated_limit(&self) -> Option<u64> {
        self.calibrated_limit()
    }

    /// Time left on the countdown, if one is running
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.mode {
            Mode::CountingDown { reset_at } => Some((reset_at - now).max(Duration::zero())),
            _ => None,
        }
    }

    /// Track the history's size and estimate
    pub fn set_calibration(&mut self, event_count: usize, estimated_limit: Option<u64>) {
        self.event_count = event_count;
        self.estimated_limit = estimated_limit;
    }

    /// A new rate limit supersedes whatever is showing
    pub fn on_limit(&mut self, reset_at: DateTime<Utc>) {
        self.mode = Mode::CountingDown { reset_at };
    }

    /// Confirmed recovery. Returns true if a refill started.
    pub fn on_recovery(&mut self, now: DateTime<Utc>) -> bool {
        match self.mode {
            Mode::CountingDown { .. } => {
                self.start_refill(now);
                true
            }
            _ => false,
        }
    }

    /// Periodic countdown tick. Returns true if the countdown ran out and a
    /// refill started.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> bool {
        match self.mode {
            Mode::CountingDown { reset_at } if now >= reset_at => {
                self.start_refill(now);
                true
            }
            _ => false,
        }
    }

    /// Advance the refill animation. Returns true once it has completed.
    pub fn on_animation_tick(&mut self, now: DateTime<Utc>) -> bool {
        let Mode::Refilling { started_at, .. } = self.mode else {
            return false;
        };

        let elapsed = now - started_at;
        if elapsed >= self.timing.refill_duration {
            self.mode = Mode::Ready { since: now };
            return true;
        }

        self.mode = Mode::Refilling {
            started_at,
            progress: refill_progress(elapsed, self.timing.refill_duration),
        };
        false
    }

    /// Regular usage poll; `None` means the summary could not be read
    pub fn on_usage(&mut self, usage: Option<UsageSnapshot>, now: DateTime<Utc>) {
        match usage {
            Some(usage) => {
                self.usage = Some(usage);
                self.usage_unavailable = false;
            }
            None => self.usage_unavailable = true,
        }

        if let Mode::Ready { since } = self.mode {
            if now - since >= self.timing.ready_dwell {
                self.mode = Mode::Idle;
            }
        }
    }

    /// Recompute the mode from the history's newest event, as after an undo
    pub fn reevaluate(&mut self, last_event: Option<&LimitEvent>, now: DateTime<Utc>) {
        self.mode = match last_event.and_then(|e| e.pending_reset(now)) {
            Some(reset_at) => Mode::CountingDown { reset_at },
            None => Mode::Idle,
        };
    }

    fn start_refill(&mut self, now: DateTime<Utc>) {
        self.mode = Mode::Refilling {
            started_at: now,
            progress: 0.0,
        };
    }

    fn calibrated_limit(&self) -> Option<u64> {
        if self.event_count >= 1 {
            self.estimated_limit
        } else {
            None
        }
    }
}

/// `1 − (1 − t)³`, clamped to `[0, 1]`
pub fn ease_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

pub fn refill_progress(elapsed: Duration, duration: Duration) -> f64 {
    let total = duration.num_milliseconds();
    if total <= 0 {
        return 1.0;
    }
    ease_out_cubic(elapsed.num_milliseconds() as f64 / total as f64)
}
