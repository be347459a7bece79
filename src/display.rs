//! Display data
//!
//! [`DisplayState`] is everything a status indicator needs to render: the
//! current phase, a compact title, the bar fill, the two dropdown lines and
//! the recent limit history. Rendering itself belongs to the presentation
//! layer; this module only produces the values.

use crate::live::state_machine::{Phase, StateMachine};
use crate::models::LimitEvent;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Number of history rows exposed to the presentation layer
pub const HISTORY_ROWS: usize = 4;

const UNKNOWN_TITLE: &str = "—";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub timestamp: DateTime<Utc>,
    pub tokens_at_limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_timestamp: Option<DateTime<Utc>>,
}

impl From<&LimitEvent> for HistoryRow {
    fn from(event: &LimitEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            tokens_at_limit: event.tokens_at_limit,
            reset_timestamp: event.reset_timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState {
    #[serde(flatten)]
    pub phase: Phase,
    /// Usage summary unreadable while idle; the indicator shows a placeholder
    pub unknown: bool,
    pub title: String,
    /// Bar fill in `[0, 1]`, absent while calibrating
    pub fraction_remaining: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_until_reset: Option<i64>,
    pub session_line: String,
    pub usage_line: String,
    pub history: Vec<HistoryRow>,
}

impl DisplayState {
    pub fn build(machine: &StateMachine, events: &[LimitEvent], now: DateTime<Utc>) -> Self {
        let phase = machine.phase();
        let usage = machine.usage();
        let limit = machine.estimated_limit();
        let unknown = machine.is_idle() && (machine.usage_unavailable() || usage.is_none());

        let fraction = match phase {
            Phase::Calibrating => None,
            Phase::CountingDown { .. } => Some(0.0),
            Phase::Refilling { progress } => Some(progress.clamp(0.0, 1.0)),
            Phase::Ready => Some(1.0),
            Phase::Calibrated { window_total, limit } => Some(fraction_remaining(window_total, limit)),
        };

        let remaining = machine.remaining(now);

        let title = if unknown {
            UNKNOWN_TITLE.to_string()
        } else {
            match (phase, remaining, fraction) {
                (Phase::CountingDown { .. }, Some(left), _) => format_countdown(left),
                (Phase::Calibrating, _, _) => usage
                    .map(|u| format_tokens(u.session.total))
                    .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                (_, _, Some(f)) => format!("{:.0}%", f * 100.0),
                _ => UNKNOWN_TITLE.to_string(),
            }
        };

        let (session_line, usage_line) = match (usage, limit) {
            (Some(u), Some(limit)) if limit > 0 => (
                format!("This session: {}%", u.session.total * 100 / limit),
                format!(
                    "Used {} of {} tokens",
                    format_tokens(u.window.total),
                    format_tokens(limit)
                ),
            ),
            (Some(u), _) => (
                format!("This session: {} tokens", format_tokens(u.session.total)),
                "Record a limit event to calibrate".to_string(),
            ),
            (None, _) => (
                format!("This session: {}", UNKNOWN_TITLE),
                "Usage summary unavailable".to_string(),
            ),
        };

        let skip = events.len().saturating_sub(HISTORY_ROWS);
        let history = events.iter().skip(skip).map(HistoryRow::from).collect();

        Self {
            phase,
            unknown,
            title,
            fraction_remaining: fraction,
            seconds_until_reset: remaining.map(|d| d.num_seconds()),
            session_line,
            usage_line,
            history,
        }
    }
}

/// Share of the estimated limit still available, clamped to `[0, 1]`
pub fn fraction_remaining(window_total: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    (1.0 - window_total as f64 / limit as f64).clamp(0.0, 1.0)
}

/// `1.25M`, `12.3K`, or the plain count
pub fn format_tokens(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1e6)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1e3)
    } else {
        n.to_string()
    }
}

/// `4h 30m`, `12m 05s`, or `42s`
pub fn format_countdown(left: Duration) -> String {
    let secs = left.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m", h, m)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::state_machine::Timing;
    use crate::models::{TokenCounts, UsageSnapshot};
    use chrono::TimeZone;

    fn snapshot(session: u64, window: u64) -> UsageSnapshot {
        UsageSnapshot {
            session: TokenCounts {
                total: session,
                ..TokenCounts::default()
            },
            window: TokenCounts {
                total: window,
                ..TokenCounts::default()
            },
            ..UsageSnapshot::default()
        }
    }

    #[test]
    fn test_format_tokens() {
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(12_345), "12.3K");
        assert_eq!(format_tokens(1_250_000), "1.25M");
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(Duration::minutes(270)), "4h 30m");
        assert_eq!(format_countdown(Duration::seconds(725)), "12m 05s");
        assert_eq!(format_countdown(Duration::seconds(42)), "42s");
        assert_eq!(format_countdown(Duration::seconds(-3)), "0s");
    }

    #[test]
    fn test_over_limit_clamps_to_zero() {
        assert_eq!(fraction_remaining(50_000, 48_000), 0.0);
        assert_eq!(fraction_remaining(12_000, 48_000), 0.75);
        assert_eq!(fraction_remaining(10, 0), 0.0);
    }

    #[test]
    fn test_calibrated_display() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let events = vec![LimitEvent::new(now, 48_000, None)];
        let mut machine = StateMachine::new(Timing::default());
        machine.set_calibration(1, Some(48_000));
        machine.on_usage(Some(snapshot(24_000, 50_000)), now);

        let state = DisplayState::build(&machine, &events, now);
        assert_eq!(
            state.phase,
            Phase::Calibrated {
                window_total: 50_000,
                limit: 48_000
            }
        );
        assert_eq!(state.fraction_remaining, Some(0.0));
        assert_eq!(state.session_line, "This session: 50%");
        assert_eq!(state.usage_line, "Used 50.0K of 48.0K tokens");
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_unknown_when_usage_unreadable() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let mut machine = StateMachine::new(Timing::default());
        machine.on_usage(None, now);

        let state = DisplayState::build(&machine, &[], now);
        assert!(state.unknown);
        assert_eq!(state.title, "—");
    }

    #[test]
    fn test_countdown_title_ignores_usage_failure() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let mut machine = StateMachine::new(Timing::default());
        machine.on_limit(now + Duration::minutes(90));
        machine.on_usage(None, now);

        let state = DisplayState::build(&machine, &[], now);
        assert!(!state.unknown);
        assert_eq!(state.title, "1h 30m");
        assert_eq!(state.seconds_until_reset, Some(5400));
    }

    #[test]
    fn test_history_keeps_last_rows() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let events: Vec<LimitEvent> = (0..6).map(|i| LimitEvent::new(now, i, None)).collect();
        let machine = StateMachine::new(Timing::default());

        let state = DisplayState::build(&machine, &events, now);
        let tokens: Vec<u64> = state.history.iter().map(|r| r.tokens_at_limit).collect();
        assert_eq!(tokens, vec![2, 3, 4, 5]);
    }
}
