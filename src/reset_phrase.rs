//! Reset phrase parsing
//!
//! Rate-limit messages tell the user when the quota comes back, in one of two
//! shapes:
//!
//! - relative: `"... resets in 4h 30m"`
//! - absolute clock: `"... resets 10pm (Australia/Melbourne)"`
//!
//! Each shape is an independent grammar. [`parse_reset_phrase`] tries them in
//! that order and returns `None` when neither yields an instant; callers pick
//! their own fallback.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)resets\s+in\b\s*(?:(\d+)\s*h)?\s*(?:(\d+)\s*m)?").expect("valid regex")
});

static CLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)resets\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)(?:\s*\(([^)]+)\))?")
        .expect("valid regex")
});

/// `resets in <N>h <M>m`, either component optional but not both
pub struct RelativeGrammar;

impl RelativeGrammar {
    pub fn parse(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let caps = RELATIVE_RE.captures(text)?;
        let hours = caps.get(1).and_then(|m| m.as_str().parse::<i64>().ok());
        let minutes = caps.get(2).and_then(|m| m.as_str().parse::<i64>().ok());

        if hours.is_none() && minutes.is_none() {
            return None;
        }

        // Counts come from log text; anything out of range yields no instant
        let seconds = hours
            .unwrap_or(0)
            .checked_mul(3600)?
            .checked_add(minutes.unwrap_or(0).checked_mul(60)?)?;
        now.checked_add_signed(Duration::try_seconds(seconds)?)
    }
}

/// `resets <H>[:<MM>]<am|pm> [(<IANA zone>)]`
pub struct ClockGrammar;

impl ClockGrammar {
    pub fn parse(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let caps = CLOCK_RE.captures(text)?;
        let hour12: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        if !(1..=12).contains(&hour12) {
            return None;
        }

        let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("pm");
        let hour = to_24_hour(hour12, pm);
        let time = NaiveTime::from_hms_opt(hour, minute, 0)?;

        match caps.get(4).map(|m| m.as_str().trim()) {
            Some(zone) => match zone.parse::<Tz>() {
                Ok(tz) => next_occurrence(&tz, time, now),
                Err(_) => {
                    debug!(zone, "Unknown timezone in reset phrase, using local time");
                    next_occurrence(&Local, time, now)
                }
            },
            None => next_occurrence(&Local, time, now),
        }
    }
}

/// Resolve a reset phrase to an absolute instant
pub fn parse_reset_phrase(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    RelativeGrammar::parse(text, now).or_else(|| ClockGrammar::parse(text, now))
}

fn to_24_hour(hour12: u32, pm: bool) -> u32 {
    match (hour12, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    }
}

/// Today's `time` in `tz`, or tomorrow's if today's has already passed
fn next_occurrence<Z: TimeZone>(tz: &Z, time: NaiveTime, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(tz).date_naive();
    let candidate = tz
        .from_local_datetime(&today.and_time(time))
        .earliest()?
        .with_timezone(&Utc);

    if candidate > now {
        return Some(candidate);
    }

    let tomorrow = today.succ_opt()?;
    tz.from_local_datetime(&tomorrow.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
