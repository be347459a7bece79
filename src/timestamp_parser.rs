use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Returned when a timestamp matches none of the accepted formats
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to parse timestamp: {0}")]
pub struct TimestampError(pub String);

/// Handles parsing timestamps from the formats found in transcripts and state files
pub struct TimestampParser;

impl TimestampParser {
    /// Parse a timestamp string into a DateTime<Utc>
    ///
    /// Formats are tried in order: RFC 3339 (with or without fractional
    /// seconds), then a naive `YYYY-MM-DDTHH:MM:SS.ffffff` assumed to be UTC.
    pub fn parse(timestamp_str: &str) -> Result<DateTime<Utc>, TimestampError> {
        let timestamp = timestamp_str.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.6f") {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }

        Err(TimestampError(timestamp_str.to_string()))
    }

    /// Format an instant the way state files store it
    pub fn format(instant: &DateTime<Utc>) -> String {
        instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

/// Serde adapter for instants persisted in state files
pub mod serde_instant {
    use super::TimestampParser;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(instant: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&TimestampParser::format(instant))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        TimestampParser::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional instants; `None` is omitted by the caller
pub mod serde_instant_opt {
    use super::TimestampParser;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        instant: &Option<DateTime<Utc>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match instant {
            Some(instant) => s.serialize_str(&TimestampParser::format(instant)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|s| TimestampParser::parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
