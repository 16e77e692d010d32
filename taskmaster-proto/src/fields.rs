//! Lenient field codecs for values produced by the TaskMaster backend.
//!
//! The backend stores list fields as JSONB and timestamps as naive
//! `datetime` values, so responses are not always strictly typed. These
//! helpers normalize what arrives on the wire into the client's types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Upper bound of a task's completion percentage.
pub const MAX_COMPLETION: u8 = 100;

/// Error returned when a timestamp string cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized timestamp: {0:?}")]
pub struct TimestampError(pub String);

/// Clamps an arbitrary integer into the `[0, 100]` completion range.
#[must_use]
pub fn clamp_completion(value: i64) -> u8 {
    u8::try_from(value.clamp(0, i64::from(MAX_COMPLETION))).unwrap_or(MAX_COMPLETION)
}

/// Parses a timestamp in any of the shapes the backend emits.
///
/// Accepted, in order: RFC 3339 with offset, naive ISO date-time
/// (interpreted as UTC), and a bare `YYYY-MM-DD` date (midnight UTC).
///
/// # Errors
///
/// Returns [`TimestampError`] if none of the formats match.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimestampError(raw.to_string()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(i64),
    Float(f64),
}

/// Deserializes a completion percentage, clamping it into `[0, 100]`.
///
/// `null` and fractional values are accepted; fractions are rounded.
///
/// # Errors
///
/// Fails only if the value is neither a number nor `null`.
#[allow(clippy::cast_possible_truncation)]
pub fn completion<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawNumber>::deserialize(deserializer)?;
    Ok(match raw {
        None => 0,
        Some(RawNumber::Int(n)) => clamp_completion(n),
        Some(RawNumber::Float(f)) if f.is_nan() => 0,
        // Saturating float-to-int cast; the clamp does the rest.
        Some(RawNumber::Float(f)) => clamp_completion(f.round() as i64),
    })
}

/// Deserializes a list that may arrive as `null`.
///
/// # Errors
///
/// Fails if the value is present but not a list of `T`.
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serde codec for required timestamps.
pub mod timestamp {
    use super::{DateTime, Deserialize, Deserializer, SecondsFormat, Serializer, Utc};

    /// Serializes as RFC 3339 with millisecond precision.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Deserializes any shape accepted by [`super::parse_timestamp`].
    ///
    /// # Errors
    ///
    /// Fails if the value is not a string or not a recognized timestamp.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }

    /// Serde codec for optional timestamps.
    pub mod option {
        use super::{DateTime, Deserialize, Deserializer, Serializer, Utc};

        /// Serializes `Some` as RFC 3339 and `None` as `null`.
        ///
        /// # Errors
        ///
        /// Propagates serializer errors.
        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(dt) => super::serialize(dt, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Deserializes `null`, an empty string, or a recognized timestamp.
        ///
        /// # Errors
        ///
        /// Fails if a non-empty string is not a recognized timestamp.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => crate::fields::parse_timestamp(&raw)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}
