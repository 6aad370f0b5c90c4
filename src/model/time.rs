//! Backend timestamps.
//!
//! The backend serializes `LocalDateTime` values as ISO-8601 strings, with or
//! without fractional seconds, and occasionally as a numeric array when a
//! service runs without the JSR-310 string module. Both decode to
//! [`NaiveDateTime`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire {
    Text(String),
    Parts(Vec<u32>),
}

/// Parses the string forms the backend emits.
#[must_use]
pub fn parse(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = value.parse::<NaiveDateTime>() {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    value
        .parse::<NaiveDate>()
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

fn from_parts(parts: &[u32]) -> Option<NaiveDateTime> {
    let year = i32::try_from(*parts.first()?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, *parts.get(1)?, *parts.get(2)?)?;
    let hour = parts.get(3).copied().unwrap_or(0);
    let minute = parts.get(4).copied().unwrap_or(0);
    let second = parts.get(5).copied().unwrap_or(0);
    let nanos = parts.get(6).copied().unwrap_or(0);
    date.and_hms_nano_opt(hour, minute, second, nanos)
}

/// Deserializes an optional timestamp.
///
/// # Errors
///
/// Fails when a value is present but is not a recognisable timestamp.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Wire>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Wire::Text(text)) if text.is_empty() => Ok(None),
        Some(Wire::Text(text)) => parse(&text)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{text}'"))),
        Some(Wire::Parts(parts)) => from_parts(&parts)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp {parts:?}"))),
    }
}

/// Serializes an optional timestamp as an ISO-8601 string.
///
/// # Errors
///
/// Propagates serializer errors.
#[allow(clippy::ref_option)]
pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    value
        .as_ref()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .serialize(serializer)
}

/// Formats an optional timestamp for tables.
#[must_use]
pub fn display(value: Option<&NaiveDateTime>) -> String {
    value.map_or_else(String::new, |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}
