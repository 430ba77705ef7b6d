//! Canonical timestamp handling
//!
//! Every timestamp evlog writes uses one fixed shape,
//! `YYYY-MM-DDTHH:MM:SS.mmmZ`, so that string comparison in SQLite and in
//! the file scanner agrees with chronological order.

use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

const CANONICAL: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

const MONTH: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]");

const DAY: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const NAIVE_SPACE: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const NAIVE_SPACE_FRACTION: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");

const NAIVE_T: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

const NAIVE_T_FRACTION: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

/// Current UTC time truncated to millisecond precision.
pub fn now() -> OffsetDateTime {
    truncate_millis(OffsetDateTime::now_utc())
}

/// Drop sub-millisecond precision so a formatted timestamp parses back
/// to an identical value.
pub fn truncate_millis(ts: OffsetDateTime) -> OffsetDateTime {
    let nanos = ts.nanosecond();
    ts.replace_nanosecond(nanos - nanos % 1_000_000).unwrap_or(ts)
}

/// Format in the canonical `YYYY-MM-DDTHH:MM:SS.mmmZ` shape.
pub fn format(ts: OffsetDateTime) -> String {
    let utc = ts.to_offset(UtcOffset::UTC);
    utc.format(CANONICAL)
        .or_else(|_| utc.format(&Rfc3339))
        .unwrap_or_default()
}

/// `YYYY-MM` bucket key for a timestamp.
pub fn month_key(ts: OffsetDateTime) -> String {
    ts.to_offset(UtcOffset::UTC).format(MONTH).unwrap_or_default()
}

/// `YYYY-MM-DD` key for a timestamp.
pub fn date_key(ts: OffsetDateTime) -> String {
    ts.to_offset(UtcOffset::UTC).format(DAY).unwrap_or_default()
}

/// Parse a timestamp leniently.
///
/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS[.fff]` (with a space or a
/// `T`, read as UTC) and bare dates (midnight UTC). Returns `None` for
/// anything else.
pub fn parse(input: &str) -> Option<OffsetDateTime> {
    let input = input.trim();

    if let Ok(ts) = OffsetDateTime::parse(input, &Rfc3339) {
        return Some(ts.to_offset(UtcOffset::UTC));
    }

    for naive in [NAIVE_SPACE, NAIVE_SPACE_FRACTION, NAIVE_T, NAIVE_T_FRACTION] {
        if let Ok(ts) = PrimitiveDateTime::parse(input, naive) {
            return Some(ts.assume_utc());
        }
    }

    Date::parse(input, DAY)
        .ok()
        .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
}

/// Serde adapter writing the canonical shape and reading anything
/// [`parse`] accepts.
pub mod serde_ts {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}
