//! Date, calendar and zoned timestamp types plus the canonical ISO-8601 codec.
//!
//! All three types wrap an [`OffsetDateTime`]; they stay distinct so callers
//! can request one representation or another. [`Date`] is an instant and is
//! always normalized to UTC. [`Calendar`] and [`ZonedDateTime`] keep the offset
//! they were created with.
//!
//! The text form is `±YYYY-MM-DDThh:mm:ss.SSSTZD` where `TZD` is `Z` for UTC
//! or `±hh:mm` otherwise. Parsing requires exactly that shape, so formatting a
//! value and parsing the result yields the same instant and offset (at
//! millisecond precision).

use std::fmt;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::types::ConversionError;

const LOCAL_PART: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");

const NANOS_PER_MILLI: i128 = 1_000_000;

/// An instant on the UTC timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Date(OffsetDateTime);

/// A timestamp with a fixed UTC offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Calendar(OffsetDateTime);

/// A timestamp carrying its zone as a normalized fixed offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZonedDateTime(OffsetDateTime);

fn from_millis(millis: i64) -> Result<OffsetDateTime, ConversionError> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * NANOS_PER_MILLI)
        .map_err(|err| ConversionError::OutOfRange(format!("{millis} ms: {err}")))
}

fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos().div_euclid(NANOS_PER_MILLI)) as i64
}

impl Date {
    /// Creates a date from any timestamp, discarding its offset.
    pub fn new(at: OffsetDateTime) -> Self {
        Date(at.to_offset(UtcOffset::UTC))
    }

    /// Creates a date from milliseconds since the Unix epoch.
    pub fn from_unix_millis(millis: i64) -> Result<Self, ConversionError> {
        from_millis(millis).map(Date)
    }

    /// The current instant.
    pub fn now() -> Self {
        Date(OffsetDateTime::now_utc())
    }

    /// Milliseconds since the Unix epoch.
    pub fn unix_millis(&self) -> i64 {
        to_millis(self.0)
    }

    /// The instant as a UTC timestamp.
    pub fn offset_date_time(&self) -> OffsetDateTime {
        self.0
    }
}

impl Calendar {
    /// Wraps a timestamp, keeping its offset.
    pub fn new(at: OffsetDateTime) -> Self {
        Calendar(at)
    }

    /// Creates a UTC calendar from milliseconds since the Unix epoch.
    pub fn from_unix_millis(millis: i64) -> Result<Self, ConversionError> {
        from_millis(millis).map(Calendar)
    }

    /// Milliseconds since the Unix epoch.
    pub fn unix_millis(&self) -> i64 {
        to_millis(self.0)
    }

    /// The wrapped timestamp.
    pub fn offset_date_time(&self) -> OffsetDateTime {
        self.0
    }
}

impl ZonedDateTime {
    /// Wraps a timestamp, keeping its offset.
    pub fn new(at: OffsetDateTime) -> Self {
        ZonedDateTime(at)
    }

    /// Milliseconds since the Unix epoch.
    pub fn unix_millis(&self) -> i64 {
        to_millis(self.0)
    }

    /// The wrapped timestamp.
    pub fn offset_date_time(&self) -> OffsetDateTime {
        self.0
    }
}

impl From<OffsetDateTime> for Calendar {
    fn from(value: OffsetDateTime) -> Self {
        Calendar(value)
    }
}

impl From<Calendar> for Date {
    fn from(value: Calendar) -> Self {
        Date::new(value.0)
    }
}

impl From<Calendar> for ZonedDateTime {
    fn from(value: Calendar) -> Self {
        ZonedDateTime(value.0)
    }
}

impl From<Date> for Calendar {
    fn from(value: Date) -> Self {
        Calendar(value.0)
    }
}

impl From<ZonedDateTime> for Calendar {
    fn from(value: ZonedDateTime) -> Self {
        Calendar(value.0)
    }
}

/// Renders a timestamp in the canonical ISO-8601 form.
pub fn format_iso8601(at: OffsetDateTime) -> Result<String, ConversionError> {
    let mut out = PrimitiveDateTime::new(at.date(), at.time())
        .format(LOCAL_PART)
        .map_err(|err| ConversionError::Format(err.to_string()))?;
    let offset = at.offset();
    if offset.is_utc() {
        out.push('Z');
    } else {
        let sign = if offset.is_negative() { '-' } else { '+' };
        out.push_str(&format!(
            "{sign}{:02}:{:02}",
            offset.whole_hours().unsigned_abs(),
            offset.minutes_past_hour().unsigned_abs()
        ));
    }
    Ok(out)
}

/// Parses the canonical ISO-8601 form produced by [`format_iso8601`].
pub fn parse_iso8601(text: &str) -> Result<OffsetDateTime, ConversionError> {
    let invalid = || ConversionError::parse(text, "timestamp");
    if !text.is_ascii() {
        return Err(invalid());
    }
    let (local, offset) = if let Some(local) = text.strip_suffix('Z') {
        (local, UtcOffset::UTC)
    } else {
        let split = text.len().checked_sub(6).ok_or_else(invalid)?;
        let (local, zone) = text.split_at(split);
        (local, parse_offset(zone).ok_or_else(invalid)?)
    };
    let local = PrimitiveDateTime::parse(local, LOCAL_PART).map_err(|_| invalid())?;
    Ok(local.assume_offset(offset))
}

fn parse_offset(zone: &str) -> Option<UtcOffset> {
    let bytes = zone.as_bytes();
    if bytes.len() != 6 || bytes[3] != b':' {
        return None;
    }
    let sign: i8 = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i8 = zone[1..3].parse().ok()?;
    let minutes: i8 = zone[4..6].parse().ok()?;
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_timestamp(self.0, f)
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_timestamp(self.0, f)
    }
}

impl fmt::Display for ZonedDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_timestamp(self.0, f)
    }
}

fn display_timestamp(at: OffsetDateTime, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match format_iso8601(at) {
        Ok(text) => f.write_str(&text),
        Err(_) => write!(f, "{at}"),
    }
}
