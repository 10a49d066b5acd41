//! Date, time and timestamp literals.
//!
//! Literals are parsed by hand rather than through format strings so that the
//! single-digit month and day forms (`2024-1-5`) are accepted the same way as
//! padded ones. Epoch milliseconds are interpreted as UTC.

use crate::decimal::Decimal;
use crate::error::{TypeError, TypeResult};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Highest fractional-second precision a timestamp may declare.
pub const MAX_TIMESTAMP_PRECISION: u8 = 9;

/// Fractional-second precision used when none is declared.
pub const DEFAULT_TIMESTAMP_PRECISION: u8 = 6;

fn numeric_part(part: &str, max_len: usize, kind: &'static str, literal: &str) -> TypeResult<u32> {
    if part.is_empty() || part.len() > max_len || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TypeError::format(kind, format!("'{literal}'")));
    }
    part.parse()
        .map_err(|_| TypeError::format(kind, format!("'{literal}'")))
}

/// Parses `yyyy-[m]m-[d]d`.
pub fn parse_date(literal: &str) -> TypeResult<NaiveDate> {
    let text = literal.trim();
    let parts: Vec<&str> = text.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return Err(TypeError::format("date", format!("'{literal}', expected yyyy-mm-dd")));
    };
    if year.len() != 4 {
        return Err(TypeError::format("date", format!("'{literal}', expected yyyy-mm-dd")));
    }
    let year = numeric_part(year, 4, "date", literal)?;
    let month = numeric_part(month, 2, "date", literal)?;
    let day = numeric_part(day, 2, "date", literal)?;
    NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| TypeError::format("date", format!("'{literal}' is not a calendar date")))
}

/// Parses `hh:mm:ss`.
pub fn parse_time(literal: &str) -> TypeResult<NaiveTime> {
    let text = literal.trim();
    let parts: Vec<&str> = text.split(':').collect();
    let [hour, minute, second] = parts.as_slice() else {
        return Err(TypeError::format("time", format!("'{literal}', expected hh:mm:ss")));
    };
    let hour = numeric_part(hour, 2, "time", literal)?;
    let minute = numeric_part(minute, 2, "time", literal)?;
    let second = numeric_part(second, 2, "time", literal)?;
    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| TypeError::format("time", format!("'{literal}' is out of range")))
}

/// Parses `yyyy-[m]m-[d]d hh:mm:ss[.fffffffff]`, with a space or `T` separator.
pub fn parse_timestamp(literal: &str) -> TypeResult<NaiveDateTime> {
    let text = literal.trim();
    let invalid = || {
        TypeError::format(
            "timestamp",
            format!("'{literal}', expected yyyy-mm-dd hh:mm:ss[.fffffffff]"),
        )
    };
    let (date_part, time_part) = text.split_once([' ', 'T']).ok_or_else(invalid)?;
    let date = parse_date(date_part).map_err(|_| invalid())?;
    let (clock, fraction) = match time_part.trim().split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (time_part.trim(), None),
    };
    let time = parse_time(clock).map_err(|_| invalid())?;
    let nanos = match fraction {
        Some(fraction) => {
            if fraction.is_empty()
                || fraction.len() > MAX_TIMESTAMP_PRECISION as usize
                || !fraction.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(invalid());
            }
            let padded = format!("{fraction:0<9}");
            padded.parse::<u32>().map_err(|_| invalid())?
        }
        None => 0,
    };
    let time = time.with_nanosecond(nanos).ok_or_else(invalid)?;
    Ok(NaiveDateTime::new(date, time))
}

/// Converts epoch milliseconds (UTC) to a date-time.
pub fn from_epoch_millis(millis: i64) -> TypeResult<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| TypeError::format("timestamp", format!("{millis} ms is out of range")))
}

/// Rounds nanoseconds HALF_UP to `precision` fractional digits.
///
/// A result that would spill into the next second degrades to zero.
#[must_use]
pub fn round_nanos(nanos: u32, precision: u8) -> u32 {
    let precision = precision.min(MAX_TIMESTAMP_PRECISION);
    let scale = i32::from(precision) - i32::from(MAX_TIMESTAMP_PRECISION);
    match Decimal::from_i64(i64::from(nanos)).fit(9, Some(scale)) {
        Ok(rounded) => rounded.to_plain_string().parse().unwrap_or(0),
        Err(e) => {
            tracing::warn!(nanos, precision, error = %e, "fractional seconds overflow, using zero");
            0
        }
    }
}

/// Applies [`round_nanos`] to a date-time.
#[must_use]
pub fn round_timestamp(value: NaiveDateTime, precision: u8) -> NaiveDateTime {
    let nanos = round_nanos(value.nanosecond() % 1_000_000_000, precision);
    value.with_nanosecond(nanos).unwrap_or(value)
}

/// Formats as `yyyy-mm-dd`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Formats as `hh:mm:ss`.
#[must_use]
pub fn format_time(time: NaiveTime) -> String {
    format!("{:02}:{:02}:{:02}", time.hour(), time.minute(), time.second())
}

/// Formats as `yyyy-mm-dd hh:mm:ss` followed by exactly `precision` fraction digits.
#[must_use]
pub fn format_timestamp(value: NaiveDateTime, precision: u8) -> String {
    let mut out = format!("{} {}", format_date(value.date()), format_time(value.time()));
    let precision = usize::from(precision.min(MAX_TIMESTAMP_PRECISION));
    if precision > 0 {
        let nanos = format!("{:09}", value.nanosecond() % 1_000_000_000);
        out.push('.');
        out.push_str(&nanos[..precision]);
    }
    out
}
