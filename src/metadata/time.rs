//! Acquisition timestamp layouts of the supported dialects.
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use super::MetadataError;

fn slice_num<T: std::str::FromStr>(raw: &str, range: std::ops::Range<usize>) -> Result<T, MetadataError> {
    raw.get(range)
        .and_then(|s| s.parse::<T>().ok())
        .ok_or_else(|| MetadataError::Timestamp(raw.to_string()))
}

fn ymd_hms(
    raw: &str,
    (y, mo, d): (i32, u32, u32),
    (h, mi, s): (u32, u32, u32),
    nanos: u32,
) -> Result<NaiveDateTime, MetadataError> {
    NaiveDate::from_ymd_opt(y, mo, d)
        .and_then(|date| date.and_hms_nano_opt(h, mi, s, nanos))
        .ok_or_else(|| MetadataError::Timestamp(raw.to_string()))
}

/// CEOS scene-centre time: `YYYYMMDDhhmmssttt` (milliseconds), trailing
/// characters ignored.
pub fn parse_compact(raw: &str) -> Result<NaiveDateTime, MetadataError> {
    let raw = raw.trim();
    let date = (slice_num(raw, 0..4)?, slice_num(raw, 4..6)?, slice_num(raw, 6..8)?);
    let time = (
        slice_num(raw, 8..10)?,
        slice_num(raw, 10..12)?,
        slice_num(raw, 12..14)?,
    );
    let millis: u32 = slice_num(raw, 14..17)?;
    ymd_hms(raw, date, time, millis * 1_000_000)
}

/// ISO-like `YYYY-MM-DDThh:mm:ss[.f...][Z]`, read by fixed slices. Up to nine
/// fractional digits are kept.
pub fn parse_iso(raw: &str) -> Result<NaiveDateTime, MetadataError> {
    let raw = raw.trim();
    let bad = || MetadataError::Timestamp(raw.to_string());
    if raw.len() < 19 || !raw.is_char_boundary(19) {
        return Err(bad());
    }
    let date = (slice_num(raw, 0..4)?, slice_num(raw, 5..7)?, slice_num(raw, 8..10)?);
    let time = (
        slice_num(raw, 11..13)?,
        slice_num(raw, 14..16)?,
        slice_num(raw, 17..19)?,
    );
    let rest = raw[19..].trim_end_matches('Z');
    let nanos = match rest.strip_prefix('.') {
        None if rest.is_empty() => 0,
        None => return Err(bad()),
        Some(frac) => {
            if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(bad());
            }
            let digits: String = frac.chars().take(9).collect();
            let scale = 10u32.pow(9 - digits.len() as u32);
            digits.parse::<u32>().map_err(|_| bad())? * scale
        }
    };
    ymd_hms(raw, date, time, nanos)
}

/// Calendar time from a year and a 1-based fractional day of year
/// (`1.5` is noon on January 1st).
pub fn from_year_day(year: i32, day_of_year: f64) -> Result<NaiveDateTime, MetadataError> {
    let bad = || MetadataError::Timestamp(format!("{year} day {day_of_year}"));
    if !day_of_year.is_finite() || day_of_year < 1.0 {
        return Err(bad());
    }
    let epoch = NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(bad)?;
    let micros = ((day_of_year - 1.0) * 86_400e6).round() as i64;
    let stamp = epoch + Duration::microseconds(micros);
    if stamp.year() != year {
        return Err(bad());
    }
    Ok(stamp)
}

pub fn day_of_year(stamp: &NaiveDateTime) -> u32 {
    stamp.ordinal()
}
