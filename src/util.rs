//! Small string and calendar helpers shared by the config and dbi modules.
//!
//! All epoch/calendar arithmetic here is in the local timezone, matching the
//! operator-facing formats used in config files and log output.

use std::sync::LazyLock;

use chrono::{Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono::{Datelike, Local, Timelike};
use regex::Regex;
use thiserror::Error;

/// Seconds in a day.
pub const DAY: i64 = 24 * 3600;

/// Seconds in a week.
pub const WEEK: i64 = 7 * DAY;

static MAGNITUDE_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(\w*)").expect("valid magnitude regex"));

/// A date/time string that matches none of the supported formats.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("date '{0}' does not match any supported format")]
pub struct DateParseError(pub String);

/// Split a string on commas, trimming whitespace around each piece. An empty
/// or all-whitespace input yields an empty list.
pub fn csv_list(value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    value.split(',').map(|x| x.trim().to_string()).collect()
}

/// Return the epoch of the beginning (local midnight) of the day containing
/// *epoch*.
pub fn daybase(epoch: i64) -> i64 {
    let day = match Local.timestamp_opt(epoch, 0) {
        LocalResult::Single(dt) => dt.date_naive(),
        LocalResult::Ambiguous(dt, _) => dt.date_naive(),
        LocalResult::None => return 0,
    };
    local_epoch(day.and_time(NaiveTime::MIN))
}

/// Return the epoch of local midnight *days* days from today. 0 is midnight
/// today, -1 is midnight yesterday, 1 is midnight tomorrow.
pub fn day_offset(days: i64) -> i64 {
    daybase(Local::now().timestamp()) + days * DAY
}

/// Local weekday index of *epoch*: 0 = Monday .. 6 = Sunday.
pub fn weekday(epoch: i64) -> u32 {
    match Local.timestamp_opt(epoch, 0) {
        LocalResult::Single(dt) => dt.weekday().num_days_from_monday(),
        LocalResult::Ambiguous(dt, _) => dt.weekday().num_days_from_monday(),
        LocalResult::None => 0,
    }
}

/// Convert a local wall-clock value to epoch seconds. Ambiguous instants
/// (clock rolled back) resolve to the earlier mapping; nonexistent instants
/// (clock jumped forward) resolve to the start of the gap's landing hour.
pub fn local_epoch(naive: NaiveDateTime) -> i64 {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.timestamp(),
        LocalResult::Ambiguous(first, _) => first.timestamp(),
        LocalResult::None => Local
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.timestamp())
            .unwrap_or(0),
    }
}

/// Parse a date and/or time string into local epoch seconds. Accepted
/// formats, tried in order:
///
///   YYYY.MMDD HH:MM:SS      YYYY.MMDD.HH.MM.SS
///   YYYY.MMDD HH:MM         YYYY.MMDD.HH.MM
///   YYYY.MMDD HH            YYYY.MMDD.HH
///   YYYY.MMDD
///
/// A string of digits is taken as an epoch value directly.
pub fn epoch(text: &str) -> Result<i64, DateParseError> {
    const DT_FMTS: [&str; 4] = [
        "%Y.%m%d %H:%M:%S",
        "%Y.%m%d.%H.%M.%S",
        "%Y.%m%d %H:%M",
        "%Y.%m%d.%H.%M",
    ];
    for fmt in DT_FMTS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(local_epoch(ndt));
        }
    }
    // hour-only variants: pad out the minutes and retry
    for (sep, fmt) in [(' ', "%Y.%m%d %H:%M"), ('.', "%Y.%m%d.%H.%M")] {
        let padded = format!("{}{}00", text, if sep == ' ' { ":" } else { "." });
        if let Some((date_part, _)) = text.rsplit_once(sep) {
            if NaiveDate::parse_from_str(date_part, "%Y.%m%d").is_ok() {
                if let Ok(ndt) = NaiveDateTime::parse_from_str(&padded, fmt) {
                    return Ok(local_epoch(ndt));
                }
            }
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y.%m%d") {
        return Ok(local_epoch(date.and_time(NaiveTime::MIN)));
    }
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        return text
            .parse::<i64>()
            .map_err(|_| DateParseError(text.to_string()));
    }
    Err(DateParseError(text.to_string()))
}

/// Format an epoch time as `YYYY.MMDD HH:MM:SS` in local time.
pub fn ymdhms(epoch: i64) -> String {
    match Local.timestamp_opt(epoch, 0) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
            format!(
                "{:04}.{:02}{:02} {:02}:{:02}:{:02}",
                dt.year(),
                dt.month(),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second()
            )
        }
        LocalResult::None => String::new(),
    }
}

/// Map a size unit to its multiplier. `kb`..`yb` scale by powers of *kb*
/// (so the caller can force 1024); `kib`..`yib` always scale by powers of
/// 1024. Unit specs are case insensitive; anything unrecognized maps to 1.
pub fn map_size_unit(unit: &str, kb: u64) -> u64 {
    let sl = unit.to_lowercase();
    let exponent = match (sl.chars().next(), sl.chars().last()) {
        (Some(first), Some('b')) => match first {
            'k' => 1,
            'm' => 2,
            'g' => 3,
            't' => 4,
            'p' => 5,
            'e' => 6,
            'z' => 7,
            'y' => 8,
            _ => 0,
        },
        _ => 0,
    };
    let base: u64 = if sl.contains('i') { 1024 } else { kb };
    base.saturating_pow(exponent)
}

/// Scale an expression like `20kb`, `1MB`, `5 Gib` to its numeric value.
/// Returns 0 when no magnitude is present.
pub fn scale(spec: &str, kb: u64) -> u64 {
    match MAGNITUDE_RX.captures(spec) {
        Some(caps) => {
            let mag: u64 = caps[1].parse().unwrap_or(0);
            mag.saturating_mul(map_size_unit(&caps[2], kb))
        }
        None => 0,
    }
}

/// Squeeze runs of whitespace down to a single space and trim the ends.
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_list_empty() {
        assert_eq!(csv_list(""), Vec::<String>::new());
        assert_eq!(csv_list("   "), Vec::<String>::new());
    }

    #[test]
    fn csv_list_single() {
        assert_eq!(csv_list(" xyz  "), vec!["xyz"]);
    }

    #[test]
    fn csv_list_multi() {
        assert_eq!(
            csv_list("abc, def ,ghi"),
            vec!["abc", "def", "ghi"]
        );
    }

    #[test]
    fn epoch_formats() {
        let base = epoch("2014.0401").expect("date only");
        assert_eq!(epoch("2014.0401 00:00:00").expect("full"), base);
        assert_eq!(epoch("2014.0401 01:02").expect("no seconds"), base + 3720);
        assert_eq!(epoch("2014.0401.01.02.03").expect("dotted"), base + 3723);
        assert_eq!(epoch("2014.0401 05").expect("hour only"), base + 5 * 3600);
        assert_eq!(epoch("1396328400").expect("digits"), 1396328400);
        assert!(epoch("not a date").is_err());
    }

    #[test]
    fn daybase_is_midnight() {
        let noon = epoch("2014.0401 12:00:00").expect("noon");
        assert_eq!(daybase(noon), epoch("2014.0401").expect("midnight"));
    }

    #[test]
    fn daybase_idempotent() {
        let mid = epoch("2013.0428").expect("midnight");
        assert_eq!(daybase(mid), mid);
    }

    #[test]
    fn day_offset_steps_by_whole_days() {
        let today = day_offset(0);
        assert_eq!(today, daybase(Local::now().timestamp()));
        assert_eq!(day_offset(1) - today, DAY);
        assert_eq!(day_offset(-1) - today, -DAY);
    }

    #[test]
    fn weekday_index() {
        // 2014.0301 was a Saturday, 2014.0305 a Wednesday
        assert_eq!(weekday(epoch("2014.0301 10:00:00").expect("sat")), 5);
        assert_eq!(weekday(epoch("2014.0305 10:00:00").expect("wed")), 2);
    }

    #[test]
    fn ymdhms_round_trip() {
        let when = epoch("2014.0401 17:00:00").expect("parse");
        assert_eq!(ymdhms(when), "2014.0401 17:00:00");
    }

    #[test]
    fn size_units_decimal() {
        assert_eq!(scale("20kb", 1000), 20_000);
        assert_eq!(scale("1MB", 1000), 1_000_000);
        assert_eq!(scale("10", 1000), 10);
        assert_eq!(scale("", 1000), 0);
    }

    #[test]
    fn size_units_binary() {
        assert_eq!(scale("5 Gib", 1000), 5 * 1024u64.pow(3));
        assert_eq!(scale("2kib", 1000), 2048);
        // forcing kb to mean 1024
        assert_eq!(scale("1kb", 1024), 1024);
    }

    #[test]
    fn size_units_saturate_instead_of_overflowing() {
        // 1000^8 and kb-scale magnitudes beyond u64 clamp rather than panic
        assert_eq!(map_size_unit("yb", 1000), u64::MAX);
        assert_eq!(scale("2yb", 1000), u64::MAX);
        assert_eq!(scale("999999999 tb", 1000), u64::MAX);
    }

    #[test]
    fn squash_whitespace() {
        assert_eq!(squash("  a   b\t\tc  "), "a b c");
    }
}
