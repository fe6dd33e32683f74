//! Timestamp formatting for chat transcripts.
//!
//! All functions take the reference time explicitly; callers pass
//! `Local::now()` and timestamps converted to the same zone.

use std::fmt;

use chrono::{DateTime, Datelike, TimeZone, Weekday};

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

/// Date label for a message: `TODAY`, `YESTERDAY`, a weekday within the last
/// six days, otherwise `MON D`.
///
/// Days are counted in whole 24-hour periods. Timestamps in the future count
/// as today.
pub fn format_message_date<Tz: TimeZone>(ts: &DateTime<Tz>, now: &DateTime<Tz>) -> String {
    let days = now.clone().signed_duration_since(ts.clone()).num_days();
    match days {
        ..=0 => "TODAY".to_string(),
        1 => "YESTERDAY".to_string(),
        2..=6 => weekday_name(ts.weekday()).to_string(),
        _ => format!("{} {}", MONTHS[ts.month0() as usize], ts.day()),
    }
}

/// Clock time such as `9:05 AM`.
pub fn format_message_time<Tz>(ts: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    ts.format("%-I:%M %p").to_string()
}

/// True for the first message and whenever the calendar day changes.
pub fn should_show_date_divider<Tz: TimeZone>(
    current: &DateTime<Tz>,
    previous: Option<&DateTime<Tz>>,
) -> bool {
    previous.is_none_or(|prev| prev.date_naive() != current.date_naive())
}

/// Coarse age of a timestamp, falling back to [`format_message_date`] after
/// a week.
pub fn relative_time<Tz: TimeZone>(ts: &DateTime<Tz>, now: &DateTime<Tz>) -> String {
    let seconds = now.clone().signed_duration_since(ts.clone()).num_seconds();
    match seconds {
        ..60 => "just now".to_string(),
        60..3600 => plural(seconds / 60, "minute"),
        3600..86_400 => plural(seconds / 3600, "hour"),
        86_400..604_800 => plural(seconds / 86_400, "day"),
        _ => format_message_date(ts, now),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}
