//! Human-facing date and time labels for listings and transcripts.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone};

/// Clock time in 12-hour form, e.g. `09:05 PM`.
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%I:%M %p").to_string()
}

/// Relative day label: `Today`, `Yesterday`, `Mar 4`, or `Mar 4, 2023` when
/// the date falls in another year than `today`.
pub fn format_date(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        return "Today".to_string();
    }
    if today.checked_sub_days(Days::new(1)) == Some(date) {
        return "Yesterday".to_string();
    }
    if date.year() == today.year() {
        date.format("%b %-d").to_string()
    } else {
        date.format("%b %-d, %Y").to_string()
    }
}

/// [`format_date`] against the local calendar.
pub fn format_local_date<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    let local = at.with_timezone(&Local);
    format_date(local.date_naive(), Local::now().date_naive())
}
