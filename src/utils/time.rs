use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// This is the standard way of converting a date to a history key in focusdeck.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Label of a focus record, `HH:MM`.
pub fn time_label(moment: NaiveDateTime) -> String {
    moment.format("%H:%M").to_string()
}

/// Short label used on the weekly chart, `M/D`.
pub fn day_label(date: NaiveDate) -> String {
    date.format("%-m/%-d").to_string()
}

pub fn is_time_label(value: &str) -> bool {
    value.len() == 5 && NaiveTime::parse_from_str(value, "%H:%M").is_ok()
}

pub fn format_countdown(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn format_clock(moment: NaiveDateTime) -> String {
    moment.format("%H:%M:%S").to_string()
}

pub fn format_date(moment: NaiveDateTime) -> String {
    moment.format("%Y/%m/%d").to_string()
}
