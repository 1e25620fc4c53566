use chrono::{Days, NaiveDate};

use crate::utils::time::{date_key, day_label};

use super::entities::SeriesPoint;

pub const WINDOW_DAYS: u64 = 7;

/// Returns exactly seven points, oldest first, ending with `today`. Days `lookup` knows nothing
/// about count as zero.
pub fn last_7_days(today: NaiveDate, lookup: impl Fn(&str) -> Option<f64>) -> Vec<SeriesPoint> {
    (0..WINDOW_DAYS)
        .rev()
        .map(|offset| {
            let day = today.checked_sub_days(Days::new(offset)).unwrap_or(today);
            SeriesPoint::new(day_label(day), lookup(&date_key(day)).unwrap_or(0.))
        })
        .collect()
}
