//! Focus time accounting. Two views are kept:
//!  - `weekly`: cumulative minutes per calendar day, never pruned automatically.
//!  - `daily`: the individual focus records of the current day, reset on the first observation
//!    of a new date.

pub mod entities;
pub mod series;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::{timer::TimerState, utils::time::date_key};

use entities::{FocusRecord, SeriesPoint};

/// Reported focus time at or below this many minutes is not recorded.
pub const MIN_RECORDED_MINUTES: f64 = 0.1;

pub const IN_PROGRESS_LABEL: &str = "in progress";

pub fn is_recordable(minutes: f64) -> bool {
    minutes > MIN_RECORDED_MINUTES
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct History {
    pub weekly: BTreeMap<String, f64>,
    pub daily: Vec<FocusRecord>,
    pub last_record_date: Option<String>,
}

impl History {
    /// Adds focus minutes to today's total and appends a record to today's sessions.
    pub fn record_session(
        &mut self,
        minutes: f64,
        label: &str,
        today: NaiveDate,
    ) -> Option<&FocusRecord> {
        if !is_recordable(minutes) {
            debug!("Ignoring {minutes} focus minutes");
            return None;
        }
        self.rollover(today);

        *self.weekly.entry(date_key(today)).or_insert(0.) += minutes;
        self.daily.push(FocusRecord {
            time: label.to_string(),
            duration: round_to_tenth(minutes),
        });
        info!("Recorded {minutes:.2} focus minutes started at {label}");
        self.daily.last()
    }

    /// Clears today's sessions if they belong to another day. Returns whether anything changed.
    pub fn rollover(&mut self, today: NaiveDate) -> bool {
        let today = date_key(today);
        if self.last_record_date.as_deref() == Some(today.as_str()) {
            return false;
        }
        info!(
            "New day {today}, previous record date {:?}",
            self.last_record_date
        );
        self.daily.clear();
        self.last_record_date = Some(today);
        true
    }

    /// Minutes of today's records plus the running focus phase, if any.
    pub fn today_total_minutes(&self, timer: &TimerState) -> f64 {
        let recorded: f64 = self.daily.iter().map(|s| s.duration).sum();
        if timer.is_focusing() {
            recorded + timer.elapsed_focus_minutes()
        } else {
            recorded
        }
    }

    pub fn weekly_series(&self, today: NaiveDate) -> Vec<SeriesPoint> {
        series::last_7_days(today, |key| self.weekly.get(key).copied())
    }

    /// Today's records in order, with a trailing point for the focus phase that is running.
    pub fn daily_series(&self, timer: &TimerState) -> Vec<SeriesPoint> {
        let mut points = self.daily.iter().map(SeriesPoint::from).collect::<Vec<_>>();
        let elapsed = timer.elapsed_focus_minutes();
        if timer.is_focusing() && elapsed > 0. {
            points.push(SeriesPoint::new(IN_PROGRESS_LABEL, elapsed));
        }
        points
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn round_to_tenth(minutes: f64) -> f64 {
    (minutes * 10.).round() / 10.
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::timer::{Phase, TimerState};

    use super::{entities::SeriesPoint, History, IN_PROGRESS_LABEL};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_record_session_updates_both_views() {
        let mut history = History::default();
        let record = history.record_session(12.345, "10:15", day(10)).cloned();
        assert_eq!(record.unwrap().duration, 12.3);

        history.record_session(25., "11:00", day(10));

        assert!((history.weekly["2024-05-10"] - 37.345).abs() < 1e-9);
        assert_eq!(history.daily.len(), 2);
        assert_eq!(history.daily[1].time, "11:00");
        assert_eq!(history.last_record_date.as_deref(), Some("2024-05-10"));
    }

    #[test]
    fn test_negligible_sessions_are_ignored() {
        let mut history = History::default();
        for minutes in [0., 0.05, 0.1, -3.] {
            assert!(history.record_session(minutes, "10:00", day(10)).is_none());
        }
        assert_eq!(history, History::default());
    }

    #[test]
    fn test_rollover_clears_daily_but_keeps_weekly() {
        let mut history = History::default();
        history.record_session(25., "09:00", day(10));

        assert!(!history.rollover(day(10)));
        assert!(history.rollover(day(11)));
        assert!(history.daily.is_empty());
        assert_eq!(history.weekly["2024-05-10"], 25.);
        assert_eq!(history.last_record_date.as_deref(), Some("2024-05-11"));
    }

    #[test]
    fn test_recording_on_new_day_starts_fresh_list() {
        let mut history = History::default();
        history.record_session(25., "23:00", day(10));
        history.record_session(5., "00:10", day(11));

        assert_eq!(history.daily.len(), 1);
        assert_eq!(history.daily[0].time, "00:10");
        assert_eq!(history.weekly.len(), 2);
    }

    #[test]
    fn test_today_total_includes_running_focus() {
        let mut history = History::default();
        history.record_session(25., "09:00", day(10));
        history.record_session(10.04, "10:00", day(10));

        let mut timer = TimerState {
            seconds_remaining: 1200,
            ..TimerState::new()
        };
        assert!((history.today_total_minutes(&timer) - 35.).abs() < 0.02);

        timer.running = true;
        assert!((history.today_total_minutes(&timer) - 40.).abs() < 0.02);

        timer.phase = Phase::ShortBreak;
        assert!((history.today_total_minutes(&timer) - 35.).abs() < 0.02);
    }

    #[test]
    fn test_daily_series_with_in_progress_point() {
        let mut history = History::default();
        history.record_session(25., "09:00", day(10));
        let mut timer = TimerState {
            seconds_remaining: 1410,
            running: true,
            ..TimerState::new()
        };

        let series = history.daily_series(&timer);
        assert_eq!(
            series,
            vec![
                SeriesPoint::new("09:00", 25.),
                SeriesPoint::new(IN_PROGRESS_LABEL, 1.5)
            ]
        );

        timer.running = false;
        assert_eq!(history.daily_series(&timer).len(), 1);
    }

    #[test]
    fn test_weekly_series_reads_history() {
        let mut history = History::default();
        history.record_session(25., "09:00", day(4));
        history.record_session(30., "09:00", day(10));
        history.weekly.insert("2024-05-01".into(), 99.);

        let series = history.weekly_series(day(10));
        assert_eq!(series.len(), 7);
        assert_eq!(series[0], SeriesPoint::new("5/4", 25.));
        assert_eq!(series[6], SeriesPoint::new("5/10", 30.));
        assert_eq!(series.iter().map(|p| p.minutes).sum::<f64>(), 55.);
    }
}
