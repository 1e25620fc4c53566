use serde::{Deserialize, Serialize};

/// One finished or skipped focus phase of the current day.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct FocusRecord {
    /// `HH:MM` at which the focus phase started.
    pub time: String,
    /// Minutes, rounded to one decimal.
    pub duration: f64,
}

/// A labelled value handed to the chart adapter.
#[derive(PartialEq, Debug, Clone)]
pub struct SeriesPoint {
    pub label: String,
    pub minutes: f64,
}

impl SeriesPoint {
    pub fn new(label: impl Into<String>, minutes: f64) -> Self {
        Self {
            label: label.into(),
            minutes,
        }
    }
}

impl From<&FocusRecord> for SeriesPoint {
    fn from(record: &FocusRecord) -> Self {
        SeriesPoint::new(record.time.clone(), record.duration)
    }
}
