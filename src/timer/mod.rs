//! Pomodoro countdown: [Phase] durations and the [TimerState] state machine.

pub mod phase;
pub mod state;

pub use phase::Phase;
pub use state::{FocusReport, PhaseChange, TimerEvent, TimerState};
