use chrono::{DateTime, Duration, SubsecRound, Utc};
use tracing::{debug, info};

use crate::utils::{
    clock::Clock,
    time::{format_countdown, time_label},
};

use super::phase::{Phase, CYCLES_BEFORE_LONG_BREAK, FOCUS_SECONDS};

/// Focus time produced by a finished or skipped focus phase.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusReport {
    pub minutes: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
    pub focus: Option<FocusReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    Started { phase: Phase },
    Paused { phase: Phase, seconds_remaining: u32 },
    Ticked { seconds_remaining: u32 },
    Completed(PhaseChange),
    Skipped(PhaseChange),
}

impl TimerEvent {
    pub fn phase_change(&self) -> Option<&PhaseChange> {
        match self {
            TimerEvent::Completed(change) | TimerEvent::Skipped(change) => Some(change),
            _ => None,
        }
    }
}

/// Countdown and phase cycle of the pomodoro timer.
///
/// While running, `seconds_remaining` is always derived from `target_end` and the wall clock,
/// so missed ticks never make the countdown drift.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerState {
    pub phase: Phase,
    pub seconds_remaining: u32,
    pub running: bool,
    pub session_start_label: Option<String>,
    pub cycle_count: u32,
    pub target_end: Option<DateTime<Utc>>,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            phase: Phase::Focus,
            seconds_remaining: Phase::Focus.nominal_seconds(),
            running: false,
            session_start_label: None,
            cycle_count: 1,
            target_end: None,
        }
    }
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the countdown. Returns `None` if the timer is already running.
    pub fn start(&mut self, clock: &dyn Clock) -> Option<TimerEvent> {
        if self.running {
            return None;
        }
        if self.phase == Phase::Focus && self.session_start_label.is_none() {
            self.session_start_label = Some(time_label(clock.local_time()));
        }
        // Persisted with millisecond precision
        let target_end = clock.time() + Duration::seconds(i64::from(self.seconds_remaining));
        self.target_end = Some(target_end.trunc_subsecs(3));
        self.running = true;
        info!(
            "Started {} with {}s remaining",
            self.phase, self.seconds_remaining
        );
        Some(TimerEvent::Started { phase: self.phase })
    }

    /// Stops the countdown at the current remaining time. The session start label is kept so
    /// that a resumed focus phase is still attributed to the moment it began.
    pub fn pause(&mut self) -> Option<TimerEvent> {
        if !self.running {
            return None;
        }
        self.running = false;
        self.target_end = None;
        info!(
            "Paused {} with {}s remaining",
            self.phase, self.seconds_remaining
        );
        Some(TimerEvent::Paused {
            phase: self.phase,
            seconds_remaining: self.seconds_remaining,
        })
    }

    pub fn toggle(&mut self, clock: &dyn Clock) -> Option<TimerEvent> {
        if self.running {
            self.pause()
        } else {
            self.start(clock)
        }
    }

    /// Recomputes the remaining time from the wall clock and completes the phase once it
    /// reaches zero.
    pub fn tick(&mut self, clock: &dyn Clock) -> Option<TimerEvent> {
        let target_end = match (self.running, self.target_end) {
            (true, Some(target_end)) => target_end,
            _ => return None,
        };
        let remaining = seconds_until(target_end, clock.time());
        if remaining == 0 {
            self.seconds_remaining = 0;
            return Some(self.complete(clock));
        }
        self.seconds_remaining = remaining.min(self.phase.nominal_seconds());
        debug!("Tick, {}s remaining", self.seconds_remaining);
        Some(TimerEvent::Ticked {
            seconds_remaining: self.seconds_remaining,
        })
    }

    /// Finishes the current phase. A finished focus phase always counts as its full nominal
    /// duration.
    pub fn complete(&mut self, clock: &dyn Clock) -> TimerEvent {
        self.stop();
        let from = self.phase;
        let (to, focus) = match from {
            Phase::Focus => {
                let report = FocusReport {
                    minutes: f64::from(FOCUS_SECONDS) / 60.,
                    label: self.report_label(clock),
                };
                let next = if self.cycle_count < CYCLES_BEFORE_LONG_BREAK {
                    Phase::ShortBreak
                } else {
                    Phase::LongBreak
                };
                (next, Some(report))
            }
            Phase::ShortBreak => {
                self.cycle_count += 1;
                (Phase::Focus, None)
            }
            Phase::LongBreak => {
                self.cycle_count = 1;
                (Phase::Focus, None)
            }
        };
        self.enter(to);
        info!("Completed {from}, next is {to} (cycle {})", self.cycle_count);
        TimerEvent::Completed(PhaseChange { from, to, focus })
    }

    /// Ends the current phase early. Skipping focus always leads to a short break, regardless of
    /// the cycle count, and reports the partial focus time. A countdown that already ran out is
    /// completed instead.
    pub fn skip(&mut self, clock: &dyn Clock) -> TimerEvent {
        // Account for the time since the last tick.
        if let (true, Some(target_end)) = (self.running, self.target_end) {
            let remaining = seconds_until(target_end, clock.time());
            if remaining == 0 {
                self.seconds_remaining = 0;
                return self.complete(clock);
            }
            self.seconds_remaining = remaining.min(self.phase.nominal_seconds());
        }
        self.stop();
        let from = self.phase;
        let (to, focus) = match from {
            Phase::Focus => {
                let minutes = self.elapsed_focus_minutes();
                let focus = (minutes > 0.).then(|| FocusReport {
                    minutes,
                    label: self.report_label(clock),
                });
                (Phase::ShortBreak, focus)
            }
            Phase::ShortBreak | Phase::LongBreak => (Phase::Focus, None),
        };
        self.enter(to);
        info!("Skipped {from}, next is {to}");
        TimerEvent::Skipped(PhaseChange { from, to, focus })
    }

    /// Brings a snapshot loaded from storage up to date with the wall clock. A countdown that
    /// ran out while nothing was observing it is completed here.
    pub fn resume_after_reload(&mut self, clock: &dyn Clock) -> Option<TimerEvent> {
        if !self.running {
            self.target_end = None;
            return None;
        }
        let Some(target_end) = self.target_end else {
            self.running = false;
            return None;
        };
        let remaining = seconds_until(target_end, clock.time());
        if remaining > 0 {
            self.seconds_remaining = remaining.min(self.phase.nominal_seconds());
            info!("Resumed {} with {}s remaining", self.phase, self.seconds_remaining);
            Some(TimerEvent::Started { phase: self.phase })
        } else {
            self.seconds_remaining = 0;
            Some(self.complete(clock))
        }
    }

    /// Minutes of the current focus phase that have already elapsed. Zero during breaks.
    pub fn elapsed_focus_minutes(&self) -> f64 {
        if self.phase != Phase::Focus {
            return 0.;
        }
        f64::from(FOCUS_SECONDS.saturating_sub(self.seconds_remaining)) / 60.
    }

    pub fn is_focusing(&self) -> bool {
        self.running && self.phase == Phase::Focus
    }

    /// Remaining time as `MM:SS`.
    pub fn format(&self) -> String {
        format_countdown(self.seconds_remaining)
    }

    fn report_label(&mut self, clock: &dyn Clock) -> String {
        self.session_start_label
            .take()
            .unwrap_or_else(|| time_label(clock.local_time()))
    }

    fn stop(&mut self) {
        self.running = false;
        self.target_end = None;
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.seconds_remaining = phase.nominal_seconds();
        self.session_start_label = None;
    }
}

/// Whole seconds left until `target_end`, rounded up.
fn seconds_until(target_end: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let millis = (target_end - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        u32::try_from((millis + 999) / 1000).unwrap_or(u32::MAX)
    }
}
