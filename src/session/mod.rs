//! [SessionController] owns every piece of state of a pomodoro session and persists each change
//! through the [Repository] before the operation returns.

pub mod runner;
pub mod ticker;

use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    history::{entities::SeriesPoint, History},
    notify::{Notifier, PhaseNotice},
    storage::{repository::Repository, KeyValueStore},
    tasks::TaskList,
    timer::{Phase, PhaseChange, TimerEvent, TimerState},
    utils::clock::Clock,
};

use ticker::{Ticker, TICK_INTERVAL};

/// The timer snapshot is written on ticks whose remaining seconds are a multiple of this.
const TICK_SAVE_EVERY: u32 = 5;

/// Everything a status line shows.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub now: NaiveDateTime,
    pub phase: Phase,
    pub seconds_remaining: u32,
    pub running: bool,
    pub cycle_count: u32,
    pub today_minutes: f64,
    pub pending_tasks: usize,
}

pub struct SessionController<S: KeyValueStore> {
    clock: Arc<dyn Clock>,
    repository: Repository<S>,
    notifier: Box<dyn Notifier>,
    timer: TimerState,
    history: History,
    tasks: TaskList,
    ticker: Option<Ticker>,
}

impl<S: KeyValueStore> SessionController<S> {
    /// Restores the previous session from `store`. A new day clears today's sessions, and a
    /// countdown that ran out in the meantime is completed.
    pub fn load(store: S, clock: Arc<dyn Clock>, notifier: Box<dyn Notifier>) -> Result<Self> {
        let repository = Repository::new(store);
        let mut controller = Self {
            timer: repository.load(),
            history: repository.load(),
            tasks: repository.load(),
            clock,
            repository,
            notifier,
            ticker: None,
        };

        if controller.history.rollover(controller.today()) {
            controller.repository.save(&controller.history)?;
        }

        let resumed = controller.timer.resume_after_reload(controller.clock.as_ref());
        if let Some(event) = resumed {
            controller.apply(&event)?;
        }
        controller.repository.save(&controller.timer)?;
        info!("Loaded session {:?}", controller.timer);
        Ok(controller)
    }

    pub fn start(&mut self) -> Result<Option<TimerEvent>> {
        let event = self.timer.start(self.clock.as_ref());
        self.apply_opt(event)
    }

    pub fn pause(&mut self) -> Result<Option<TimerEvent>> {
        let event = self.timer.pause();
        self.apply_opt(event)
    }

    pub fn toggle(&mut self) -> Result<Option<TimerEvent>> {
        let event = self.timer.toggle(self.clock.as_ref());
        self.apply_opt(event)
    }

    pub fn skip(&mut self) -> Result<TimerEvent> {
        let event = self.timer.skip(self.clock.as_ref());
        self.apply(&event)?;
        Ok(event)
    }

    /// Handles the repeating timer callback.
    pub fn tick(&mut self) -> Result<Option<TimerEvent>> {
        let now = self.clock.instant();
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.advance(now);
        }
        let event = self.timer.tick(self.clock.as_ref());
        self.apply_opt(event)
    }

    /// Deadline of the outstanding repeating timer. There is at most one, and none while paused.
    pub fn next_tick_at(&self) -> Option<Instant> {
        self.ticker.map(|ticker| ticker.deadline())
    }

    pub fn today_total_minutes(&self) -> f64 {
        self.history.today_total_minutes(&self.timer)
    }

    pub fn weekly_series(&self) -> Vec<SeriesPoint> {
        self.history.weekly_series(self.today())
    }

    pub fn daily_series(&self) -> Vec<SeriesPoint> {
        self.history.daily_series(&self.timer)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            now: self.clock.local_time(),
            phase: self.timer.phase,
            seconds_remaining: self.timer.seconds_remaining,
            running: self.timer.running,
            cycle_count: self.timer.cycle_count,
            today_minutes: self.today_total_minutes(),
            pending_tasks: self.tasks.pending_count(),
        }
    }

    pub fn add_task(&mut self, text: &str) -> Result<Option<i64>> {
        let now_ms = self.clock.time().timestamp_millis();
        let id = self.tasks.add(text, now_ms).map(|task| task.id);
        if id.is_some() {
            self.repository.save(&self.tasks)?;
        }
        Ok(id)
    }

    pub fn toggle_task(&mut self, id: i64) -> Result<bool> {
        let toggled = self.tasks.toggle(id);
        if toggled {
            self.repository.save(&self.tasks)?;
        }
        Ok(toggled)
    }

    pub fn remove_task(&mut self, id: i64) -> Result<bool> {
        let removed = self.tasks.remove(id);
        if removed {
            self.repository.save(&self.tasks)?;
        }
        Ok(removed)
    }

    /// Erases history, tasks and the timer snapshot. Nothing happens unless `confirm` agrees.
    pub fn clear_all(&mut self, confirm: impl FnOnce() -> bool) -> Result<bool> {
        if !confirm() {
            info!("Clearing cancelled");
            return Ok(false);
        }
        self.ticker = None;
        self.repository.clear()?;
        self.timer = TimerState::default();
        self.history = History::default();
        self.tasks = TaskList::default();
        info!("Cleared all data");
        Ok(true)
    }

    /// Stops ticking and writes the final timer snapshot. A running countdown stays running in
    /// the snapshot and is picked up by the next [SessionController::load].
    pub fn teardown(mut self) -> Result<S> {
        self.ticker = None;
        self.repository.save(&self.timer)?;
        Ok(self.repository.into_inner())
    }

    pub fn timer(&self) -> &TimerState {
        &self.timer
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn tasks(&self) -> &TaskList {
        &self.tasks
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    fn today(&self) -> NaiveDate {
        self.clock.local_time().date()
    }

    fn apply_opt(&mut self, event: Option<TimerEvent>) -> Result<Option<TimerEvent>> {
        if let Some(event) = &event {
            self.apply(event)?;
        }
        Ok(event)
    }

    fn apply(&mut self, event: &TimerEvent) -> Result<()> {
        match event {
            TimerEvent::Started { .. } => {
                self.ticker = Some(Ticker::starting_at(self.clock.instant(), TICK_INTERVAL));
            }
            TimerEvent::Paused { .. } => {
                self.ticker = None;
            }
            TimerEvent::Ticked { seconds_remaining } => {
                if seconds_remaining % TICK_SAVE_EVERY == 0 {
                    self.repository.save(&self.timer)?;
                }
                return Ok(());
            }
            TimerEvent::Completed(change) => {
                self.ticker = None;
                self.record_focus(change)?;
                self.notify(change);
            }
            TimerEvent::Skipped(change) => {
                self.ticker = None;
                self.record_focus(change)?;
            }
        }
        self.repository.save(&self.timer)
    }

    fn record_focus(&mut self, change: &PhaseChange) -> Result<()> {
        let Some(report) = &change.focus else {
            return Ok(());
        };
        let today = self.today();
        if self
            .history
            .record_session(report.minutes, &report.label, today)
            .is_some()
        {
            self.repository.save(&self.history)?;
        }
        Ok(())
    }

    fn notify(&self, change: &PhaseChange) {
        let notice = PhaseNotice {
            finished: change.from,
            next: change.to,
        };
        if let Err(e) = self.notifier.notify(&notice) {
            debug!("Notification failed {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use chrono::Duration;

    use crate::{
        history::History,
        notify::MockNotifier,
        storage::{
            repository::{Repository, CYCLE_KEY},
            KeyValueStore, MemoryStore,
        },
        timer::{Phase, TimerEvent, TimerState},
        utils::clock::testing::ManualClock,
    };

    use super::SessionController;

    const TODAY: &str = "2018-07-04";

    fn quiet_notifier() -> Box<MockNotifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();
        Box::new(notifier)
    }

    fn notifier_expecting(times: usize) -> Box<MockNotifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(times).returning(|_| Ok(()));
        Box::new(notifier)
    }

    fn load_controller(
        store: MemoryStore,
        clock: &ManualClock,
        notifier: Box<MockNotifier>,
    ) -> Result<SessionController<MemoryStore>> {
        SessionController::load(store, Arc::new(clock.clone()), notifier)
    }

    /// Ticks once per simulated second, the way the event loop would.
    fn tick_for(
        controller: &mut SessionController<MemoryStore>,
        clock: &ManualClock,
        seconds: u32,
    ) -> Result<Vec<TimerEvent>> {
        let mut events = vec![];
        for _ in 0..seconds {
            clock.advance_secs(1);
            if let Some(event) = controller.tick()? {
                if event.phase_change().is_some() {
                    events.push(event);
                }
            }
        }
        Ok(events)
    }

    #[test]
    fn test_full_focus_completes_once() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, notifier_expecting(1))?;
        controller.start()?;

        let changes = tick_for(&mut controller, &clock, 1500 + 30)?;

        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], TimerEvent::Completed(_)));
        assert_eq!(controller.history().weekly[TODAY], 25.);
        assert_eq!(controller.history().daily.len(), 1);
        assert_eq!(controller.history().daily[0].duration, 25.);
        assert_eq!(controller.history().daily[0].time, "09:30");
        assert_eq!(controller.timer().phase, Phase::ShortBreak);
        assert!(!controller.timer().running);
        assert!(controller.next_tick_at().is_none());
        Ok(())
    }

    #[test]
    fn test_missed_ticks_still_complete_once() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, notifier_expecting(1))?;
        controller.start()?;
        clock.advance_secs(1500);
        let event = controller.tick()?.unwrap();
        assert!(matches!(event, TimerEvent::Completed(_)));
        assert!(controller.tick()?.is_none());
        assert_eq!(controller.history().weekly[TODAY], 25.);
        Ok(())
    }

    #[test]
    fn test_skip_records_partial_focus() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, quiet_notifier())?;
        controller.start()?;
        tick_for(&mut controller, &clock, 600)?;

        controller.skip()?;

        assert_eq!(controller.timer().phase, Phase::ShortBreak);
        assert!((controller.history().weekly[TODAY] - 10.).abs() <= 0.05);
        assert_eq!(controller.history().daily[0].duration, 10.);
        assert!(controller.next_tick_at().is_none());
        Ok(())
    }

    #[test]
    fn test_skip_after_countdown_ran_out_completes_instead() -> Result<()> {
        let clock = ManualClock::new();
        let mut store = MemoryStore::new();
        store.set(CYCLE_KEY, "4".into())?;
        let mut controller = load_controller(store, &clock, notifier_expecting(1))?;
        controller.start()?;
        // The tick for the last second hasn't been handled yet
        clock.advance_secs(1501);

        let event = controller.skip()?;

        assert!(matches!(event, TimerEvent::Completed(_)));
        assert_eq!(controller.timer().phase, Phase::LongBreak);
        assert_eq!(controller.history().weekly[TODAY], 25.);
        assert!(controller.next_tick_at().is_none());
        Ok(())
    }

    #[test]
    fn test_skip_right_after_start_records_nothing() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, quiet_notifier())?;
        controller.start()?;
        clock.advance(Duration::milliseconds(3000));
        controller.skip()?;
        assert!(controller.history().weekly.is_empty());
        assert!(controller.history().daily.is_empty());
        assert!(controller.timer().session_start_label.is_none());
        Ok(())
    }

    #[test]
    fn test_pause_cancels_ticker() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, quiet_notifier())?;
        assert!(controller.next_tick_at().is_none());

        controller.start()?;
        let deadline = controller.next_tick_at();
        assert!(deadline.is_some());

        // Starting again neither replaces nor duplicates the ticker.
        assert!(controller.start()?.is_none());
        assert_eq!(controller.next_tick_at(), deadline);

        controller.pause()?;
        assert!(controller.next_tick_at().is_none());
        clock.advance_secs(10);
        assert!(controller.tick()?.is_none());
        assert_eq!(controller.timer().seconds_remaining, 1500);
        Ok(())
    }

    #[test]
    fn test_resume_after_pause_follows_wall_clock() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, quiet_notifier())?;
        controller.start()?;
        tick_for(&mut controller, &clock, 100)?;
        controller.pause()?;
        clock.advance_secs(500);

        controller.start()?;
        // The process was suspended and only one callback arrives after 60 seconds.
        clock.advance_secs(60);
        controller.tick()?;
        assert_eq!(controller.timer().seconds_remaining, 1340);
        Ok(())
    }

    #[test]
    fn test_today_total_tracks_running_focus() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, notifier_expecting(1))?;
        controller.start()?;
        tick_for(&mut controller, &clock, 1500)?;
        controller.skip()?;

        controller.start()?;
        tick_for(&mut controller, &clock, 437)?;
        let expected = 25. + (1500. - f64::from(controller.timer().seconds_remaining)) / 60.;
        assert!((controller.today_total_minutes() - expected).abs() <= 0.02);
        assert!((controller.today_total_minutes() - (25. + 437. / 60.)).abs() <= 0.02);

        let daily = controller.daily_series();
        assert_eq!(daily.len(), 2);
        Ok(())
    }

    #[test]
    fn test_running_timer_survives_reload() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, quiet_notifier())?;
        controller.start()?;
        tick_for(&mut controller, &clock, 100)?;
        let store = controller.teardown()?;

        clock.advance_secs(200);
        let controller = load_controller(store, &clock, quiet_notifier())?;
        assert!(controller.timer().running);
        assert_eq!(controller.timer().seconds_remaining, 1200);
        assert_eq!(controller.timer().session_start_label.as_deref(), Some("09:30"));
        assert!(controller.next_tick_at().is_some());
        Ok(())
    }

    #[test]
    fn test_expired_timer_completes_on_reload() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, quiet_notifier())?;
        controller.start()?;
        let store = controller.teardown()?;

        clock.advance_secs(2000);
        let mut controller = load_controller(store, &clock, notifier_expecting(1))?;
        assert_eq!(controller.timer().phase, Phase::ShortBreak);
        assert!(!controller.timer().running);
        assert_eq!(controller.history().weekly[TODAY], 25.);
        assert!(controller.tick()?.is_none());

        let store = controller.teardown()?;
        let timer = Repository::new(store).load::<TimerState>();
        assert_eq!(timer.phase, Phase::ShortBreak);
        assert!(!timer.running);
        Ok(())
    }

    #[test]
    fn test_new_day_clears_daily_sessions_only() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, quiet_notifier())?;
        controller.start()?;
        tick_for(&mut controller, &clock, 300)?;
        controller.skip()?;
        let store = controller.teardown()?;

        clock.advance(Duration::days(1));
        let controller = load_controller(store, &clock, quiet_notifier())?;
        assert!(controller.history().daily.is_empty());
        assert_eq!(controller.history().weekly[TODAY], 5.);
        assert_eq!(
            controller.history().last_record_date.as_deref(),
            Some("2018-07-05")
        );
        assert_eq!(controller.weekly_series()[5].minutes, 5.);
        Ok(())
    }

    #[test]
    fn test_failed_notification_is_ignored() -> Result<()> {
        let clock = ManualClock::new();
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_| Err(anyhow!("autoplay blocked")));
        let mut controller = load_controller(MemoryStore::new(), &clock, Box::new(notifier))?;
        controller.start()?;
        clock.advance_secs(1500);
        assert!(controller.tick().is_ok());
        assert_eq!(controller.timer().phase, Phase::ShortBreak);
        Ok(())
    }

    #[test]
    fn test_tasks_are_persisted() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, quiet_notifier())?;
        assert_eq!(controller.add_task("   ")?, None);
        let id = controller.add_task("write tests")?.unwrap();
        controller.add_task("ship")?;
        assert!(controller.toggle_task(id)?);
        assert!(!controller.remove_task(id + 12345)?);
        let store = controller.teardown()?;

        let mut controller = load_controller(store, &clock, quiet_notifier())?;
        assert_eq!(controller.tasks().len(), 2);
        assert_eq!(controller.tasks().pending_count(), 1);
        assert!(controller.remove_task(id)?);
        let store = controller.teardown()?;
        assert_eq!(load_controller(store, &clock, quiet_notifier())?.tasks().len(), 1);
        Ok(())
    }

    #[test]
    fn test_clear_all_requires_confirmation() -> Result<()> {
        let clock = ManualClock::new();
        let mut controller = load_controller(MemoryStore::new(), &clock, quiet_notifier())?;
        controller.start()?;
        tick_for(&mut controller, &clock, 300)?;
        controller.skip()?;
        controller.add_task("keep me")?;

        assert!(!controller.clear_all(|| false)?);
        assert_eq!(controller.history().daily.len(), 1);
        assert_eq!(controller.tasks().len(), 1);

        assert!(controller.clear_all(|| true)?);
        assert_eq!(controller.history(), &History::default());
        assert!(controller.tasks().is_empty());
        assert_eq!(controller.timer(), &TimerState::default());
        assert!(controller.next_tick_at().is_none());

        let store = controller.teardown()?;
        assert_eq!(store.get("focus_history"), None);
        assert_eq!(store.get("focus_tasks"), None);
        Ok(())
    }
}
