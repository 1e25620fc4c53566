use std::{collections::BTreeMap, str::FromStr};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    history::{entities::FocusRecord, History},
    tasks::{Task, TaskList},
    timer::{Phase, TimerState},
    utils::time::is_time_label,
};

use super::KeyValueStore;

pub const FOCUS_HISTORY_KEY: &str = "focus_history";
pub const TODAY_SESSIONS_KEY: &str = "today_sessions";
pub const LAST_RECORD_DATE_KEY: &str = "last_record_date";
pub const TASKS_KEY: &str = "focus_tasks";
pub const TIME_LEFT_KEY: &str = "timer_timeLeft";
pub const MODE_KEY: &str = "timer_mode";
pub const CYCLE_KEY: &str = "focus_cycle";
pub const START_TIME_KEY: &str = "timer_startTime";
pub const TARGET_END_KEY: &str = "timer_targetEndTime";
pub const IS_RUNNING_KEY: &str = "timer_isRunning";

/// Something that is persisted as a group of store keys. Reading never fails: every field that
/// is absent or malformed falls back to its default.
pub trait Entity: Sized {
    fn write(&self, store: &mut dyn KeyValueStore) -> Result<()>;

    fn read(store: &dyn KeyValueStore) -> Self;
}

/// Saves and loads [Entity] values. Callers save after every mutation.
pub struct Repository<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn save<E: Entity>(&mut self, entity: &E) -> Result<()> {
        entity.write(&mut self.store)
    }

    pub fn load<E: Entity>(&self) -> E {
        E::read(&self.store)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.store.clear()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl Entity for TimerState {
    fn write(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        store.set(TIME_LEFT_KEY, self.seconds_remaining.to_string())?;
        store.set(MODE_KEY, self.phase.as_str().to_string())?;
        store.set(CYCLE_KEY, self.cycle_count.to_string())?;
        match &self.session_start_label {
            Some(label) => store.set(START_TIME_KEY, label.clone())?,
            None => store.remove(START_TIME_KEY)?,
        }
        match (self.running, self.target_end) {
            (true, Some(target_end)) => {
                store.set(TARGET_END_KEY, target_end.timestamp_millis().to_string())?;
                store.set(IS_RUNNING_KEY, "true".into())?;
            }
            _ => {
                store.remove(TARGET_END_KEY)?;
                store.set(IS_RUNNING_KEY, "false".into())?;
            }
        }
        debug!("Saved timer snapshot {self:?}");
        Ok(())
    }

    fn read(store: &dyn KeyValueStore) -> Self {
        let phase = parse_field::<Phase>(store, MODE_KEY).unwrap_or_default();
        let nominal = phase.nominal_seconds();

        let seconds_remaining = parse_field::<u32>(store, TIME_LEFT_KEY)
            .filter(|seconds| {
                let valid = *seconds <= nominal;
                if !valid {
                    warn!("Remaining time {seconds}s exceeds {phase}, resetting");
                }
                valid
            })
            .unwrap_or(nominal);

        let cycle_count = parse_field::<u32>(store, CYCLE_KEY)
            .filter(|cycle| *cycle >= 1)
            .unwrap_or(1);

        let session_start_label = store
            .get(START_TIME_KEY)
            .filter(|label| phase == Phase::Focus && is_time_label(label));

        let target_end = parse_field::<i64>(store, TARGET_END_KEY)
            .and_then(DateTime::<Utc>::from_timestamp_millis);
        let running = store.get(IS_RUNNING_KEY).as_deref() == Some("true") && target_end.is_some();

        TimerState {
            phase,
            seconds_remaining,
            running,
            session_start_label,
            cycle_count,
            target_end: target_end.filter(|_| running),
        }
    }
}

impl Entity for History {
    fn write(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        store.set(FOCUS_HISTORY_KEY, serde_json::to_string(&self.weekly)?)?;
        store.set(TODAY_SESSIONS_KEY, serde_json::to_string(&self.daily)?)?;
        match &self.last_record_date {
            Some(date) => store.set(LAST_RECORD_DATE_KEY, date.clone())?,
            None => store.remove(LAST_RECORD_DATE_KEY)?,
        }
        Ok(())
    }

    fn read(store: &dyn KeyValueStore) -> Self {
        let weekly = parse_json::<BTreeMap<String, f64>>(store, FOCUS_HISTORY_KEY)
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, minutes)| minutes.is_finite() && *minutes >= 0.)
            .collect();
        let daily = parse_json::<Vec<FocusRecord>>(store, TODAY_SESSIONS_KEY)
            .unwrap_or_default()
            .into_iter()
            .filter(|record| record.duration.is_finite() && record.duration >= 0.)
            .collect();
        History {
            weekly,
            daily,
            last_record_date: store.get(LAST_RECORD_DATE_KEY),
        }
    }
}

impl Entity for TaskList {
    fn write(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        store.set(TASKS_KEY, serde_json::to_string(self)?)
    }

    fn read(store: &dyn KeyValueStore) -> Self {
        TaskList::new(parse_json::<Vec<Task>>(store, TASKS_KEY).unwrap_or_default())
    }
}

fn parse_field<T: FromStr>(store: &dyn KeyValueStore, key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let value = store.get(key)?;
    value
        .trim()
        .parse::<T>()
        .inspect_err(|e| warn!("Ignoring malformed {key} value {value:?}: {e}"))
        .ok()
}

fn parse_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let value = store.get(key)?;
    serde_json::from_str(&value)
        .inspect_err(|e| warn!("Ignoring malformed {key} value: {e}"))
        .ok()
}
