use std::{str::FromStr, time::Duration};

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    history::{entities::SeriesPoint, is_recordable},
    network::NetworkStatus,
    storage::KeyValueStore,
    tasks::TaskList,
    timer::TimerEvent,
};

use super::{SessionController, SessionStatus};

pub const DISPLAY_REFRESH: Duration = Duration::from_secs(1);

/// A line typed by the user while the session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Toggle,
    Skip,
    Status,
    Chart,
    Tasks,
    AddTask(String),
    ToggleTask(i64),
    RemoveTask(i64),
    Help,
    Quit,
}

pub const HELP: &str = "commands: start, pause, toggle (or empty line), skip, status, chart, \
                        tasks, add <text>, done <id>, rm <id>, quit";

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let id = || {
            rest.trim()
                .parse::<i64>()
                .map_err(|_| anyhow!("Expected a task id, got {rest:?}"))
        };
        match word {
            "" | "t" | "toggle" => Ok(Command::Toggle),
            "s" | "start" => Ok(Command::Start),
            "p" | "pause" => Ok(Command::Pause),
            "k" | "skip" => Ok(Command::Skip),
            "status" => Ok(Command::Status),
            "c" | "chart" => Ok(Command::Chart),
            "tasks" => Ok(Command::Tasks),
            // Text is kept as typed, blank text is ignored later
            "a" | "add" => Ok(Command::AddTask(rest.to_string())),
            "d" | "done" => Ok(Command::ToggleTask(id()?)),
            "rm" | "remove" => Ok(Command::RemoveTask(id()?)),
            "h" | "help" | "?" => Ok(Command::Help),
            "q" | "quit" | "exit" => Ok(Command::Quit),
            _ => Err(anyhow!("Unknown command {word:?}")),
        }
    }
}

/// Whatever presents the session to the user.
pub trait SessionView {
    fn status(&mut self, status: &SessionStatus, network: Option<&NetworkStatus>) -> Result<()>;

    fn event(&mut self, event: &TimerEvent) -> Result<()>;

    fn chart(&mut self, weekly: &[SeriesPoint], daily: &[SeriesPoint]) -> Result<()>;

    fn tasks(&mut self, tasks: &TaskList) -> Result<()>;

    fn message(&mut self, text: &str) -> Result<()>;
}

/// The single event loop of a foreground session. Timer ticks, user commands and display
/// refreshes are handled one at a time.
pub struct SessionRunner<'a, S: KeyValueStore, V: SessionView> {
    controller: &'a mut SessionController<S>,
    view: &'a mut V,
    commands: mpsc::Receiver<Command>,
    network: Option<watch::Receiver<NetworkStatus>>,
    shutdown: CancellationToken,
    refresh_interval: Duration,
}

impl<'a, S: KeyValueStore, V: SessionView> SessionRunner<'a, S, V> {
    pub fn new(
        controller: &'a mut SessionController<S>,
        view: &'a mut V,
        commands: mpsc::Receiver<Command>,
        network: Option<watch::Receiver<NetworkStatus>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            controller,
            view,
            commands,
            network,
            shutdown,
            refresh_interval: DISPLAY_REFRESH,
        }
    }

    /// Runs until shutdown, a quit command, or the command channel closes.
    pub async fn run(self) -> Result<()> {
        let Self {
            controller,
            view,
            mut commands,
            network,
            shutdown,
            refresh_interval,
        } = self;
        let clock = controller.clock();
        let mut next_refresh = clock.instant();

        loop {
            let tick_at = controller.next_tick_at();
            // An overdue tick is handled before any command so a run out countdown completes
            tokio::select! {
                biased;
                _ = clock.sleep_until(tick_at.unwrap_or(next_refresh)), if tick_at.is_some() => {
                    match controller.tick() {
                        Ok(Some(event)) => report(controller, view, &event),
                        Ok(None) => (),
                        Err(e) => error!("Tick failed {e:?}"),
                    }
                }
                _ = shutdown.cancelled() => break,
                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    if command == Command::Quit {
                        break;
                    }
                    debug!("Received command {command:?}");
                    if let Err(e) = execute(controller, view, command) {
                        error!("Command failed {e:?}");
                        if let Err(e) = view.message(&format!("error: {e}")) {
                            debug!("Failed to show error {e:?}");
                        }
                    }
                }
                _ = clock.sleep_until(next_refresh) => {
                    next_refresh += refresh_interval;
                    let network = network.as_ref().map(|receiver| receiver.borrow().clone());
                    if let Err(e) = view.status(&controller.status(), network.as_ref()) {
                        debug!("Failed to draw status {e:?}");
                    }
                }
            }
        }
        info!("Session loop finished");
        Ok(())
    }
}

fn execute<S: KeyValueStore, V: SessionView>(
    controller: &mut SessionController<S>,
    view: &mut V,
    command: Command,
) -> Result<()> {
    let event = match command {
        Command::Start => controller.start()?,
        Command::Pause => controller.pause()?,
        Command::Toggle => controller.toggle()?,
        Command::Skip => Some(controller.skip()?),
        Command::Status => {
            view.status(&controller.status(), None)?;
            None
        }
        Command::Chart => {
            view.chart(&controller.weekly_series(), &controller.daily_series())?;
            None
        }
        Command::Tasks => {
            view.tasks(controller.tasks())?;
            None
        }
        Command::AddTask(text) => {
            match controller.add_task(&text)? {
                Some(id) => view.message(&format!("added task {id}"))?,
                None => debug!("Ignoring empty task"),
            }
            None
        }
        Command::ToggleTask(id) => {
            if !controller.toggle_task(id)? {
                view.message(&format!("no task {id}"))?;
            }
            None
        }
        Command::RemoveTask(id) => {
            if !controller.remove_task(id)? {
                view.message(&format!("no task {id}"))?;
            }
            None
        }
        Command::Help => {
            view.message(HELP)?;
            None
        }
        Command::Quit => None,
    };
    if let Some(event) = event {
        report(controller, view, &event);
    }
    Ok(())
}

fn report<S: KeyValueStore, V: SessionView>(
    controller: &SessionController<S>,
    view: &mut V,
    event: &TimerEvent,
) {
    if matches!(event, TimerEvent::Ticked { .. }) {
        return;
    }
    if let Err(e) = view.event(event) {
        debug!("Failed to show event {e:?}");
    }
    let recorded = event
        .phase_change()
        .and_then(|change| change.focus.as_ref())
        .is_some_and(|focus| is_recordable(focus.minutes));
    if recorded {
        if let Err(e) = view.chart(&controller.weekly_series(), &controller.daily_series()) {
            debug!("Failed to redraw chart {e:?}");
        }
    }
}
