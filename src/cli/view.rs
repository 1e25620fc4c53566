use std::io::Write;

use ansi_term::Colour;
use anyhow::Result;

use crate::{
    chart::{ChartAdapter, TextChart, Transition},
    history::{entities::SeriesPoint, is_recordable},
    network::NetworkStatus,
    session::{runner::SessionView, SessionStatus},
    tasks::TaskList,
    timer::{Phase, TimerEvent},
    utils::time::{format_clock, format_countdown, format_date},
};

/// Presents a session on a terminal. When `live` is set the status line is rewritten in place
/// every refresh instead of being printed once.
pub struct TerminalView<W: Write> {
    out: W,
    colored: bool,
    live: bool,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, colored: bool, live: bool) -> Self {
        Self {
            out,
            colored,
            live,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Draws the history chart. `transition` decides whether the previous screen is kept.
    pub fn history(
        &mut self,
        weekly: &[SeriesPoint],
        daily: &[SeriesPoint],
        transition: Transition,
    ) -> Result<()> {
        self.end_status_line()?;
        TextChart::new(&mut self.out, self.colored).redraw(weekly, daily, transition)
    }

    fn end_status_line(&mut self) -> Result<()> {
        if self.live {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn paint(&self, colour: Colour, text: String) -> String {
        if self.colored {
            colour.bold().paint(text).to_string()
        } else {
            text
        }
    }
}

fn phase_colour(phase: Phase) -> Colour {
    match phase {
        Phase::Focus => Colour::Red,
        Phase::ShortBreak => Colour::Green,
        Phase::LongBreak => Colour::Blue,
    }
}

pub fn status_line(status: &SessionStatus, network: Option<&NetworkStatus>) -> String {
    let state = if status.running { "running" } else { "paused" };
    let mut line = format!(
        "{} {} | {} {} {state} | cycle {} | today {:.1} min | {} open tasks",
        format_date(status.now),
        format_clock(status.now),
        status.phase.title(),
        format_countdown(status.seconds_remaining),
        status.cycle_count,
        status.today_minutes,
        status.pending_tasks,
    );
    if let Some(network) = network {
        line.push_str(&format!(" | net {network}"));
    }
    line
}

pub fn event_line(event: &TimerEvent) -> Option<String> {
    let line = match event {
        TimerEvent::Started { phase } => format!("{} started", phase.title()),
        TimerEvent::Paused {
            phase,
            seconds_remaining,
        } => format!(
            "{} paused at {}",
            phase.title(),
            format_countdown(*seconds_remaining)
        ),
        TimerEvent::Ticked { .. } => return None,
        TimerEvent::Completed(change) | TimerEvent::Skipped(change) => {
            let verb = if matches!(event, TimerEvent::Completed(_)) {
                "finished"
            } else {
                "skipped"
            };
            let mut line = format!("{} {verb}, next is {}", change.from.title(), change.to.title());
            match &change.focus {
                Some(focus) if is_recordable(focus.minutes) => line.push_str(&format!(
                    " ({:.1} min recorded at {})",
                    focus.minutes, focus.label
                )),
                Some(_) => line.push_str(" (too short to record)"),
                None => (),
            }
            line
        }
    };
    Some(line)
}

impl<W: Write> SessionView for TerminalView<W> {
    fn status(&mut self, status: &SessionStatus, network: Option<&NetworkStatus>) -> Result<()> {
        let line = self.paint(phase_colour(status.phase), status_line(status, network));
        if self.live {
            // Clear the line, the previous one may have been longer
            write!(self.out, "\r\x1b[2K{line}")?;
        } else {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn event(&mut self, event: &TimerEvent) -> Result<()> {
        let Some(line) = event_line(event) else {
            return Ok(());
        };
        self.end_status_line()?;
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    fn chart(&mut self, weekly: &[SeriesPoint], daily: &[SeriesPoint]) -> Result<()> {
        self.history(weekly, daily, Transition::Animated)
    }

    fn tasks(&mut self, tasks: &TaskList) -> Result<()> {
        self.end_status_line()?;
        if tasks.is_empty() {
            writeln!(self.out, "no tasks")?;
        }
        for task in tasks.iter() {
            let mark = if task.done { "x" } else { " " };
            writeln!(self.out, "[{mark}] {} {}", task.id, task.text)?;
        }
        Ok(())
    }

    fn message(&mut self, text: &str) -> Result<()> {
        self.end_status_line()?;
        writeln!(self.out, "{text}")?;
        Ok(())
    }
}
