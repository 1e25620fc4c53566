use std::io::Write;

use ansi_term::Colour;
use anyhow::Result;

use crate::history::{entities::SeriesPoint, IN_PROGRESS_LABEL};

const BAR_WIDTH: usize = 40;
const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Draw below whatever is already on screen.
    Animated,
    /// Replace the previous drawing.
    Immediate,
}

/// Consumer of the computed history series.
pub trait ChartAdapter {
    fn redraw(
        &mut self,
        weekly: &[SeriesPoint],
        daily: &[SeriesPoint],
        transition: Transition,
    ) -> Result<()>;
}

/// Draws both series as horizontal bars.
pub struct TextChart<W: Write> {
    out: W,
    colored: bool,
}

impl<W: Write> TextChart<W> {
    pub fn new(out: W, colored: bool) -> Self {
        Self { out, colored }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, colour: Colour, text: String) -> String {
        if self.colored {
            colour.paint(text).to_string()
        } else {
            text
        }
    }

    fn bars(&mut self, points: &[SeriesPoint], format: fn(f64) -> String) -> Result<()> {
        // Never scale below one hour so a single short session doesn't fill the whole width.
        let scale = points.iter().map(|p| p.minutes).fold(60., f64::max);
        for point in points {
            let width = ((point.minutes / scale) * BAR_WIDTH as f64).round() as usize;
            let colour = if point.label == IN_PROGRESS_LABEL {
                Colour::Cyan
            } else {
                Colour::Purple
            };
            let bar = self.paint(colour, "█".repeat(width));
            writeln!(
                self.out,
                "{:>11} {bar}{} {}",
                point.label,
                " ".repeat(BAR_WIDTH - width.min(BAR_WIDTH)),
                format(point.minutes)
            )?;
        }
        Ok(())
    }
}

impl<W: Write> ChartAdapter for TextChart<W> {
    fn redraw(
        &mut self,
        weekly: &[SeriesPoint],
        daily: &[SeriesPoint],
        transition: Transition,
    ) -> Result<()> {
        if transition == Transition::Immediate {
            write!(self.out, "{CLEAR_SCREEN}")?;
        }
        let title = self.paint(Colour::White, "Last 7 days".into());
        writeln!(self.out, "{title}")?;
        self.bars(weekly, format_hours)?;
        writeln!(self.out)?;

        let title = self.paint(Colour::White, "Today".into());
        writeln!(self.out, "{title}")?;
        if daily.is_empty() {
            writeln!(self.out, "{:>11} no focus sessions yet", "")?;
        } else {
            self.bars(daily, format_minutes)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

fn format_hours(minutes: f64) -> String {
    format!("{:.1}h", minutes / 60.)
}

fn format_minutes(minutes: f64) -> String {
    format!("{minutes:.1}m")
}
