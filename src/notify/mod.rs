use std::io::{self, Write};

use anyhow::Result;

use crate::timer::Phase;

/// What the user is told when a phase runs out.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseNotice {
    pub finished: Phase,
    pub next: Phase,
}

impl PhaseNotice {
    pub fn message(&self) -> &'static str {
        if self.finished == Phase::Focus {
            "Focus finished! Take a break."
        } else {
            "Break over, start a new round!"
        }
    }
}

/// Plays a sound or shows a message at phase completion. Errors are reported to the caller,
/// which ignores them.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier {
    fn notify(&self, notice: &PhaseNotice) -> Result<()>;
}

/// Rings the terminal bell and prints the notice.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: &PhaseNotice) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "\x07{}", notice.message())?;
        stdout.flush()?;
        Ok(())
    }
}

