use std::{fmt::Display, str::FromStr};

use anyhow::anyhow;

pub const FOCUS_SECONDS: u32 = 25 * 60;
pub const SHORT_BREAK_SECONDS: u32 = 5 * 60;
pub const LONG_BREAK_SECONDS: u32 = 15 * 60;

/// Number of focus phases that lead into a long break.
pub const CYCLES_BEFORE_LONG_BREAK: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn nominal_seconds(self) -> u32 {
        match self {
            Phase::Focus => FOCUS_SECONDS,
            Phase::ShortBreak => SHORT_BREAK_SECONDS,
            Phase::LongBreak => LONG_BREAK_SECONDS,
        }
    }

    /// Name used in the persisted timer snapshot.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Focus => "focus",
            Phase::ShortBreak => "short-break",
            Phase::LongBreak => "long-break",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Phase::Focus => "Deep focus",
            Phase::ShortBreak => "Short break",
            Phase::LongBreak => "Long break",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(Phase::Focus),
            "short-break" => Ok(Phase::ShortBreak),
            "long-break" => Ok(Phase::LongBreak),
            _ => Err(anyhow!("Unknown timer mode {s}")),
        }
    }
}
