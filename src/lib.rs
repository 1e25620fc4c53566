//! Pomodoro timer for the terminal. Focus phases alternate with short and long breaks, finished
//! focus time is kept as a per-day history, and a small task list lives next to the timer.
//! Everything is persisted after each change, so a countdown keeps going between invocations.

pub mod chart;
pub mod cli;
pub mod history;
pub mod network;
pub mod notify;
pub mod session;
pub mod storage;
pub mod tasks;
pub mod timer;
pub mod utils;
