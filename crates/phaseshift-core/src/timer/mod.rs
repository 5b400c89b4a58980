mod countdown;
mod engine;
mod options;
mod run;
mod stopwatch;

pub use countdown::{Countdown, DurationChange};
pub use options::{TimerOptions, DEFAULT_TICK_INTERVAL};
pub use run::RunId;
pub use stopwatch::Stopwatch;

pub(crate) use countdown::progress;
pub(crate) use engine::Halt;
pub(crate) use run::{isolate, lock};
