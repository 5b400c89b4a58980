//! # PhaseShift Core Library
//!
//! Cancellable interval timing primitives and a pomodoro phase sequencer
//! built on top of them. The `phaseshift` CLI is a thin layer over this
//! crate.
//!
//! ## Architecture
//!
//! - **Stopwatch**: elapsed-time engine that drives a tick callback from a
//!   tokio task while staying start/stop/reset-able from any thread
//! - **Countdown**: a stopwatch with a target duration and an exactly-once
//!   completion callback per run; the duration can change mid-run
//! - **Sequencer**: cycles Work / Short break / Long break over three
//!   countdowns, counts work units and reacts to live settings changes
//! - **Storage**: TOML-based configuration
//! - **Accuracy**: drift measurement of the engines
//!
//! ## Key Components
//!
//! - [`Stopwatch`] and [`Countdown`]: the engines
//! - [`PomodoroSequencer`]: session state machine
//! - [`Event`]: everything the sequencer reports
//! - [`Config`]: application configuration management

pub mod accuracy;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod timer;

pub use accuracy::{AccuracyOptions, AccuracyReport, AccuracyTest, StatisticalTest, Statistics, Subject};
pub use error::{AccuracyError, ConfigError, CoreError, SettingsError, SettingsField, TimerError};
pub use events::{Event, SubscriptionId};
pub use session::{
    Phase, PhaseMap, PhaseTick, PlannedPhase, PomodoroSequencer, PomodoroSettings, SessionPlan,
    SessionSnapshot, MAX_PLANNED_WORK_UNITS,
};
pub use storage::{data_dir, Config, TimerConfig};
pub use timer::{Countdown, DurationChange, RunId, Stopwatch, TimerOptions, DEFAULT_TICK_INTERVAL};
