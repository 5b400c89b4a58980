//! Countdown engine.
//!
//! A [`Countdown`] is a stopwatch with a target duration. The run completes
//! when the elapsed time reaches the duration: the engine stops, zeroes its
//! elapsed time and invokes the completion callback exactly once for that
//! run. No tick is delivered for a run after its completion.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::engine::{Engine, Halt};
use super::options::TimerOptions;
use super::run::RunId;
use crate::error::TimerError;

/// Outcome of [`Countdown::set_duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationChange {
    /// The target moved; a running countdown keeps running.
    Updated,
    /// The running countdown had already reached the new target and was
    /// completed on the spot.
    ForcedCompletion,
}

#[derive(Clone)]
pub struct Countdown {
    engine: Arc<Engine>,
}

impl Countdown {
    /// Creates a countdown with the default 10 ms interval on the current
    /// tokio runtime.
    ///
    /// `on_complete` receives the id of the run that completed.
    pub fn new<T, C>(duration: Duration, on_tick: T, on_complete: C) -> Result<Self, TimerError>
    where
        T: Fn(Duration) + Send + Sync + 'static,
        C: Fn(RunId) + Send + Sync + 'static,
    {
        Self::with_options(duration, on_tick, on_complete, TimerOptions::default())
    }

    pub fn with_options<T, C>(
        duration: Duration,
        on_tick: T,
        on_complete: C,
        options: TimerOptions,
    ) -> Result<Self, TimerError>
    where
        T: Fn(Duration) + Send + Sync + 'static,
        C: Fn(RunId) + Send + Sync + 'static,
    {
        if duration.is_zero() {
            return Err(TimerError::InvalidDuration(duration));
        }
        let options = options.resolve()?;
        Ok(Self {
            engine: Engine::new(options, duration, Arc::new(on_tick), Some(Arc::new(on_complete))),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn duration(&self) -> Duration {
        self.engine.limit()
    }

    /// Elapsed time of the current run, never beyond [`duration`](Self::duration).
    pub fn elapsed(&self) -> Duration {
        self.engine.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.duration().saturating_sub(self.elapsed())
    }

    /// Fraction of the duration elapsed, within `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        progress(self.elapsed(), self.duration())
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn current_run(&self) -> Option<RunId> {
        self.engine.current_run()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&self) -> Option<RunId> {
        self.engine.start(None)
    }

    pub fn start_linked(&self, token: &CancellationToken) -> Option<RunId> {
        self.engine.start(Some(token))
    }

    /// Stops the active run, keeping the elapsed time. Returns `false` when
    /// nothing was running.
    pub fn stop(&self) -> bool {
        let halt = self.engine.halt();
        let stopped = halt.run().is_some();
        halt.settle();
        stopped
    }

    pub fn reset(&self) {
        self.engine.halt_and_clear().settle();
    }

    /// Changes the target duration.
    ///
    /// When running and the elapsed time has already reached `duration`, the
    /// countdown is reset (one zero tick) and its completion callback is
    /// invoked before this returns. A zero duration is rejected and the
    /// previous one kept.
    pub fn set_duration(&self, duration: Duration) -> Result<DurationChange, TimerError> {
        match self.retarget(duration)? {
            None => Ok(DurationChange::Updated),
            Some(halt) => {
                let run = halt.run();
                halt.settle();
                if let Some(run) = run {
                    self.engine.fire_completion(run);
                }
                Ok(DurationChange::ForcedCompletion)
            }
        }
    }

    // ── Crate-internal two-phase operations ─────────────────────────

    /// Moves the target without invoking completion. A returned [`Halt`]
    /// means the active run reached the new target and was retired.
    pub(crate) fn retarget(&self, duration: Duration) -> Result<Option<Halt<'_>>, TimerError> {
        if duration.is_zero() {
            return Err(TimerError::InvalidDuration(duration));
        }
        let halt = self.engine.retarget(duration);
        if halt.is_some() {
            tracing::debug!(?duration, "duration change forced completion");
        }
        Ok(halt)
    }

    pub(crate) fn halt(&self) -> Halt<'_> {
        self.engine.halt()
    }

    pub(crate) fn halt_and_clear(&self) -> Halt<'_> {
        self.engine.halt_and_clear()
    }
}

impl fmt::Debug for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Countdown")
            .field("duration", &self.duration())
            .field("engine", &self.engine)
            .finish()
    }
}

pub(crate) fn progress(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
}
