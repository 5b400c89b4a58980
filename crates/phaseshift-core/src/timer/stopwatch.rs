//! Elapsed-time engine.
//!
//! ## Usage
//!
//! ```ignore
//! let watch = Stopwatch::new(|elapsed| println!("{elapsed:?}"))?;
//! watch.start();
//! // ... later, from any thread:
//! watch.stop(); // no tick fires after this returns
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::engine::Engine;
use super::options::TimerOptions;
use super::run::RunId;
use crate::error::TimerError;

/// Measures elapsed time and invokes a tick callback at a fixed interval
/// while running.
///
/// The handle is cheap to clone; clones control the same engine. The loop
/// ends when the last handle is dropped.
#[derive(Clone)]
pub struct Stopwatch {
    engine: Arc<Engine>,
}

impl Stopwatch {
    /// Creates a stopwatch with the default 10 ms interval on the current
    /// tokio runtime.
    pub fn new<F>(on_tick: F) -> Result<Self, TimerError>
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        Self::with_options(on_tick, TimerOptions::default())
    }

    pub fn with_options<F>(on_tick: F, options: TimerOptions) -> Result<Self, TimerError>
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        let options = options.resolve()?;
        Ok(Self {
            engine: Engine::new(options, Duration::MAX, Arc::new(on_tick), None),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn elapsed(&self) -> Duration {
        self.engine.elapsed()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Id of the active run, `None` while stopped.
    pub fn current_run(&self) -> Option<RunId> {
        self.engine.current_run()
    }

    pub fn interval(&self) -> Duration {
        self.engine.interval()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Starts a new run. Returns `None` without side effects when already
    /// running.
    pub fn start(&self) -> Option<RunId> {
        self.engine.start(None)
    }

    /// Like [`start`](Self::start), but the run also ends when `token` is
    /// cancelled. Stopping the stopwatch does not cancel `token`.
    pub fn start_linked(&self, token: &CancellationToken) -> Option<RunId> {
        self.engine.start(Some(token))
    }

    /// Stops the active run, keeping the elapsed time.
    ///
    /// Blocks until any in-flight tick of the run has returned. Returns
    /// `false` when nothing was running.
    pub fn stop(&self) -> bool {
        let halt = self.engine.halt();
        let stopped = halt.run().is_some();
        halt.settle();
        stopped
    }

    /// Stops any active run, zeroes the elapsed time and delivers exactly
    /// one tick with zero.
    pub fn reset(&self) {
        self.engine.halt_and_clear().settle();
    }
}

impl fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Stopwatch").field(&self.engine).finish()
    }
}
