//! Run-loop core shared by the stopwatch and countdown engines.
//!
//! An [`Engine`] measures elapsed monotonic time and, while a run is active,
//! drives its tick callback from a task spawned on a tokio runtime.
//!
//! ## Run lifecycle
//!
//! ```text
//! Stopped --start--> Running --(stop | reset | limit reached | linked cancel)--> Stopped
//! ```
//!
//! Each start allocates a [`RunId`] and a fresh cancellation token. A loop
//! only acts while its id is the active one, so a retired run can never
//! tick, complete or cancel a later run.
//!
//! ## Locking
//!
//! `state` guards the clock, the active run and the limit. It is never held
//! while a callback runs. `dispatch` is held for the whole of each tick
//! callback. Stopping is two-phase: the run is retired under `state`
//! (producing a [`Halt`]), then [`Halt::settle`] waits on `dispatch` so that
//! no tick of the retired run is still executing when it returns.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::options::ResolvedOptions;
use super::run::{is_dispatching, isolate, lock, next_engine_id, DispatchScope, RunId};

pub(crate) type TickFn = Arc<dyn Fn(Duration) + Send + Sync>;
pub(crate) type CompleteFn = Arc<dyn Fn(RunId) + Send + Sync>;

/// Accumulated time plus the instant of the last resume.
#[derive(Debug, Default, Clone, Copy)]
struct Clock {
    accumulated: Duration,
    resumed_at: Option<Instant>,
}

impl Clock {
    fn read(&self, now: Instant) -> Duration {
        match self.resumed_at {
            Some(since) => self.accumulated + now.saturating_duration_since(since),
            None => self.accumulated,
        }
    }

    fn resume(&mut self, now: Instant) {
        self.resumed_at.get_or_insert(now);
    }

    fn pause(&mut self, now: Instant) {
        self.accumulated = self.read(now);
        self.resumed_at = None;
    }
}

struct ActiveRun {
    id: RunId,
    cancel: CancellationToken,
}

struct State {
    clock: Clock,
    active: Option<ActiveRun>,
    /// Elapsed time at which a run completes. `Duration::MAX` never completes.
    limit: Duration,
}

impl State {
    fn is_current(&self, run: RunId) -> bool {
        self.active.as_ref().is_some_and(|active| active.id == run)
    }
}

enum Poll {
    Retired,
    Running { until_limit: Duration },
    LimitReached,
}

pub(crate) struct Engine {
    id: u64,
    state: Mutex<State>,
    dispatch: Mutex<()>,
    interval: Duration,
    runtime: Handle,
    on_tick: TickFn,
    on_complete: Option<CompleteFn>,
}

impl Engine {
    pub(crate) fn new(
        options: ResolvedOptions,
        limit: Duration,
        on_tick: TickFn,
        on_complete: Option<CompleteFn>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: next_engine_id(),
            state: Mutex::new(State {
                clock: Clock::default(),
                active: None,
                limit,
            }),
            dispatch: Mutex::new(()),
            interval: options.interval,
            runtime: options.runtime,
            on_tick,
            on_complete,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Elapsed time of the current or last run, never beyond the limit.
    pub(crate) fn elapsed(&self) -> Duration {
        let state = lock(&self.state);
        state.clock.read(Instant::now()).min(state.limit)
    }

    pub(crate) fn is_running(&self) -> bool {
        lock(&self.state).active.is_some()
    }

    pub(crate) fn current_run(&self) -> Option<RunId> {
        lock(&self.state).active.as_ref().map(|active| active.id)
    }

    pub(crate) fn limit(&self) -> Duration {
        lock(&self.state).limit
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Starts a new run unless one is active.
    ///
    /// With a `parent` token the run's token is a child of it, so cancelling
    /// the parent ends the run while stopping the run leaves the parent alone.
    pub(crate) fn start(self: &Arc<Self>, parent: Option<&CancellationToken>) -> Option<RunId> {
        let (run, cancel) = {
            let mut state = lock(&self.state);
            if state.active.is_some() {
                return None;
            }
            let run = RunId::next();
            let cancel = parent.map_or_else(CancellationToken::new, CancellationToken::child_token);
            state.clock.resume(Instant::now());
            state.active = Some(ActiveRun {
                id: run,
                cancel: cancel.clone(),
            });
            (run, cancel)
        };
        tracing::debug!(engine = self.id, %run, "run started");
        self.runtime
            .spawn(Self::run_loop(Arc::downgrade(self), run, cancel));
        Some(run)
    }

    /// Retires the active run and pauses the clock.
    pub(crate) fn halt(&self) -> Halt<'_> {
        let retired = {
            let mut state = lock(&self.state);
            state.clock.pause(Instant::now());
            state.active.take()
        };
        self.retiring(retired, false)
    }

    /// Retires the active run and zeroes the clock. Settling delivers the
    /// zero tick.
    pub(crate) fn halt_and_clear(&self) -> Halt<'_> {
        let retired = {
            let mut state = lock(&self.state);
            state.clock = Clock::default();
            state.active.take()
        };
        self.retiring(retired, true)
    }

    /// Moves the limit. Returns a clearing [`Halt`] when a run is active and
    /// has already reached the new limit.
    pub(crate) fn retarget(&self, limit: Duration) -> Option<Halt<'_>> {
        let retired = {
            let mut state = lock(&self.state);
            state.limit = limit;
            if state.active.is_none() || state.clock.read(Instant::now()) < limit {
                return None;
            }
            state.clock = Clock::default();
            state.active.take()
        };
        Some(self.retiring(retired, true))
    }

    /// Invokes the completion callback for `run`, if one is installed.
    pub(crate) fn fire_completion(&self, run: RunId) {
        if let Some(on_complete) = &self.on_complete {
            isolate("completion", || on_complete(run));
        }
    }

    fn retiring(&self, retired: Option<ActiveRun>, zero_tick: bool) -> Halt<'_> {
        let run = retired.map(|active| {
            active.cancel.cancel();
            active.id
        });
        Halt {
            engine: self,
            run,
            zero_tick,
        }
    }

    // ── Run loop ─────────────────────────────────────────────────────

    /// Holds only a weak reference between iterations so dropping the last
    /// handle ends the loop.
    async fn run_loop(engine: Weak<Self>, run: RunId, cancel: CancellationToken) {
        loop {
            let wait = {
                let Some(engine) = engine.upgrade() else {
                    return;
                };
                if cancel.is_cancelled() {
                    engine.end_cancelled(run);
                    return;
                }
                match engine.poll(run) {
                    Poll::Retired => return,
                    Poll::LimitReached => {
                        tracing::debug!(engine = engine.id, %run, "limit reached");
                        engine.fire_completion(run);
                        return;
                    }
                    Poll::Running { until_limit } => {
                        engine.dispatch_tick(run);
                        engine.interval.min(until_limit)
                    }
                }
            };
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn poll(&self, run: RunId) -> Poll {
        let mut state = lock(&self.state);
        if !state.is_current(run) {
            return Poll::Retired;
        }
        let elapsed = state.clock.read(Instant::now());
        if elapsed >= state.limit {
            state.active = None;
            state.clock = Clock::default();
            return Poll::LimitReached;
        }
        Poll::Running {
            until_limit: state.limit - elapsed,
        }
    }

    fn dispatch_tick(&self, run: RunId) {
        let _gate = lock(&self.dispatch);
        let elapsed = {
            let state = lock(&self.state);
            if !state.is_current(run) {
                return;
            }
            state.clock.read(Instant::now()).min(state.limit)
        };
        let _scope = DispatchScope::enter(self.id);
        isolate("tick", || (self.on_tick)(elapsed));
    }

    /// A linked token was cancelled from outside: end the run like a stop.
    fn end_cancelled(&self, run: RunId) {
        let mut state = lock(&self.state);
        if state.is_current(run) {
            state.clock.pause(Instant::now());
            state.active = None;
            tracing::debug!(engine = self.id, %run, "run cancelled by linked token");
        }
    }

    fn emit_zero_tick(&self) {
        isolate("tick", || (self.on_tick)(Duration::ZERO));
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(active) = state.active.take() {
            active.cancel.cancel();
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("elapsed", &self.elapsed())
            .field("running", &self.is_running())
            .finish()
    }
}

/// A run retired under the state lock whose shutdown still has to be
/// finalized by [`Halt::settle`], outside any caller-held lock.
#[must_use = "a halted engine must be settled"]
pub(crate) struct Halt<'a> {
    engine: &'a Engine,
    run: Option<RunId>,
    zero_tick: bool,
}

impl Halt<'_> {
    /// The run that was retired, if one was active.
    pub(crate) fn run(&self) -> Option<RunId> {
        self.run
    }

    /// Blocks until no tick of the retired run is executing, then delivers
    /// the zero tick of a reset.
    pub(crate) fn settle(self) {
        if self.run.is_none() && !self.zero_tick {
            return;
        }
        if let Some(run) = self.run {
            tracing::debug!(engine = self.engine.id, %run, "run retired");
        }
        if is_dispatching(self.engine.id) {
            // Called from this engine's own tick callback, which holds the gate.
            if self.zero_tick {
                self.engine.emit_zero_tick();
            }
            return;
        }
        let _gate = lock(&self.engine.dispatch);
        if self.zero_tick {
            let _scope = DispatchScope::enter(self.engine.id);
            self.engine.emit_zero_tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_accumulates_across_pauses() {
        let t0 = Instant::now();
        let mut clock = Clock::default();
        clock.resume(t0);
        clock.pause(t0 + Duration::from_millis(40));
        assert_eq!(clock.read(t0 + Duration::from_secs(5)), Duration::from_millis(40));
        clock.resume(t0 + Duration::from_millis(100));
        assert_eq!(
            clock.read(t0 + Duration::from_millis(130)),
            Duration::from_millis(70)
        );
    }

    #[test]
    fn resume_keeps_first_instant() {
        let t0 = Instant::now();
        let mut clock = Clock::default();
        clock.resume(t0);
        clock.resume(t0 + Duration::from_millis(10));
        assert_eq!(
            clock.read(t0 + Duration::from_millis(20)),
            Duration::from_millis(20)
        );
    }
}
