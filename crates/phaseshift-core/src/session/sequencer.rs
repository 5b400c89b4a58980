//! Pomodoro phase sequencer.
//!
//! Cycles Work → break → Work over three countdown engines, one per phase
//! kind, and counts completed work units until the session is exhausted.
//!
//! ## Transitions
//!
//! ```text
//! Work --(units < total)--> ShortBreak | LongBreak --> Work
//! Work --(units == total)--> completed (stays on Work, stopped)
//! ```
//!
//! A long break follows every `work_units_before_long_break`-th unit.
//!
//! ## Locking
//!
//! Session state sits behind one mutex. Engine shutdowns are retired while it
//! is held and settled after it is released; events are emitted next. After
//! a transition the next phase's engine starts only once its `PhaseCompleted`
//! has been delivered, and only if no observer stopped or moved the session
//! meanwhile. No callback ever runs with the session lock held, so callbacks
//! and observers may call back into the sequencer.

use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::phase::{Phase, PhaseMap};
use super::plan::SessionPlan;
use super::settings::PomodoroSettings;
use crate::error::Result;
use crate::events::{Event, EventBus, SubscriptionId};
use crate::timer::{lock, progress, Countdown, Halt, RunId, TimerOptions};

/// Tick forwarded from the engine of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseTick {
    pub phase: Phase,
    pub elapsed: Duration,
    pub remaining: Duration,
    /// Within `0.0..=1.0`.
    pub progress: f64,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub settings: PomodoroSettings,
    pub phase: Phase,
    pub work_units_completed: u32,
    pub is_running: bool,
    pub is_completed: bool,
    pub phase_duration: Duration,
    pub elapsed_in_phase: Duration,
    pub remaining_in_phase: Duration,
    pub progress_in_phase: f64,
    pub session_duration: Duration,
    pub elapsed_in_session: Duration,
    pub remaining_in_session: Duration,
}

struct SessionState {
    settings: PomodoroSettings,
    phase: Phase,
    work_units_completed: u32,
    is_running: bool,
    /// Run whose natural completion advances the session.
    active_run: Option<RunId>,
}

impl SessionState {
    fn is_completed(&self) -> bool {
        self.work_units_completed >= self.settings.total_work_units
    }
}

struct Shared {
    engines: PhaseMap<Countdown>,
    state: Mutex<SessionState>,
    events: EventBus,
    on_tick: Arc<dyn Fn(PhaseTick) + Send + Sync>,
}

/// Work collected under the session lock and finished after releasing it.
#[derive(Default)]
struct Outcome<'a> {
    halts: Vec<Halt<'a>>,
    events: Vec<Event>,
    /// Phase to start once the events are out.
    restart: Option<Phase>,
}

impl Outcome<'_> {
    fn finish(self, shared: &Shared) {
        for halt in self.halts {
            halt.settle();
        }
        shared.events.emit(self.events);
        if let Some(phase) = self.restart {
            shared.resume(phase);
        }
    }
}

/// Drives a pomodoro session. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct PomodoroSequencer {
    shared: Arc<Shared>,
}

impl PomodoroSequencer {
    /// Creates a sequencer on the current tokio runtime.
    pub fn new<F>(settings: PomodoroSettings, on_tick: F) -> Result<Self>
    where
        F: Fn(PhaseTick) + Send + Sync + 'static,
    {
        Self::with_options(settings, on_tick, TimerOptions::default())
    }

    pub fn with_options<F>(settings: PomodoroSettings, on_tick: F, options: TimerOptions) -> Result<Self>
    where
        F: Fn(PhaseTick) + Send + Sync + 'static,
    {
        settings.validate()?;

        let link: Arc<OnceLock<Weak<Shared>>> = Arc::new(OnceLock::new());
        let engine = |phase: Phase| {
            let on_tick_link = Arc::clone(&link);
            let on_complete_link = Arc::clone(&link);
            Countdown::with_options(
                settings.phase_duration(phase),
                move |elapsed| {
                    if let Some(shared) = on_tick_link.get().and_then(Weak::upgrade) {
                        shared.forward_tick(phase, elapsed);
                    }
                },
                move |run| {
                    if let Some(shared) = on_complete_link.get().and_then(Weak::upgrade) {
                        shared.phase_finished(phase, run);
                    }
                },
                options.clone(),
            )
        };
        let engines = PhaseMap::new(
            engine(Phase::Work)?,
            engine(Phase::ShortBreak)?,
            engine(Phase::LongBreak)?,
        );

        let shared = Arc::new(Shared {
            engines,
            state: Mutex::new(SessionState {
                settings,
                phase: Phase::Work,
                work_units_completed: 0,
                is_running: false,
                active_run: None,
            }),
            events: EventBus::default(),
            on_tick: Arc::new(on_tick),
        });
        let _ = link.set(Arc::downgrade(&shared));
        Ok(Self { shared })
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Registers an observer called for every event, off any internal lock.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(Arc::new(observer))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// A receiver for every event emitted from now on.
    pub fn events(&self) -> mpsc::UnboundedReceiver<Event> {
        self.shared.events.channel()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> PomodoroSettings {
        lock(&self.shared.state).settings
    }

    pub fn current_phase(&self) -> Phase {
        lock(&self.shared.state).phase
    }

    pub fn work_units_completed(&self) -> u32 {
        lock(&self.shared.state).work_units_completed
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.state).is_running
    }

    pub fn is_completed(&self) -> bool {
        lock(&self.shared.state).is_completed()
    }

    /// Duration currently configured on the engine of `phase`.
    pub fn phase_duration(&self, phase: Phase) -> Duration {
        self.shared.engines[phase].duration()
    }

    pub fn elapsed_in_current_phase(&self) -> Duration {
        self.active_engine().elapsed()
    }

    pub fn remaining_in_current_phase(&self) -> Duration {
        self.active_engine().remaining()
    }

    pub fn progress_in_current_phase(&self) -> f64 {
        self.active_engine().progress()
    }

    /// Length of a full session under the current settings.
    pub fn session_duration(&self) -> Duration {
        self.settings().session_duration()
    }

    /// Completed phases, recomputed from the current settings, plus the
    /// elapsed time of the active phase.
    pub fn elapsed_in_session(&self) -> Duration {
        let st = lock(&self.shared.state);
        self.shared.elapsed_in_session(&st)
    }

    pub fn remaining_in_session(&self) -> Duration {
        let st = lock(&self.shared.state);
        st.settings
            .session_duration()
            .saturating_sub(self.shared.elapsed_in_session(&st))
    }

    pub fn plan(&self) -> Result<SessionPlan> {
        Ok(SessionPlan::for_settings(&self.settings())?)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let st = lock(&self.shared.state);
        let engine = &self.shared.engines[st.phase];
        let phase_duration = engine.duration();
        let elapsed_in_phase = engine.elapsed();
        let session_duration = st.settings.session_duration();
        let elapsed_in_session = self.shared.elapsed_in_session(&st);
        SessionSnapshot {
            settings: st.settings,
            phase: st.phase,
            work_units_completed: st.work_units_completed,
            is_running: st.is_running,
            is_completed: st.is_completed(),
            phase_duration,
            elapsed_in_phase,
            remaining_in_phase: phase_duration.saturating_sub(elapsed_in_phase),
            progress_in_phase: progress(elapsed_in_phase, phase_duration),
            session_duration,
            elapsed_in_session,
            remaining_in_session: session_duration.saturating_sub(elapsed_in_session),
        }
    }

    fn active_engine(&self) -> &Countdown {
        let phase = self.current_phase();
        &self.shared.engines[phase]
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Starts the engine of the current phase. A completed session is reset
    /// first. Returns `false` when already running.
    pub fn start_active_timer(&self) -> bool {
        let shared = &*self.shared;
        let mut outcome = Outcome::default();
        {
            let mut st = lock(&shared.state);
            if st.is_running {
                return false;
            }
            if st.is_completed() {
                shared.reset_session_locked(&mut st, &mut outcome);
            }
            st.is_running = true;
            st.active_run = shared.start_engine(st.phase);
            tracing::info!(phase = %st.phase, work_units_completed = st.work_units_completed, "timer started");
            outcome.events.push(Event::TimerStarted {
                phase: st.phase,
                work_units_completed: st.work_units_completed,
                at: Utc::now(),
            });
        }
        outcome.finish(shared);
        true
    }

    /// Stops the active engine, keeping phase and elapsed time. Returns
    /// `false` when not running.
    pub fn stop_active_timer(&self) -> bool {
        let shared = &*self.shared;
        let mut outcome = Outcome::default();
        {
            let mut st = lock(&shared.state);
            if !st.is_running {
                return false;
            }
            st.is_running = false;
            let halt = shared.engines[st.phase].halt();
            let had_run = st.active_run.take().is_some();
            let in_flight = had_run && halt.run().is_none();
            outcome.halts.push(halt);
            if in_flight {
                // The run reached its limit but its completion has not been
                // applied yet. Apply it now; the late report is then stale.
                tracing::debug!(phase = %st.phase, "completion applied by stop");
                shared.advance(&mut st, false, &mut outcome);
            }
            let elapsed = shared.engines[st.phase].elapsed();
            tracing::info!(phase = %st.phase, ?elapsed, "timer stopped");
            outcome.events.push(Event::TimerStopped {
                phase: st.phase,
                elapsed_ms: elapsed.as_millis().try_into().unwrap_or(u64::MAX),
                at: Utc::now(),
            });
        }
        outcome.finish(shared);
        true
    }

    /// Ends the current phase early and applies the transition rule.
    /// Returns `false` (and does nothing) once the session is completed.
    pub fn skip_active_timer(&self) -> bool {
        let shared = &*self.shared;
        let mut outcome = Outcome::default();
        {
            let mut st = lock(&shared.state);
            if st.is_completed() {
                return false;
            }
            outcome.halts.push(shared.engines[st.phase].halt_and_clear());
            st.active_run = None;
            shared.advance(&mut st, true, &mut outcome);
        }
        outcome.finish(shared);
        true
    }

    /// Zeroes the current phase and stops. Phase and work units are kept.
    pub fn reset_active_timer(&self) {
        let shared = &*self.shared;
        let mut outcome = Outcome::default();
        {
            let mut st = lock(&shared.state);
            outcome.halts.push(shared.engines[st.phase].halt_and_clear());
            st.is_running = false;
            st.active_run = None;
            tracing::info!(phase = %st.phase, "phase reset");
            outcome.events.push(Event::PhaseReset {
                phase: st.phase,
                at: Utc::now(),
            });
        }
        outcome.finish(shared);
    }

    /// Back to the first work unit, stopped.
    pub fn reset_session(&self) {
        let shared = &*self.shared;
        let mut outcome = Outcome::default();
        {
            let mut st = lock(&shared.state);
            shared.reset_session_locked(&mut st, &mut outcome);
        }
        outcome.finish(shared);
    }

    /// Applies a new settings snapshot.
    ///
    /// Validation happens first; an invalid snapshot changes nothing. A
    /// shortened current phase that is already past its new duration
    /// completes on the spot. A total below the units already done (counting
    /// the work unit in progress) completes the session.
    pub fn update_settings(&self, settings: PomodoroSettings) -> Result<()> {
        if let Err(err) = settings.validate() {
            tracing::warn!(field = %err.field(), error = %err, "settings rejected");
            return Err(err.into());
        }

        let shared = &*self.shared;
        let mut outcome = Outcome::default();
        {
            let mut st = lock(&shared.state);
            let previous = st.settings;

            st.settings.work_duration_seconds = settings.work_duration_seconds;
            st.settings.short_break_duration_seconds = settings.short_break_duration_seconds;
            st.settings.long_break_duration_seconds = settings.long_break_duration_seconds;
            let mut forced = false;
            for phase in Phase::ALL {
                let duration = settings.phase_duration(phase);
                if duration == previous.phase_duration(phase) {
                    continue;
                }
                if let Some(halt) = shared.engines[phase].retarget(duration)? {
                    forced |= phase == st.phase;
                    outcome.halts.push(halt);
                }
            }
            if forced {
                st.active_run = None;
                shared.advance(&mut st, false, &mut outcome);
            }

            st.settings.work_units_before_long_break = settings.work_units_before_long_break;

            let was_completed = st.is_completed();
            st.settings.total_work_units = settings.total_work_units;
            st.work_units_completed = st.work_units_completed.min(settings.total_work_units);
            if !was_completed && st.is_completed() {
                outcome.halts.push(shared.engines[st.phase].halt_and_clear());
                st.is_running = false;
                st.active_run = None;
                tracing::info!(
                    total_work_units = settings.total_work_units,
                    "session completed by settings change"
                );
                outcome.events.push(Event::SessionCompleted {
                    work_units_completed: st.work_units_completed,
                    total_work_units: settings.total_work_units,
                    at: Utc::now(),
                });
            }

            st.settings = settings;
            tracing::info!(?settings, "settings updated");
            outcome.events.push(Event::SettingsUpdated {
                settings,
                at: Utc::now(),
            });
        }
        outcome.finish(shared);
        Ok(())
    }
}

impl std::fmt::Debug for PomodoroSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PomodoroSequencer").field(&self.snapshot()).finish()
    }
}

impl Shared {
    fn start_engine(&self, phase: Phase) -> Option<RunId> {
        let engine = &self.engines[phase];
        engine.start().or_else(|| engine.current_run())
    }

    fn elapsed_in_session(&self, st: &SessionState) -> Duration {
        if st.is_completed() {
            return st.settings.session_duration();
        }
        st.settings
            .completed_phases_duration(st.work_units_completed, st.phase)
            + self.engines[st.phase].elapsed()
    }

    fn reset_session_locked<'a>(&'a self, st: &mut SessionState, outcome: &mut Outcome<'a>) {
        for (_, engine) in self.engines.iter() {
            outcome.halts.push(engine.halt_and_clear());
        }
        st.phase = Phase::Work;
        st.work_units_completed = 0;
        st.is_running = false;
        st.active_run = None;
        tracing::info!("session reset");
        outcome.events.push(Event::SessionReset { at: Utc::now() });
    }

    /// Applies the transition rule to the current phase, whose engine has
    /// already been retired.
    fn advance(&self, st: &mut SessionState, was_skipped: bool, outcome: &mut Outcome<'_>) {
        let from = st.phase;
        let was_running = st.is_running;

        if from == Phase::Work {
            st.work_units_completed += 1;
            if st.is_completed() {
                st.is_running = false;
                st.active_run = None;
                tracing::info!(
                    was_skipped,
                    work_units_completed = st.work_units_completed,
                    "session completed"
                );
                let at = Utc::now();
                outcome.events.push(Event::PhaseCompleted {
                    phase: from,
                    next_phase: None,
                    was_skipped,
                    work_units_completed: st.work_units_completed,
                    at,
                });
                outcome.events.push(Event::SessionCompleted {
                    work_units_completed: st.work_units_completed,
                    total_work_units: st.settings.total_work_units,
                    at,
                });
                return;
            }
            st.phase = st.settings.break_after(st.work_units_completed);
        } else {
            st.phase = Phase::Work;
        }

        tracing::info!(
            from = %from,
            to = %st.phase,
            was_skipped,
            work_units_completed = st.work_units_completed,
            "phase completed"
        );
        outcome.events.push(Event::PhaseCompleted {
            phase: from,
            next_phase: Some(st.phase),
            was_skipped,
            work_units_completed: st.work_units_completed,
            at: Utc::now(),
        });
        if was_running {
            outcome.restart = Some(st.phase);
        }
    }

    /// Starts the engine of `phase` after a transition, unless the session
    /// was stopped, moved on or restarted while the events went out.
    fn resume(&self, phase: Phase) {
        let mut st = lock(&self.state);
        if !st.is_running || st.phase != phase || st.active_run.is_some() || st.is_completed() {
            tracing::debug!(%phase, "next phase not started");
            return;
        }
        st.active_run = self.start_engine(phase);
    }

    /// Natural completion of `run` on the engine of `phase`.
    fn phase_finished(&self, phase: Phase, run: RunId) {
        let mut outcome = Outcome::default();
        {
            let mut st = lock(&self.state);
            if st.phase != phase || st.active_run != Some(run) || st.is_completed() {
                tracing::debug!(%phase, %run, "stale completion ignored");
                return;
            }
            st.active_run = None;
            self.advance(&mut st, false, &mut outcome);
        }
        outcome.finish(self);
    }

    fn forward_tick(&self, phase: Phase, elapsed: Duration) {
        let duration = self.engines[phase].duration();
        (self.on_tick)(PhaseTick {
            phase,
            elapsed,
            remaining: duration.saturating_sub(elapsed),
            progress: progress(elapsed, duration),
        });
    }
}
