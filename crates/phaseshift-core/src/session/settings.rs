//! Pomodoro session settings.
//!
//! A [`PomodoroSettings`] value is a plain snapshot. The sequencer validates
//! a snapshot as a whole before storing it and replaces its stored copy on
//! every update, so a half-applied edit is never observable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::phase::{Phase, PhaseMap};
use crate::error::{SettingsError, SettingsField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PomodoroSettings {
    pub work_duration_seconds: u32,
    pub short_break_duration_seconds: u32,
    pub long_break_duration_seconds: u32,
    pub total_work_units: u32,
    pub work_units_before_long_break: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_duration_seconds: 1500,
            short_break_duration_seconds: 300,
            long_break_duration_seconds: 900,
            total_work_units: 12,
            work_units_before_long_break: 4,
        }
    }
}

impl PomodoroSettings {
    /// Checks every bound, reporting the first violated one.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let minimums = [
            (SettingsField::WorkDurationSeconds, self.work_duration_seconds),
            (SettingsField::ShortBreakDurationSeconds, self.short_break_duration_seconds),
            (SettingsField::LongBreakDurationSeconds, self.long_break_duration_seconds),
            (SettingsField::TotalWorkUnits, self.total_work_units),
            (SettingsField::WorkUnitsBeforeLongBreak, self.work_units_before_long_break),
        ];
        for (field, value) in minimums {
            if value < 1 {
                return Err(SettingsError::BelowMinimum {
                    field,
                    min: 1,
                    value,
                });
            }
        }
        if self.short_break_duration_seconds > self.long_break_duration_seconds {
            return Err(SettingsError::ShortBreakExceedsLongBreak {
                short: self.short_break_duration_seconds,
                long: self.long_break_duration_seconds,
            });
        }
        Ok(())
    }

    pub fn phase_duration(&self, phase: Phase) -> Duration {
        let seconds = match phase {
            Phase::Work => self.work_duration_seconds,
            Phase::ShortBreak => self.short_break_duration_seconds,
            Phase::LongBreak => self.long_break_duration_seconds,
        };
        Duration::from_secs(u64::from(seconds))
    }

    pub fn phase_durations(&self) -> PhaseMap<Duration> {
        PhaseMap::from_fn(|phase| self.phase_duration(phase))
    }

    /// Break taken after `work_units_completed` work units (counting from 1).
    pub fn break_after(&self, work_units_completed: u32) -> Phase {
        if work_units_completed % self.work_units_before_long_break.max(1) == 0 {
            Phase::LongBreak
        } else {
            Phase::ShortBreak
        }
    }

    /// Length of a full session: every work unit plus the breaks between them.
    pub fn session_duration(&self) -> Duration {
        let breaks = self.total_work_units.saturating_sub(1);
        self.work_and_breaks(self.total_work_units, breaks)
    }

    /// Time spent in phases already finished, given the sequencer position.
    ///
    /// Recomputed from these settings, so a mid-session edit applies to the
    /// completed phases as well.
    pub fn completed_phases_duration(&self, work_units_completed: u32, current: Phase) -> Duration {
        if work_units_completed >= self.total_work_units {
            return self.session_duration();
        }
        let breaks = match current {
            Phase::Work => work_units_completed,
            Phase::ShortBreak | Phase::LongBreak => work_units_completed.saturating_sub(1),
        };
        self.work_and_breaks(work_units_completed, breaks)
    }

    fn work_and_breaks(&self, work_units: u32, breaks: u32) -> Duration {
        let long_breaks = breaks / self.work_units_before_long_break.max(1);
        let short_breaks = breaks - long_breaks;
        let seconds = u64::from(self.work_duration_seconds) * u64::from(work_units)
            + u64::from(self.long_break_duration_seconds) * u64::from(long_breaks)
            + u64::from(self.short_break_duration_seconds) * u64::from(short_breaks);
        Duration::from_secs(seconds)
    }
}
