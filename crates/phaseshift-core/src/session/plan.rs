use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::phase::Phase;
use super::settings::PomodoroSettings;
use crate::error::SettingsError;

/// Largest `total_work_units` a [`SessionPlan`] is built for.
pub const MAX_PLANNED_WORK_UNITS: u32 = 10_000;

/// One entry of a [`SessionPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPhase {
    pub phase: Phase,
    /// Work unit this phase belongs to, counting from 1. A break shares the
    /// number of the work unit it follows.
    pub work_unit: u32,
    pub duration: Duration,
    /// Offset from the start of the session.
    pub starts_at: Duration,
}

/// The phases an uninterrupted session runs through, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub phases: Vec<PlannedPhase>,
    pub total: Duration,
}

impl SessionPlan {
    /// Walks the transition rule from a fresh session to completion.
    ///
    /// Fails for totals above [`MAX_PLANNED_WORK_UNITS`].
    pub fn for_settings(settings: &PomodoroSettings) -> Result<Self, SettingsError> {
        if settings.total_work_units > MAX_PLANNED_WORK_UNITS {
            return Err(SettingsError::TooManyUnitsToPlan {
                value: settings.total_work_units,
                max: MAX_PLANNED_WORK_UNITS,
            });
        }
        let mut phases = Vec::with_capacity(2 * settings.total_work_units as usize);
        let mut offset = Duration::ZERO;
        let mut push = |phase: Phase, work_unit: u32, offset: &mut Duration| {
            let duration = settings.phase_duration(phase);
            phases.push(PlannedPhase {
                phase,
                work_unit,
                duration,
                starts_at: *offset,
            });
            *offset += duration;
        };

        for unit in 1..=settings.total_work_units {
            push(Phase::Work, unit, &mut offset);
            if unit < settings.total_work_units {
                push(settings.break_after(unit), unit, &mut offset);
            }
        }
        Ok(Self {
            phases,
            total: offset,
        })
    }

    pub fn count(&self, phase: Phase) -> usize {
        self.phases.iter().filter(|p| p.phase == phase).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plan_for_small_session() {
        let settings = PomodoroSettings {
            work_duration_seconds: 1,
            short_break_duration_seconds: 1,
            long_break_duration_seconds: 2,
            total_work_units: 3,
            work_units_before_long_break: 2,
        };
        let plan = SessionPlan::for_settings(&settings).unwrap();
        let kinds: Vec<Phase> = plan.phases.iter().map(|p| p.phase).collect();
        assert_eq!(
            kinds,
            vec![Phase::Work, Phase::ShortBreak, Phase::Work, Phase::LongBreak, Phase::Work]
        );
        assert_eq!(plan.phases[3].starts_at, Duration::from_secs(3));
        assert_eq!(plan.total, Duration::from_secs(6));
    }

    #[test]
    fn single_unit_has_no_break() {
        let settings = PomodoroSettings {
            total_work_units: 1,
            ..PomodoroSettings::default()
        };
        let plan = SessionPlan::for_settings(&settings).unwrap();
        assert_eq!(plan.phases.len(), 1);
        assert_eq!(plan.count(Phase::ShortBreak) + plan.count(Phase::LongBreak), 0);
    }

    #[test]
    fn oversized_total_is_rejected_without_allocating() {
        let settings = PomodoroSettings {
            total_work_units: 4_000_000_000,
            ..PomodoroSettings::default()
        };
        let err = SessionPlan::for_settings(&settings).unwrap_err();
        assert_eq!(
            err,
            SettingsError::TooManyUnitsToPlan {
                value: 4_000_000_000,
                max: MAX_PLANNED_WORK_UNITS,
            }
        );
        assert_eq!(err.field(), crate::SettingsField::TotalWorkUnits);

        let at_limit = PomodoroSettings {
            total_work_units: MAX_PLANNED_WORK_UNITS,
            ..PomodoroSettings::default()
        };
        let plan = SessionPlan::for_settings(&at_limit).unwrap();
        assert_eq!(plan.count(Phase::Work), MAX_PLANNED_WORK_UNITS as usize);
    }

    proptest! {
        #[test]
        fn plan_total_equals_session_duration(
            work in 1u32..3000, short in 1u32..400, extra in 0u32..400,
            total in 1u32..40, before_long in 1u32..8,
        ) {
            let settings = PomodoroSettings {
                work_duration_seconds: work,
                short_break_duration_seconds: short,
                long_break_duration_seconds: short + extra,
                total_work_units: total,
                work_units_before_long_break: before_long,
            };
            let plan = SessionPlan::for_settings(&settings).unwrap();
            prop_assert_eq!(plan.total, settings.session_duration());
            prop_assert_eq!(plan.count(Phase::Work), total as usize);
        }
    }
}
