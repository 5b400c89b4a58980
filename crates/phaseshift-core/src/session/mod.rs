mod phase;
mod plan;
mod sequencer;
mod settings;

pub use phase::{Phase, PhaseMap};
pub use plan::{PlannedPhase, SessionPlan, MAX_PLANNED_WORK_UNITS};
pub use sequencer::{PhaseTick, PomodoroSequencer, SessionSnapshot};
pub use settings::PomodoroSettings;
