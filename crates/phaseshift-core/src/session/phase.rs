use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

/// Phase kind the sequencer cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Work, Phase::ShortBreak, Phase::LongBreak];

    pub fn is_break(self) -> bool {
        !matches!(self, Phase::Work)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Work => "work",
            Phase::ShortBreak => "short_break",
            Phase::LongBreak => "long_break",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "Work",
            Phase::ShortBreak => "Short break",
            Phase::LongBreak => "Long break",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per phase. Lookups are exhaustive matches, never fallible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMap<T> {
    pub work: T,
    pub short_break: T,
    pub long_break: T,
}

impl<T> PhaseMap<T> {
    pub fn new(work: T, short_break: T, long_break: T) -> Self {
        Self {
            work,
            short_break,
            long_break,
        }
    }

    pub fn from_fn(mut f: impl FnMut(Phase) -> T) -> Self {
        Self::new(f(Phase::Work), f(Phase::ShortBreak), f(Phase::LongBreak))
    }

    pub fn get(&self, phase: Phase) -> &T {
        match phase {
            Phase::Work => &self.work,
            Phase::ShortBreak => &self.short_break,
            Phase::LongBreak => &self.long_break,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phase, &T)> {
        Phase::ALL.into_iter().map(move |phase| (phase, self.get(phase)))
    }
}

impl<T> Index<Phase> for PhaseMap<T> {
    type Output = T;

    fn index(&self, phase: Phase) -> &T {
        self.get(phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_map_indexes_by_variant() {
        let map = PhaseMap::from_fn(|phase| phase.as_str().len());
        assert_eq!(map[Phase::Work], 4);
        assert_eq!(map[Phase::ShortBreak], 11);
        assert_eq!(map[Phase::LongBreak], 10);
        let order: Vec<Phase> = map.iter().map(|(phase, _)| phase).collect();
        assert_eq!(order, Phase::ALL);
    }

    #[test]
    fn phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Phase::ShortBreak).unwrap(),
            "\"short_break\""
        );
        assert!(Phase::LongBreak.is_break());
        assert!(!Phase::Work.is_break());
    }
}
