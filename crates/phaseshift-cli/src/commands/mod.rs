pub mod accuracy;
pub mod completions;
pub mod config;
pub mod plan;
pub mod run;

use std::time::Duration;

use clap::Args;
use phaseshift_core::{Config, PomodoroSettings};

/// Per-invocation overrides of the `[pomodoro]` config section.
#[derive(Args, Debug, Default, Clone)]
pub struct SettingsOverrides {
    /// Work phase length in seconds
    #[arg(long, value_name = "S")]
    pub work: Option<u32>,
    /// Short break length in seconds
    #[arg(long, value_name = "S")]
    pub short_break: Option<u32>,
    /// Long break length in seconds
    #[arg(long, value_name = "S")]
    pub long_break: Option<u32>,
    /// Work units in the session
    #[arg(long, value_name = "N")]
    pub total: Option<u32>,
    /// Work units before each long break
    #[arg(long, value_name = "N")]
    pub before_long: Option<u32>,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: PomodoroSettings) -> PomodoroSettings {
        PomodoroSettings {
            work_duration_seconds: self.work.unwrap_or(settings.work_duration_seconds),
            short_break_duration_seconds: self
                .short_break
                .unwrap_or(settings.short_break_duration_seconds),
            long_break_duration_seconds: self
                .long_break
                .unwrap_or(settings.long_break_duration_seconds),
            total_work_units: self.total.unwrap_or(settings.total_work_units),
            work_units_before_long_break: self
                .before_long
                .unwrap_or(settings.work_units_before_long_break),
        }
    }

    /// Loads the config file and returns validated settings with the
    /// overrides applied.
    pub fn resolve(&self) -> Result<(Config, PomodoroSettings), Box<dyn std::error::Error>> {
        let config = Config::load_or_default();
        let settings = self.apply(config.pomodoro);
        settings.validate()?;
        Ok((config, settings))
    }
}

/// `mm:ss`, or `h:mm:ss` from one hour up.
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
