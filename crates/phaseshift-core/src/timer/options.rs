use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::TimerError;

/// Default interval between tick callbacks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Construction options shared by [`Stopwatch`](super::Stopwatch),
/// [`Countdown`](super::Countdown) and the phase sequencer.
#[derive(Debug, Clone)]
pub struct TimerOptions {
    /// Pause between two tick callbacks.
    pub interval: Duration,
    /// Runtime that drives the background loops.
    /// When `None`, the runtime current at construction time is used.
    pub runtime: Option<Handle>,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TICK_INTERVAL,
            runtime: None,
        }
    }
}

impl TimerOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub(crate) fn resolve(self) -> Result<ResolvedOptions, TimerError> {
        if self.interval.is_zero() {
            return Err(TimerError::InvalidInterval);
        }
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| TimerError::NoRuntime)?,
        };
        Ok(ResolvedOptions {
            interval: self.interval,
            runtime,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub(crate) interval: Duration,
    pub(crate) runtime: Handle,
}
