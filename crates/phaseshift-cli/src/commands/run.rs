//! Foreground session runner.
//!
//! Events go to stdout as JSON lines; the status line is redrawn on stderr.

use std::time::Duration;

use clap::Args;
use phaseshift_core::{Event, Phase, PomodoroSequencer, SessionSnapshot};
use tokio_util::sync::CancellationToken;

use super::{format_clock, SettingsOverrides};

const STATUS_REFRESH: Duration = Duration::from_millis(250);

/// Conventional exit status after SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub overrides: SettingsOverrides,

    /// Tick interval in milliseconds (overrides `timer.tick_interval_ms`)
    #[arg(long, value_name = "MS")]
    pub tick_ms: Option<u64>,

    /// Do not draw the status line
    #[arg(long, short)]
    pub quiet: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (config, settings) = args.overrides.resolve()?;
    let mut options = config.timer_options();
    if let Some(ms) = args.tick_ms {
        options = options.with_interval(Duration::from_millis(ms));
    }

    let sequencer = PomodoroSequencer::with_options(settings, |_| {}, options)?;
    let mut events = sequencer.events();

    let interrupt = CancellationToken::new();
    {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        });
    }

    let finished = CancellationToken::new();
    let status = (!args.quiet).then(|| {
        let sequencer = sequencer.clone();
        let finished = finished.clone();
        tokio::spawn(async move {
            let mut refresh = tokio::time::interval(STATUS_REFRESH);
            loop {
                tokio::select! {
                    _ = finished.cancelled() => break,
                    _ = refresh.tick() => eprint!("\r{}", status_line(&sequencer.snapshot())),
                }
            }
            eprintln!("\r{}", status_line(&sequencer.snapshot()));
        })
    });

    tracing::info!(?settings, "session starting");
    sequencer.start_active_timer();

    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = interrupt.cancelled() => {
                sequencer.stop_active_timer();
                while let Ok(event) = events.try_recv() {
                    print_event(&event)?;
                }
                interrupted = true;
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                print_event(&event)?;
                if matches!(event, Event::SessionCompleted { .. }) {
                    break;
                }
            }
        }
    }

    finished.cancel();
    if let Some(status) = status {
        let _ = status.await;
    }

    if interrupted {
        tracing::info!("session interrupted");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }
    Ok(())
}

fn print_event(event: &Event) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

/// One-line summary of a session, e.g.
/// `Work         12:30 / 25:00  unit 3/12  running`.
fn status_line(snapshot: &SessionSnapshot) -> String {
    let total = snapshot.settings.total_work_units;
    let unit = match snapshot.phase {
        Phase::Work => (snapshot.work_units_completed + 1).min(total),
        _ => snapshot.work_units_completed,
    };
    let state = if snapshot.is_completed {
        "completed"
    } else if snapshot.is_running {
        "running"
    } else {
        "stopped"
    };
    format!(
        "{:<12} {} / {}  unit {unit}/{total}  {state}",
        snapshot.phase.label(),
        format_clock(snapshot.elapsed_in_phase),
        format_clock(snapshot.phase_duration),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaseshift_core::PomodoroSettings;

    fn snapshot(phase: Phase, completed: u32, running: bool) -> SessionSnapshot {
        let settings = PomodoroSettings::default();
        SessionSnapshot {
            settings,
            phase,
            work_units_completed: completed,
            is_running: running,
            is_completed: completed >= settings.total_work_units,
            phase_duration: settings.phase_duration(phase),
            elapsed_in_phase: Duration::from_secs(750),
            remaining_in_phase: settings.phase_duration(phase) - Duration::from_secs(750),
            progress_in_phase: 0.5,
            session_duration: settings.session_duration(),
            elapsed_in_session: Duration::ZERO,
            remaining_in_session: settings.session_duration(),
        }
    }

    #[test]
    fn work_phase_shows_the_unit_in_progress() {
        let line = status_line(&snapshot(Phase::Work, 2, true));
        assert!(line.starts_with(Phase::Work.label()));
        assert!(line.contains("12:30 / 25:00"));
        assert!(line.contains("unit 3/12"));
        assert!(line.ends_with("running"));
    }

    #[test]
    fn break_shows_the_unit_it_follows() {
        let line = status_line(&snapshot(Phase::LongBreak, 4, false));
        assert!(line.contains("unit 4/12"));
        assert!(line.ends_with("stopped"));
    }

    #[test]
    fn completed_session_caps_the_unit() {
        let line = status_line(&snapshot(Phase::Work, 12, false));
        assert!(line.contains("unit 12/12"));
        assert!(line.ends_with("completed"));
    }
}
