use clap::Args;
use phaseshift_core::SessionPlan;

use super::{format_clock, SettingsOverrides};

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub overrides: SettingsOverrides,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (_, settings) = args.overrides.resolve()?;
    let plan = SessionPlan::for_settings(&settings)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{:>4}  {:<12} {:>4}  {:>8}  {:>8}", "#", "phase", "unit", "starts", "length");
    for (i, entry) in plan.phases.iter().enumerate() {
        println!(
            "{:>4}  {:<12} {:>4}  {:>8}  {:>8}",
            i + 1,
            entry.phase.label(),
            entry.work_unit,
            format_clock(entry.starts_at),
            format_clock(entry.duration),
        );
    }
    println!("total {}", format_clock(plan.total));
    Ok(())
}
