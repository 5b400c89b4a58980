use clap::{Args, ValueEnum};
use phaseshift_core::{AccuracyOptions, AccuracyReport, AccuracyTest, Config, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SubjectArg {
    Stopwatch,
    Countdown,
    All,
}

impl SubjectArg {
    fn subjects(self) -> Vec<Subject> {
        match self {
            SubjectArg::Stopwatch => vec![Subject::Stopwatch],
            SubjectArg::Countdown => vec![Subject::Countdown],
            SubjectArg::All => Subject::ALL.to_vec(),
        }
    }
}

#[derive(Args, Debug)]
pub struct AccuracyArgs {
    /// Samples per engine
    #[arg(long, default_value_t = 10)]
    pub samples: u32,
    /// Time each sample runs for, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub expected_ms: u64,
    /// Largest acceptable mean deviation, in milliseconds
    #[arg(long, default_value_t = 10)]
    pub deviation_ms: u64,
    /// Engine to measure
    #[arg(long, value_enum, default_value_t = SubjectArg::All)]
    pub subject: SubjectArg,
    /// Take the samples concurrently
    #[arg(long)]
    pub parallel: bool,
    /// Print the reports as JSON
    #[arg(long)]
    pub json: bool,
}

fn subject_name(subject: Subject) -> &'static str {
    match subject {
        Subject::Stopwatch => "stopwatch",
        Subject::Countdown => "countdown",
    }
}

pub async fn run(args: AccuracyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = AccuracyOptions {
        sample_count: args.samples,
        acceptable_deviation_ms: args.deviation_ms,
        expected_elapsed_ms: args.expected_ms,
        parallel: args.parallel,
    };
    let timer = Config::load_or_default().timer_options();

    let mut reports = Vec::new();
    for subject in args.subject.subjects() {
        let name = subject_name(subject);
        let test = AccuracyTest::new(options.clone())?
            .with_timer_options(timer.clone())
            .on_sample(move |n, total| eprint!("\r{name}: sample {n}/{total}"));
        let report = test.run(subject).await?;
        eprintln!();
        if !args.json {
            print_report(&report);
        }
        reports.push(report);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    let failed: Vec<_> = reports
        .iter()
        .filter(|r| !r.passed)
        .map(|r| subject_name(r.subject))
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(format!("deviation outside tolerance for {}", failed.join(", ")).into())
    }
}

fn print_report(report: &AccuracyReport) {
    let stats = &report.statistics;
    println!("{}", subject_name(report.subject));
    println!("  expected:      {:.0} ms", report.expected_ms);
    println!("  mean:          {:.3} ms", stats.mean);
    println!("  std dev:       {:.3} ms", stats.std_dev);
    match stats.relative_std_dev {
        Some(rsd) => println!("  rel. std dev:  {:.4} %", rsd * 100.0),
        None => println!("  rel. std dev:  n/a"),
    }
    println!(
        "  deviation:     {:+.3} ms (limit {:.0} ms)",
        report.deviation_ms, report.acceptable_deviation_ms
    );
    println!(
        "  drift:         {:+.3} s/h (limit {:.3} s/h)",
        report.drift_seconds_per_hour, report.acceptable_drift_seconds_per_hour
    );
    println!("  result:        {}", if report.passed { "PASS" } else { "FAIL" });
}
