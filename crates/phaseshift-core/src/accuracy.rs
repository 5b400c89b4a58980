//! Timing accuracy measurement for the engines.
//!
//! An [`AccuracyTest`] repeatedly runs one engine for a known wall-clock
//! time and compares the elapsed time it reports with the time that really
//! passed. Results are summarized as mean deviation and drift per hour.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::error::{AccuracyError, Result};
use crate::timer::{Countdown, Stopwatch, TimerOptions};

const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Slack added to a countdown sample so the run never completes mid-sample.
const COUNTDOWN_HEADROOM: Duration = Duration::from_millis(100);

/// Mean and spread of a set of samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub samples: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// `std_dev / mean`; `None` when the mean is zero.
    pub relative_std_dev: Option<f64>,
}

impl Statistics {
    pub fn from_samples(samples: Vec<f64>) -> Self {
        if samples.is_empty() {
            return Self {
                samples,
                mean: 0.0,
                std_dev: 0.0,
                relative_std_dev: None,
            };
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        let relative_std_dev = (mean != 0.0).then(|| std_dev / mean);
        Self {
            samples,
            mean,
            std_dev,
            relative_std_dev,
        }
    }
}

type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Runs an async sample producer a fixed number of times.
#[derive(Clone)]
pub struct StatisticalTest {
    sample_count: usize,
    parallel: bool,
    on_sample: Option<ProgressFn>,
}

impl StatisticalTest {
    pub fn new(sample_count: usize) -> std::result::Result<Self, AccuracyError> {
        if sample_count < 1 {
            return Err(AccuracyError::InvalidOption {
                name: "sample_count",
                value: 0,
            });
        }
        Ok(Self {
            sample_count,
            parallel: false,
            on_sample: None,
        })
    }

    /// Run all samples concurrently instead of one after another. Concurrent
    /// samples compete for the runtime and may read less accurately.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Called with `(generated, total)` after each sample.
    pub fn on_sample<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_sample = Some(Arc::new(f));
        self
    }

    pub async fn run<F, Fut>(&self, sample: F) -> Result<Statistics>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<f64>> + Send + 'static,
    {
        let generated = AtomicUsize::new(0);
        let report = |value: f64| {
            let n = generated.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(sample = n, total = self.sample_count, value, "sample generated");
            if let Some(on_sample) = &self.on_sample {
                on_sample(n, self.sample_count);
            }
            value
        };

        let mut samples = Vec::with_capacity(self.sample_count);
        if self.parallel {
            let mut tasks = JoinSet::new();
            for _ in 0..self.sample_count {
                tasks.spawn(sample());
            }
            while let Some(joined) = tasks.join_next().await {
                let value = joined.map_err(|e| AccuracyError::SampleFailed(e.to_string()))??;
                samples.push(report(value));
            }
        } else {
            for _ in 0..self.sample_count {
                let value = sample().await?;
                samples.push(report(value));
            }
        }
        Ok(Statistics::from_samples(samples))
    }
}

/// Engine measured by an [`AccuracyTest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Stopwatch,
    Countdown,
}

impl Subject {
    pub const ALL: [Subject; 2] = [Subject::Stopwatch, Subject::Countdown];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyOptions {
    pub sample_count: u32,
    pub acceptable_deviation_ms: u64,
    pub expected_elapsed_ms: u64,
    pub parallel: bool,
}

impl Default for AccuracyOptions {
    fn default() -> Self {
        Self {
            sample_count: 10,
            acceptable_deviation_ms: 10,
            expected_elapsed_ms: 10_000,
            parallel: false,
        }
    }
}

impl AccuracyOptions {
    pub fn validate(&self) -> std::result::Result<(), AccuracyError> {
        let checks = [
            ("sample_count", u64::from(self.sample_count)),
            ("acceptable_deviation_ms", self.acceptable_deviation_ms),
            ("expected_elapsed_ms", self.expected_elapsed_ms),
        ];
        for (name, value) in checks {
            if value < 1 {
                return Err(AccuracyError::InvalidOption { name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub subject: Subject,
    pub expected_ms: f64,
    pub acceptable_deviation_ms: f64,
    pub statistics: Statistics,
    /// Mean minus expected; negative when the engine runs slow.
    pub deviation_ms: f64,
    pub relative_deviation: f64,
    pub drift_seconds_per_hour: f64,
    pub acceptable_drift_seconds_per_hour: f64,
    pub passed: bool,
}

impl AccuracyReport {
    fn new(subject: Subject, options: &AccuracyOptions, statistics: Statistics) -> Self {
        let expected_ms = options.expected_elapsed_ms as f64;
        let acceptable_deviation_ms = options.acceptable_deviation_ms as f64;
        let deviation_ms = statistics.mean - expected_ms;
        let relative_deviation = deviation_ms / expected_ms;
        Self {
            subject,
            expected_ms,
            acceptable_deviation_ms,
            statistics,
            deviation_ms,
            relative_deviation,
            drift_seconds_per_hour: relative_deviation * SECONDS_PER_HOUR,
            acceptable_drift_seconds_per_hour: acceptable_deviation_ms / expected_ms * SECONDS_PER_HOUR,
            passed: deviation_ms.abs() < acceptable_deviation_ms,
        }
    }
}

pub struct AccuracyTest {
    options: AccuracyOptions,
    timer: TimerOptions,
    on_sample: Option<ProgressFn>,
}

impl AccuracyTest {
    pub fn new(options: AccuracyOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            timer: TimerOptions::default(),
            on_sample: None,
        })
    }

    /// Engine options used for every sample.
    pub fn with_timer_options(mut self, timer: TimerOptions) -> Self {
        self.timer = timer;
        self
    }

    pub fn on_sample<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_sample = Some(Arc::new(f));
        self
    }

    pub fn options(&self) -> &AccuracyOptions {
        &self.options
    }

    pub async fn run(&self, subject: Subject) -> Result<AccuracyReport> {
        let mut test = StatisticalTest::new(self.options.sample_count as usize)?
            .parallel(self.options.parallel);
        if let Some(on_sample) = &self.on_sample {
            let on_sample = Arc::clone(on_sample);
            test = test.on_sample(move |n, total| on_sample(n, total));
        }

        let expected = Duration::from_millis(self.options.expected_elapsed_ms);
        tracing::info!(?subject, ?expected, samples = self.options.sample_count, "accuracy test started");
        let statistics = test
            .run(|| {
                let timer = self.timer.clone();
                async move {
                    let elapsed = match subject {
                        Subject::Stopwatch => measure_stopwatch(expected, timer).await?,
                        Subject::Countdown => measure_countdown(expected, timer).await?,
                    };
                    Ok(elapsed.as_secs_f64() * 1_000.0)
                }
            })
            .await?;

        let report = AccuracyReport::new(subject, &self.options, statistics);
        tracing::info!(
            ?subject,
            mean_ms = report.statistics.mean,
            deviation_ms = report.deviation_ms,
            passed = report.passed,
            "accuracy test finished"
        );
        Ok(report)
    }
}

async fn measure_stopwatch(expected: Duration, timer: TimerOptions) -> Result<Duration> {
    let watch = Stopwatch::with_options(|_| {}, timer)?;
    watch.start();
    tokio::time::sleep(expected).await;
    watch.stop();
    Ok(watch.elapsed())
}

async fn measure_countdown(expected: Duration, timer: TimerOptions) -> Result<Duration> {
    let countdown = Countdown::with_options(expected + COUNTDOWN_HEADROOM, |_| {}, |_| {}, timer)?;
    countdown.start();
    tokio::time::sleep(expected).await;
    countdown.stop();
    Ok(countdown.elapsed())
}
