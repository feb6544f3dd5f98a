//! Outcome collection and run summaries
//!
//! Sessions report every executed task to an [`OutcomeCollector`]. The
//! [`StatsCollector`] aggregates counts, failure reasons and latencies across
//! all sessions and mirrors them into the `metrics` facade.

use crate::outcome::TaskOutcome;
use crate::task::TaskKind;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hdrhistogram::Histogram;
use serde::Serialize;
use std::time::Duration;

/// Sink for per-task outcomes
pub trait OutcomeCollector: Send + Sync {
    fn report(&self, task: TaskKind, outcome: &TaskOutcome, elapsed: Duration);
}

/// Upper bound of the latency histogram, one hour in microseconds
const MAX_TRACKED_MICROS: u64 = 3_600_000_000;

/// Latency distribution for one task kind
///
/// Backed by a fixed-bounds HDR histogram with 3 significant digits, so
/// memory stays constant no matter how many samples a run records. Values
/// above one hour are clamped to the upper bound.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    histogram: Histogram<u64>,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyStats {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKED_MICROS, 3)
            .expect("latency histogram bounds are valid");
        Self { histogram }
    }

    pub fn record(&mut self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(micros);
    }

    /// Number of recorded samples
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Number of histogram buckets, fixed at construction
    pub fn bucket_count(&self) -> usize {
        self.histogram.distinct_values()
    }

    /// Calculate percentile (0-100)
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        let micros = self.histogram.value_at_quantile(p / 100.0);
        Some(Duration::from_micros(micros))
    }

    pub fn p50(&self) -> Option<Duration> {
        self.percentile(50.0)
    }

    pub fn p95(&self) -> Option<Duration> {
        self.percentile(95.0)
    }

    pub fn p99(&self) -> Option<Duration> {
        self.percentile(99.0)
    }

    pub fn max(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_micros(self.histogram.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos((self.histogram.mean() * 1000.0) as u64))
    }
}

#[derive(Debug, Default)]
struct TaskStats {
    successes: u64,
    failures: u64,
    latencies: LatencyStats,
}

/// Thread-safe aggregate of all reported outcomes
#[derive(Debug)]
pub struct StatsCollector {
    tasks: DashMap<TaskKind, TaskStats>,
    failures: DashMap<(TaskKind, String), u64>,
    started_at: DateTime<Utc>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            failures: DashMap::new(),
            started_at: Utc::now(),
        }
    }

    /// Total reported outcomes so far
    pub fn total_requests(&self) -> u64 {
        self.tasks
            .iter()
            .map(|entry| entry.successes + entry.failures)
            .sum()
    }

    /// Snapshot of everything collected so far
    pub fn summary(&self, scenario: &str, users: usize, elapsed: Duration) -> RunSummary {
        let tasks: Vec<TaskSummary> = TaskKind::ALL
            .iter()
            .filter_map(|task| {
                self.tasks
                    .get(task)
                    .map(|stats| TaskSummary::from_stats(*task, &stats))
            })
            .collect();

        let mut failures: Vec<FailureEntry> = self
            .failures
            .iter()
            .map(|entry| {
                let (task, reason) = entry.key();
                FailureEntry {
                    task: *task,
                    reason: reason.clone(),
                    occurrences: *entry.value(),
                }
            })
            .collect();
        failures.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.reason.cmp(&b.reason))
        });

        let total_requests: u64 = tasks.iter().map(|t| t.requests).sum();
        let total_failures: u64 = tasks.iter().map(|t| t.failures).sum();
        let elapsed_secs = elapsed.as_secs_f64();

        RunSummary {
            scenario: scenario.to_string(),
            started_at: self.started_at.to_rfc3339(),
            elapsed_secs,
            users,
            total_requests,
            total_failures,
            failure_rate: if total_requests > 0 {
                total_failures as f64 / total_requests as f64
            } else {
                0.0
            },
            throughput_rps: if elapsed_secs > 0.0 {
                total_requests as f64 / elapsed_secs
            } else {
                0.0
            },
            tasks,
            failures,
        }
    }
}

impl OutcomeCollector for StatsCollector {
    fn report(&self, task: TaskKind, outcome: &TaskOutcome, elapsed: Duration) {
        {
            let mut stats = self.tasks.entry(task).or_default();
            match outcome {
                TaskOutcome::Success => stats.successes += 1,
                TaskOutcome::Failure(_) => stats.failures += 1,
            }
            stats.latencies.record(elapsed);
        }

        if let Some(reason) = outcome.reason() {
            *self.failures.entry((task, reason)).or_insert(0) += 1;
        }

        metrics::counter!(
            "authswarm_tasks_total",
            "task" => task.as_str(),
            "outcome" => outcome.label().as_str()
        )
        .increment(1);
        metrics::histogram!("authswarm_task_duration_seconds", "task" => task.as_str())
            .record(elapsed.as_secs_f64());
    }
}

/// Per-task section of a [`RunSummary`]
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task: TaskKind,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub mean_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl TaskSummary {
    fn from_stats(task: TaskKind, stats: &TaskStats) -> Self {
        let ms = |d: Option<Duration>| d.map(|d| d.as_secs_f64() * 1000.0);
        Self {
            task,
            requests: stats.successes + stats.failures,
            successes: stats.successes,
            failures: stats.failures,
            mean_ms: ms(stats.latencies.mean()),
            p50_ms: ms(stats.latencies.p50()),
            p95_ms: ms(stats.latencies.p95()),
            p99_ms: ms(stats.latencies.p99()),
            max_ms: ms(stats.latencies.max()),
        }
    }
}

/// One row of the failure table
#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub task: TaskKind,
    pub reason: String,
    pub occurrences: u64,
}

/// Aggregated results of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub started_at: String,
    pub elapsed_secs: f64,
    pub users: usize,
    pub total_requests: u64,
    pub total_failures: u64,
    /// Fraction of reported tasks that failed (0.0 to 1.0)
    pub failure_rate: f64,
    pub throughput_rps: f64,
    pub tasks: Vec<TaskSummary>,
    pub failures: Vec<FailureEntry>,
}

impl RunSummary {
    pub fn task(&self, task: TaskKind) -> Option<&TaskSummary> {
        self.tasks.iter().find(|t| t.task == task)
    }

    pub fn exceeds_failure_rate(&self, max: f64) -> bool {
        self.failure_rate > max
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    #[allow(clippy::print_literal)]
    pub fn print(&self) {
        let fmt_ms = |v: Option<f64>| {
            v.map(|v| format!("{:.1}", v))
                .unwrap_or_else(|| "-".to_string())
        };

        println!();
        println!("═══════════════════════════════════════════════════════════════════════");
        println!(
            " RESULTS: {} ({} users, {:.0}s, started {})",
            self.scenario, self.users, self.elapsed_secs, self.started_at
        );
        println!("═══════════════════════════════════════════════════════════════════════");
        println!();
        println!(
            "   {:10} {:>8} {:>8} {:>9} {:>9} {:>9} {:>9}",
            "Task", "Reqs", "Fails", "p50 ms", "p95 ms", "p99 ms", "max ms"
        );
        println!(
            "   {:10} {:>8} {:>8} {:>9} {:>9} {:>9} {:>9}",
            "────", "────", "─────", "──────", "──────", "──────", "──────"
        );
        for t in &self.tasks {
            println!(
                "   {:10} {:>8} {:>8} {:>9} {:>9} {:>9} {:>9}",
                t.task.as_str(),
                t.requests,
                t.failures,
                fmt_ms(t.p50_ms),
                fmt_ms(t.p95_ms),
                fmt_ms(t.p99_ms),
                fmt_ms(t.max_ms)
            );
        }
        println!();
        println!(
            "   Total: {} requests | Failures: {:.2}% | Throughput: {:.1} req/s",
            self.total_requests,
            self.failure_rate * 100.0,
            self.throughput_rps
        );

        if !self.failures.is_empty() {
            println!();
            println!(" ─── Failures ──────────────────────────────────────────────────────────");
            println!();
            for f in &self.failures {
                println!("   {:>8}  {:10} {}", f.occurrences, f.task.as_str(), f.reason);
            }
        }

        println!();
        println!("═══════════════════════════════════════════════════════════════════════");
    }
}
