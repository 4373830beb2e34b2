//! Opt-in phase timing (`--timing` / `SEGCLEAN_TIMING`).
//!
//! Samples are kept per thread; the CLI is single-threaded so one report
//! covers a whole run.

use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static ENABLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static SAMPLES: RefCell<Vec<(String, Duration)>> = const { RefCell::new(Vec::new()) };
}

/// Latency statistics for one named phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTiming {
    pub name: String,
    pub count: usize,
    #[serde(rename = "total_us", serialize_with = "as_micros")]
    pub total: Duration,
    #[serde(rename = "p50_us", serialize_with = "as_micros")]
    pub p50: Duration,
    #[serde(rename = "p95_us", serialize_with = "as_micros")]
    pub p95: Duration,
    #[serde(rename = "p99_us", serialize_with = "as_micros")]
    pub p99: Duration,
}

/// All phases recorded since the last [`collect_report`], sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimingReport {
    pub phases: Vec<PhaseTiming>,
}

fn as_micros<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(value.as_micros())
}

/// `SEGCLEAN_TIMING` is set to `1`, `true`, `yes` or `on`.
#[must_use]
pub fn enabled_from_env() -> bool {
    std::env::var("SEGCLEAN_TIMING").is_ok_and(|raw| {
        matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear();
    }
}

#[must_use]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn clear() {
    SAMPLES.with(|samples| samples.borrow_mut().clear());
}

/// Run `f`, recording its wall time under `name` when timing is enabled.
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    if !is_enabled() {
        return f();
    }
    let started = Instant::now();
    let result = f();
    record(name, started.elapsed());
    result
}

fn record(name: &str, elapsed: Duration) {
    SAMPLES.with(|samples| samples.borrow_mut().push((name.to_string(), elapsed)));
}

/// Drain this thread's samples into a report.
#[must_use]
pub fn collect_report() -> TimingReport {
    let samples = SAMPLES.with(|samples| std::mem::take(&mut *samples.borrow_mut()));

    let mut by_name: BTreeMap<String, Vec<Duration>> = BTreeMap::new();
    for (name, elapsed) in samples {
        by_name.entry(name).or_default().push(elapsed);
    }

    let phases = by_name
        .into_iter()
        .map(|(name, mut values)| {
            values.sort_unstable();
            PhaseTiming {
                count: values.len(),
                total: values.iter().sum(),
                p50: nearest_rank(&values, 50),
                p95: nearest_rank(&values, 95),
                p99: nearest_rank(&values, 99),
                name,
            }
        })
        .collect();

    TimingReport { phases }
}

fn nearest_rank(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct.min(100) * sorted.len()).div_ceil(100).max(1);
    sorted[rank - 1]
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Fixed-width table for stderr.
    #[must_use]
    pub fn display_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<24} {:>6} {:>10} {:>10} {:>10} {:>10}",
            "phase", "count", "total", "p50", "p95", "p99"
        );
        for phase in &self.phases {
            let _ = writeln!(
                out,
                "{:<24} {:>6} {:>10} {:>10} {:>10} {:>10}",
                phase.name,
                phase.count,
                human(phase.total),
                human(phase.p50),
                human(phase.p95),
                human(phase.p99)
            );
        }
        out
    }
}

fn human(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros >= 1_000_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if micros >= 1_000 {
        format!("{:.2}ms", duration.as_secs_f64() * 1_000.0)
    } else {
        format!("{micros}µs")
    }
}
