//! Read outcome counters and latency percentiles.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Latency samples kept for percentiles; older samples are replaced by
/// reservoir sampling once full.
const RESERVOIR_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Success,
    /// The store answered with a non-200 status.
    Status(u16),
    /// The call failed; carries the service status when known.
    Error(Option<u16>),
}

/// Thread-safe statistics tracker shared by all readers.
#[derive(Clone)]
pub struct ReadStats {
    inner: Arc<Mutex<StatsInner>>,
}

struct StatsInner {
    start_time: Instant,
    successes: u64,
    failures: u64,
    errors: u64,
    statuses: BTreeMap<u16, u64>,
    /// Latency samples in microseconds.
    reservoir: Vec<u64>,
    seen: u64,
    rng: StdRng,
}

impl Default for ReadStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StatsInner {
                start_time: Instant::now(),
                successes: 0,
                failures: 0,
                errors: 0,
                statuses: BTreeMap::new(),
                reservoir: Vec::new(),
                seen: 0,
                rng: StdRng::from_entropy(),
            })),
        }
    }

    pub fn record(&self, outcome: ReadOutcome, latency: Duration) {
        let mut inner = self.lock();

        match outcome {
            ReadOutcome::Success => {
                inner.successes += 1;
                *inner.statuses.entry(200).or_insert(0) += 1;
            }
            ReadOutcome::Status(status) => {
                inner.failures += 1;
                *inner.statuses.entry(status).or_insert(0) += 1;
            }
            ReadOutcome::Error(status) => {
                inner.errors += 1;
                if let Some(status) = status {
                    *inner.statuses.entry(status).or_insert(0) += 1;
                }
            }
        }

        let micros = latency.as_micros().min(u64::MAX as u128) as u64;
        inner.seen += 1;
        if inner.reservoir.len() < RESERVOIR_CAPACITY {
            inner.reservoir.push(micros);
        } else {
            let seen = inner.seen;
            let slot = inner.rng.gen_range(0..seen) as usize;
            if slot < RESERVOIR_CAPACITY {
                inner.reservoir[slot] = micros;
            }
        }
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.lock();

        let elapsed = inner.start_time.elapsed();
        let total = inner.successes + inner.failures + inner.errors;

        let mut latencies = inner.reservoir.clone();
        latencies.sort_unstable();

        let avg = if latencies.is_empty() {
            0
        } else {
            latencies.iter().sum::<u64>() / latencies.len() as u64
        };

        let secs = elapsed.as_secs_f64();
        let reads_per_second = if secs > 0.0 { total as f64 / secs } else { 0.0 };

        StatsSnapshot {
            elapsed,
            total_reads: total,
            successes: inner.successes,
            failures: inner.failures,
            errors: inner.errors,
            reads_per_second,
            latency_avg: Duration::from_micros(avg),
            latency_p50: Duration::from_micros(percentile(&latencies, 0.50)),
            latency_p95: Duration::from_micros(percentile(&latencies, 0.95)),
            latency_p99: Duration::from_micros(percentile(&latencies, 0.99)),
            latency_max: Duration::from_micros(latencies.last().copied().unwrap_or(0)),
            statuses: inner.statuses.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatsInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub elapsed: Duration,
    pub total_reads: u64,
    pub successes: u64,
    pub failures: u64,
    pub errors: u64,
    pub reads_per_second: f64,
    pub latency_avg: Duration,
    pub latency_p50: Duration,
    pub latency_p95: Duration,
    pub latency_p99: Duration,
    pub latency_max: Duration,
    /// Count per reported status code.
    pub statuses: BTreeMap<u16, u64>,
}

impl StatsSnapshot {
    pub fn success_rate(&self) -> f64 {
        if self.total_reads == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_reads as f64 * 100.0
        }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reads={} ok={} failed={} errors={} ({:.2}% ok) rate={:.1}/s \
             latency avg={:.2}ms p50={:.2}ms p95={:.2}ms p99={:.2}ms max={:.2}ms",
            self.total_reads,
            self.successes,
            self.failures,
            self.errors,
            self.success_rate(),
            self.reads_per_second,
            ms(self.latency_avg),
            ms(self.latency_p50),
            ms(self.latency_p95),
            ms(self.latency_p99),
            ms(self.latency_max),
        )?;
        if self.statuses.keys().any(|s| *s != 200) {
            let parts: Vec<String> = self
                .statuses
                .iter()
                .map(|(status, count)| format!("{status}:{count}"))
                .collect();
            write!(f, " statuses=[{}]", parts.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_outcome() {
        let stats = ReadStats::new();
        stats.record(ReadOutcome::Success, Duration::from_millis(2));
        stats.record(ReadOutcome::Status(429), Duration::from_millis(4));
        stats.record(ReadOutcome::Error(Some(503)), Duration::from_millis(6));
        stats.record(ReadOutcome::Error(None), Duration::from_millis(8));

        let snap = stats.snapshot();
        assert_eq!(snap.total_reads, 4);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.errors, 2);
        assert_eq!(snap.statuses.get(&200), Some(&1));
        assert_eq!(snap.statuses.get(&429), Some(&1));
        assert_eq!(snap.statuses.get(&503), Some(&1));
        assert_eq!(snap.success_rate(), 25.0);
    }

    #[test]
    fn percentiles_over_known_latencies() {
        let stats = ReadStats::new();
        for ms in 1..=100 {
            stats.record(ReadOutcome::Success, Duration::from_millis(ms));
        }
        let snap = stats.snapshot();
        assert_eq!(snap.latency_p50, Duration::from_millis(51));
        assert_eq!(snap.latency_p99, Duration::from_millis(100));
        assert_eq!(snap.latency_max, Duration::from_millis(100));
        assert_eq!(snap.latency_avg, Duration::from_micros(50_500));
    }

    #[test]
    fn empty_snapshot_is_zeroed() {
        let snap = ReadStats::new().snapshot();
        assert_eq!(snap.total_reads, 0);
        assert_eq!(snap.latency_p50, Duration::ZERO);
        assert_eq!(snap.success_rate(), 0.0);
    }

    #[test]
    fn reservoir_is_bounded() {
        let stats = ReadStats::new();
        for _ in 0..(RESERVOIR_CAPACITY + 500) {
            stats.record(ReadOutcome::Success, Duration::from_micros(10));
        }
        assert_eq!(stats.lock().reservoir.len(), RESERVOIR_CAPACITY);
        assert_eq!(stats.snapshot().total_reads, (RESERVOIR_CAPACITY + 500) as u64);
    }

    #[test]
    fn display_lists_non_ok_statuses() {
        let stats = ReadStats::new();
        stats.record(ReadOutcome::Success, Duration::from_millis(1));
        assert!(!stats.snapshot().to_string().contains("statuses="));

        stats.record(ReadOutcome::Status(404), Duration::from_millis(1));
        let rendered = stats.snapshot().to_string();
        assert!(rendered.contains("statuses=[200:1 404:1]"));
    }
}
