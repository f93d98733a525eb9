//! Process-wide run statistics.
//!
//! One instance is shared by every worker.  Counters are cheap atomics;
//! latencies and the per-key maps sit behind mutexes that are only touched
//! once per completed action, well off any hot path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Default)]
struct Counters {
    status_counts: HashMap<u16, u64>,
    action_counts: HashMap<&'static str, u64>,
    latencies_ms: Vec<u64>,
}

pub struct RunStats {
    started: Instant,
    executed_total: AtomicU64,
    exhausted_total: AtomicU64,
    abstained_total: AtomicU64,
    stalls_total: AtomicU64,
    counters: Mutex<Counters>,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            executed_total: AtomicU64::new(0),
            exhausted_total: AtomicU64::new(0),
            abstained_total: AtomicU64::new(0),
            stalls_total: AtomicU64::new(0),
            counters: Mutex::new(Counters::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a completed exchange for `action`.
    pub fn record_exchange(&self, action: &'static str, status: u16, latency_ms: u64) {
        self.executed_total.fetch_add(1, Ordering::Relaxed);
        let mut counters = self.lock();
        *counters.status_counts.entry(status).or_default() += 1;
        *counters.action_counts.entry(action).or_default() += 1;
        counters.latencies_ms.push(latency_ms);
    }

    /// Record an action whose retry budget ran out without a response.
    pub fn record_no_response(&self, action: &'static str) {
        self.executed_total.fetch_add(1, Ordering::Relaxed);
        self.exhausted_total.fetch_add(1, Ordering::Relaxed);
        *self.lock().action_counts.entry(action).or_default() += 1;
    }

    /// Record an iteration skipped because the argument generator abstained.
    pub fn record_abstain(&self) {
        self.abstained_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an iteration where nothing was runnable.
    pub fn record_stall(&self) {
        self.stalls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn executed_total(&self) -> u64 {
        self.executed_total.load(Ordering::Relaxed)
    }

    pub fn abstained_total(&self) -> u64 {
        self.abstained_total.load(Ordering::Relaxed)
    }

    pub fn status_count(&self, status: u16) -> u64 {
        self.lock().status_counts.get(&status).copied().unwrap_or(0)
    }

    pub fn action_count(&self, action: &str) -> u64 {
        self.lock().action_counts.get(action).copied().unwrap_or(0)
    }

    /// Emit the end-of-run summary through the normal logging pipeline.
    pub fn log_summary(&self) {
        let elapsed = self.started.elapsed();
        let executed = self.executed_total.load(Ordering::Relaxed);
        let exhausted = self.exhausted_total.load(Ordering::Relaxed);
        let abstained = self.abstained_total.load(Ordering::Relaxed);
        let stalls = self.stalls_total.load(Ordering::Relaxed);

        let counters = self.lock();
        let mut latencies = counters.latencies_ms.clone();
        latencies.sort_unstable();
        let pct = |p: f64| -> u64 {
            if latencies.is_empty() {
                return 0;
            }
            let rank = ((p / 100.0) * (latencies.len() as f64 - 1.0)).round() as usize;
            latencies[rank]
        };
        let avg = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
        };

        tracing::info!(
            finished_at = %chrono::Utc::now().to_rfc3339(),
            elapsed_secs = elapsed.as_secs_f64(),
            executed,
            retry_exhausted = exhausted,
            abstained,
            stalls,
            throughput_per_sec = executed as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
            "run summary"
        );
        if !latencies.is_empty() {
            tracing::info!(
                min = latencies.first().copied().unwrap_or(0),
                p50 = pct(50.0),
                p90 = pct(90.0),
                p99 = pct(99.0),
                max = latencies.last().copied().unwrap_or(0),
                avg = format!("{avg:.2}").as_str(),
                "latency ms"
            );
        }
        let mut actions: Vec<_> = counters.action_counts.iter().collect();
        actions.sort();
        for (action, count) in actions {
            tracing::info!(action, count, "action count");
        }
        let mut statuses: Vec<_> = counters.status_counts.iter().collect();
        statuses.sort();
        for (status, count) in statuses {
            tracing::info!(status, count, "status count");
        }
    }
}
