//! Metrics module - control loop timing and request accounting

use hdrhistogram::{CreationError, Histogram};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// TIMING METRICS - Thread-safe performance tracking
// ============================================================================

#[derive(Clone)]
pub struct TimingMetrics {
    compute_hist: Arc<Mutex<Histogram<u64>>>,
    tick_hist: Arc<Mutex<Histogram<u64>>>,
    // Jitter tracking (variance in tick duration)
    last_tick_ns: Arc<AtomicU64>,
    jitter_hist: Arc<Mutex<Histogram<u64>>>,
    ticks: Arc<AtomicU64>,
    missed_deadlines: Arc<AtomicU64>,
    admin_requests: Arc<AtomicU64>,
    rejected_requests: Arc<AtomicU64>,
}

impl TimingMetrics {
    pub fn new() -> Result<Self, CreationError> {
        Ok(Self {
            compute_hist: Arc::new(Mutex::new(Histogram::new(3)?)),
            tick_hist: Arc::new(Mutex::new(Histogram::new(3)?)),
            last_tick_ns: Arc::new(AtomicU64::new(0)),
            jitter_hist: Arc::new(Mutex::new(Histogram::new(3)?)),
            ticks: Arc::new(AtomicU64::new(0)),
            missed_deadlines: Arc::new(AtomicU64::new(0)),
            admin_requests: Arc::new(AtomicU64::new(0)),
            rejected_requests: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Time spent inside `compute`, lock acquisition included.
    pub fn record_compute(&self, duration: Duration) {
        self.compute_hist.lock().record(duration.as_nanos() as u64).ok();
    }

    /// Records how long a tick's work took and whether it overran `period`.
    pub fn record_tick(&self, busy: Duration, period: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let nanos = busy.as_nanos() as u64;
        self.tick_hist.lock().record(nanos).ok();
        if busy > period {
            self.missed_deadlines.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records the wall-clock interval between consecutive tick starts.
    pub fn record_cycle_jitter(&self, cycle: Duration) {
        let cycle_ns = cycle.as_nanos() as u64;
        let last = self.last_tick_ns.swap(cycle_ns, Ordering::Relaxed);
        if last > 0 {
            self.jitter_hist.lock().record(cycle_ns.abs_diff(last)).ok();
        }
    }

    pub fn record_admin_request(&self, accepted: bool) {
        self.admin_requests.fetch_add(1, Ordering::Relaxed);
        if !accepted {
            self.rejected_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn report(&self) -> MetricsReport {
        let compute = self.compute_hist.lock();
        let tick = self.tick_hist.lock();
        let jitter = self.jitter_hist.lock();

        MetricsReport {
            compute_p50: Duration::from_nanos(compute.value_at_quantile(0.5)),
            compute_p99: Duration::from_nanos(compute.value_at_quantile(0.99)),
            tick_p50: Duration::from_nanos(tick.value_at_quantile(0.5)),
            tick_p99: Duration::from_nanos(tick.value_at_quantile(0.99)),
            jitter_p50: Duration::from_nanos(jitter.value_at_quantile(0.5)),
            jitter_p99: Duration::from_nanos(jitter.value_at_quantile(0.99)),
            ticks: self.ticks.load(Ordering::Relaxed),
            missed_deadlines: self.missed_deadlines.load(Ordering::Relaxed),
            admin_requests: self.admin_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// METRICS REPORT - Summary statistics
// ============================================================================

#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub compute_p50: Duration,
    pub compute_p99: Duration,
    pub tick_p50: Duration,
    pub tick_p99: Duration,
    pub jitter_p50: Duration,
    pub jitter_p99: Duration,
    pub ticks: u64,
    pub missed_deadlines: u64,
    pub admin_requests: u64,
    pub rejected_requests: u64,
}

impl MetricsReport {
    pub fn deadline_compliance(&self) -> f64 {
        if self.ticks > 0 {
            (self.ticks - self.missed_deadlines) as f64 / self.ticks as f64 * 100.0
        } else {
            100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_missed_deadlines() {
        let metrics = TimingMetrics::new().unwrap();
        let period = Duration::from_millis(10);
        metrics.record_tick(Duration::from_millis(2), period);
        metrics.record_tick(Duration::from_millis(12), period);
        metrics.record_tick(Duration::from_millis(3), period);

        let report = metrics.report();
        assert_eq!(report.ticks, 3);
        assert_eq!(report.missed_deadlines, 1);
        assert!((report.deadline_compliance() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn jitter_is_difference_of_consecutive_cycles() {
        let metrics = TimingMetrics::new().unwrap();
        metrics.record_cycle_jitter(Duration::from_micros(10_000));
        metrics.record_cycle_jitter(Duration::from_micros(10_500));
        let report = metrics.report();
        let jitter = report.jitter_p50.as_micros() as i64;
        assert!((jitter - 500).abs() <= 1, "jitter {jitter}us");
    }

    #[test]
    fn empty_report_is_fully_compliant() {
        let report = TimingMetrics::new().unwrap().report();
        assert_eq!(report.ticks, 0);
        assert_eq!(report.deadline_compliance(), 100.0);
    }

    #[test]
    fn request_counters() {
        let metrics = TimingMetrics::new().unwrap();
        metrics.record_admin_request(true);
        metrics.record_admin_request(false);
        let report = metrics.report();
        assert_eq!(report.admin_requests, 2);
        assert_eq!(report.rejected_requests, 1);
    }
}
