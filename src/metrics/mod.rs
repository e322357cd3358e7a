use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// In-memory counters and samples for one run. Shared across iterations via
/// `Arc`; the snapshot is the reporting boundary, there is no export backend.
#[derive(Debug, Default)]
pub struct Metrics {
    iterations: AtomicU64,
    failed_requests: AtomicU64,
    slow_requests: AtomicU64,
    durations: Mutex<HashMap<String, Vec<f64>>>,
    validation_failures: Mutex<HashMap<(String, String), u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_request(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_slow_request(&self) {
        self.slow_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Response-time sample in milliseconds, tagged by endpoint name.
    pub fn record_duration(&self, endpoint: &str, duration_ms: f64) {
        let mut durations = self.durations.lock().unwrap();
        durations
            .entry(endpoint.to_string())
            .or_default()
            .push(duration_ms);
    }

    /// Failed field check, tagged by field name and validator type.
    pub fn record_validation_failure(&self, field: &str, type_name: &str) {
        let mut failures = self.validation_failures.lock().unwrap();
        *failures
            .entry((field.to_string(), type_name.to_string()))
            .or_default() += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let iterations = self.iterations.load(Ordering::Relaxed);
        let failed_requests = self.failed_requests.load(Ordering::Relaxed);
        let slow_requests = self.slow_requests.load(Ordering::Relaxed);

        let endpoints = self
            .durations
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoint, samples)| (endpoint.clone(), DurationStats::from_samples(samples)))
            .collect();

        let validation_failures = self
            .validation_failures
            .lock()
            .unwrap()
            .iter()
            .map(|((field, type_name), count)| (format!("{field}/{type_name}"), *count))
            .collect();

        MetricsSnapshot {
            iterations,
            failed_requests,
            failed_rate: rate(failed_requests, iterations),
            slow_requests,
            slow_rate: rate(slow_requests, iterations),
            endpoints,
            validation_failures,
        }
    }
}

fn rate(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub iterations: u64,
    pub failed_requests: u64,
    pub failed_rate: f64,
    pub slow_requests: u64,
    pub slow_rate: f64,
    pub endpoints: BTreeMap<String, DurationStats>,
    /// `field/type` label -> failed check count.
    pub validation_failures: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurationStats {
    pub count: usize,
    pub min_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
}

impl DurationStats {
    fn from_samples(samples: &[f64]) -> Self {
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let min_ms = sorted.first().copied().unwrap_or(0.0);
        let max_ms = sorted.last().copied().unwrap_or(0.0);
        let mean_ms = if count == 0 {
            0.0
        } else {
            sorted.iter().sum::<f64>() / count as f64
        };
        let p95_ms = percentile(&sorted, 0.95);

        Self {
            count,
            min_ms,
            mean_ms,
            max_ms,
            p95_ms,
        }
    }
}

/// Nearest-rank percentile over an already sorted sample set.
fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (quantile * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_are_zero_for_empty_runs() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.iterations, 0);
        assert_eq!(snapshot.failed_rate, 0.0);
        assert_eq!(snapshot.slow_rate, 0.0);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = Metrics::new();
        for _ in 0..4 {
            metrics.record_iteration();
        }
        metrics.record_failed_request();
        metrics.record_slow_request();
        metrics.record_slow_request();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.failed_rate, 0.25);
        assert_eq!(snapshot.slow_requests, 2);
        assert_eq!(snapshot.slow_rate, 0.5);
    }

    #[test]
    fn duration_stats_track_min_mean_max() {
        let metrics = Metrics::new();
        metrics.record_duration("login", 10.0);
        metrics.record_duration("login", 20.0);
        metrics.record_duration("login", 60.0);
        metrics.record_duration("health", 5.0);

        let snapshot = metrics.snapshot();
        let login = &snapshot.endpoints["login"];
        assert_eq!(login.count, 3);
        assert_eq!(login.min_ms, 10.0);
        assert_eq!(login.mean_ms, 30.0);
        assert_eq!(login.max_ms, 60.0);
        assert_eq!(snapshot.endpoints["health"].count, 1);
    }

    #[test]
    fn p95_uses_nearest_rank() {
        let samples: Vec<f64> = (1..=100).map(|n| n as f64).collect();
        assert_eq!(percentile(&samples, 0.95), 95.0);
        assert_eq!(percentile(&[7.0], 0.95), 7.0);
    }

    #[test]
    fn validation_failures_are_tagged_by_field_and_type() {
        let metrics = Metrics::new();
        metrics.record_validation_failure("email", "email");
        metrics.record_validation_failure("email", "email");
        metrics.record_validation_failure("id", "uuid");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.validation_failures["email/email"], 2);
        assert_eq!(snapshot.validation_failures["id/uuid"], 1);
    }
}
