use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Aggregated timings of one labelled call site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub calls: u64,
    /// Wall time across all calls, in seconds.
    pub total_time: f64,
    /// `total_time / calls`, in seconds.
    pub time_per_call: f64,
}

impl Metric {
    fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total_time += elapsed.as_secs_f64();
        self.time_per_call = self.total_time / self.calls as f64;
    }
}

/// Wall-clock timings keyed by call label.
#[derive(Clone, Debug, Default)]
pub struct Instrumentation {
    metrics: BTreeMap<&'static str, Metric>,
}

impl Instrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f`, charging its wall time to `label`.
    pub fn measure<T>(&mut self, label: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.record(label, start.elapsed());
        result
    }

    /// Charge one call of `elapsed` to `label`.
    pub fn record(&mut self, label: &'static str, elapsed: Duration) {
        self.metrics.entry(label).or_default().record(elapsed);
    }

    pub fn get(&self, label: &str) -> Option<&Metric> {
        self.metrics.get(label)
    }

    /// Remove and return the metric for `label`, zero if never measured.
    pub fn take(&mut self, label: &str) -> Metric {
        self.metrics.remove(label).unwrap_or_default()
    }

    pub fn into_metrics(self) -> BTreeMap<String, Metric> {
        self.metrics
            .into_iter()
            .map(|(label, metric)| (label.to_string(), metric))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_counts_calls_and_returns_result() {
        let mut instrumentation = Instrumentation::new();
        let value = instrumentation.measure("add_node", || 7);
        instrumentation.measure("add_node", || ());
        instrumentation.measure("ancestors", || ());

        assert_eq!(value, 7);
        let metric = instrumentation.get("add_node").unwrap();
        assert_eq!(metric.calls, 2);
        assert!(metric.total_time >= 0.0);
        assert!((metric.time_per_call * 2.0 - metric.total_time).abs() < 1e-9);
        assert_eq!(instrumentation.get("ancestors").unwrap().calls, 1);
    }

    #[test]
    fn take_removes_label() {
        let mut instrumentation = Instrumentation::new();
        instrumentation.measure("setup_total", || ());
        assert_eq!(instrumentation.take("setup_total").calls, 1);
        assert_eq!(instrumentation.take("setup_total"), Metric::default());
        assert!(instrumentation.into_metrics().is_empty());
    }
}
