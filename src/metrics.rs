//! Observability metrics: search latency, insert/batch throughput.

use std::time::Duration;

/// Collects runtime metrics for the vector store.
#[derive(Debug)]
pub struct MetricsCollector {
    search_latencies_us: Vec<f64>,
    total_searches: u64,
    total_inserts: u64,
    total_batch_items: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            search_latencies_us: Vec::new(),
            total_searches: 0,
            total_inserts: 0,
            total_batch_items: 0,
        }
    }

    /// Record a search with its duration.
    pub fn record_search(&mut self, duration: Duration) {
        self.total_searches += 1;
        self.search_latencies_us.push(duration.as_micros() as f64);
    }

    /// Record a single-vector insert.
    pub fn record_insert(&mut self) {
        self.total_inserts += 1;
    }

    /// Record a batch insert with its accepted item count.
    pub fn record_batch(&mut self, accepted: usize) {
        self.total_batch_items += accepted as u64;
    }

    pub fn total_searches(&self) -> u64 {
        self.total_searches
    }

    pub fn total_inserts(&self) -> u64 {
        self.total_inserts
    }

    pub fn total_batch_items(&self) -> u64 {
        self.total_batch_items
    }

    /// Average search latency in microseconds.
    pub fn avg_search_latency_us(&self) -> f64 {
        if self.search_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.search_latencies_us.iter().sum();
        sum / self.search_latencies_us.len() as f64
    }

    /// Get a percentile of search latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_search_latency_us(&self, percentile: f64) -> f64 {
        if self.search_latencies_us.is_empty() {
            return 0.0;
        }

        let mut sorted = self.search_latencies_us.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let mut m = MetricsCollector::new();
        m.record_insert();
        m.record_insert();
        m.record_batch(42);

        assert_eq!(m.total_inserts(), 2);
        assert_eq!(m.total_batch_items(), 42);
        assert_eq!(m.total_searches(), 0);
    }

    #[test]
    fn test_metrics_latency() {
        let mut m = MetricsCollector::new();
        m.record_search(Duration::from_micros(100));
        m.record_search(Duration::from_micros(200));
        m.record_search(Duration::from_micros(300));

        assert_eq!(m.total_searches(), 3);
        assert!((m.avg_search_latency_us() - 200.0).abs() < 1.0);
        assert!((m.percentile_search_latency_us(50.0) - 200.0).abs() < 1.0);
    }

    #[test]
    fn test_metrics_empty() {
        let m = MetricsCollector::new();
        assert_eq!(m.avg_search_latency_us(), 0.0);
        assert_eq!(m.percentile_search_latency_us(99.0), 0.0);
    }
}
