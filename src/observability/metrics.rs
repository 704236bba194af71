//! Metrics collection for chat, probe and workspace calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Metrics collector interface.
pub trait MetricsCollector: Send + Sync {
    /// Records a finished request.
    fn record_request(&self, operation: &str, success: bool, duration: Duration);

    /// Records a failure by error kind.
    fn record_error(&self, kind: &str);

    /// Records text deltas delivered to a stream consumer.
    fn record_deltas(&self, count: u64);

    /// Records a stream cancelled by the caller.
    fn record_cancellation(&self);

    /// Records a frame the parser could not decode.
    fn record_skipped_frames(&self, count: u64);

    /// Returns a snapshot.
    fn snapshot(&self) -> ChatMetrics;

    /// Resets all counters.
    fn reset(&self);
}

/// Metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatMetrics {
    /// Total requests.
    pub total_requests: u64,
    /// Successful requests.
    pub successful_requests: u64,
    /// Failed requests.
    pub failed_requests: u64,
    /// Summed latency in milliseconds.
    pub total_latency_ms: u64,
    /// Text deltas delivered.
    pub deltas: u64,
    /// Streams cancelled by the caller.
    pub cancellations: u64,
    /// Malformed frames skipped.
    pub skipped_frames: u64,
    /// Requests per operation.
    pub operations: HashMap<String, u64>,
    /// Failures per error kind.
    pub errors: HashMap<String, u64>,
}

impl ChatMetrics {
    /// Average latency in milliseconds.
    pub fn average_latency_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_requests as f64
        }
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            100.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }
}

/// In-memory metrics collector backed by atomics.
#[derive(Default)]
pub struct DefaultMetricsCollector {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_latency_ms: AtomicU64,
    deltas: AtomicU64,
    cancellations: AtomicU64,
    skipped_frames: AtomicU64,
    operations: RwLock<HashMap<String, u64>>,
    errors: RwLock<HashMap<String, u64>>,
}

impl DefaultMetricsCollector {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsCollector for DefaultMetricsCollector {
    fn record_request(&self, operation: &str, success: bool, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);

        if let Ok(mut ops) = self.operations.write() {
            *ops.entry(operation.to_string()).or_insert(0) += 1;
        }
    }

    fn record_error(&self, kind: &str) {
        if let Ok(mut errors) = self.errors.write() {
            *errors.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    fn record_deltas(&self, count: u64) {
        self.deltas.fetch_add(count, Ordering::Relaxed);
    }

    fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skipped_frames(&self, count: u64) {
        self.skipped_frames.fetch_add(count, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ChatMetrics {
        ChatMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            total_latency_ms: self.total_latency_ms.load(Ordering::Relaxed),
            deltas: self.deltas.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            skipped_frames: self.skipped_frames.load(Ordering::Relaxed),
            operations: self.operations.read().map(|o| o.clone()).unwrap_or_default(),
            errors: self.errors.read().map(|e| e.clone()).unwrap_or_default(),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.total_requests,
            &self.successful_requests,
            &self.failed_requests,
            &self.total_latency_ms,
            &self.deltas,
            &self.cancellations,
            &self.skipped_frames,
        ] {
            counter.store(0, Ordering::Relaxed);
        }

        if let Ok(mut ops) = self.operations.write() {
            ops.clear();
        }
        if let Ok(mut errors) = self.errors.write() {
            errors.clear();
        }
    }
}

impl std::fmt::Debug for DefaultMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultMetricsCollector")
            .field("total_requests", &self.total_requests.load(Ordering::Relaxed))
            .field("failed_requests", &self.failed_requests.load(Ordering::Relaxed))
            .field("deltas", &self.deltas.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request() {
        let collector = DefaultMetricsCollector::new();

        collector.record_request("stream_chat", true, Duration::from_millis(100));
        collector.record_request("stream_chat", true, Duration::from_millis(200));
        collector.record_request("probe", false, Duration::from_millis(50));

        let metrics = collector.snapshot();
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.total_latency_ms, 350);
        assert_eq!(metrics.operations.get("stream_chat"), Some(&2));
        assert!((metrics.success_rate() - 66.6).abs() < 0.1);
    }

    #[test]
    fn test_stream_counters() {
        let collector = DefaultMetricsCollector::new();

        collector.record_deltas(3);
        collector.record_deltas(2);
        collector.record_cancellation();
        collector.record_skipped_frames(1);
        collector.record_error("network");

        let metrics = collector.snapshot();
        assert_eq!(metrics.deltas, 5);
        assert_eq!(metrics.cancellations, 1);
        assert_eq!(metrics.skipped_frames, 1);
        assert_eq!(metrics.errors.get("network"), Some(&1));
    }

    #[test]
    fn test_reset() {
        let collector = DefaultMetricsCollector::new();

        collector.record_request("chat", true, Duration::from_millis(100));
        collector.record_deltas(4);
        collector.record_error("server");
        collector.reset();

        assert_eq!(collector.snapshot(), ChatMetrics::default());
    }
}
