//! # Bulk Ingress Diagnostics
//!
//! Per-batch counters keyed by outcome class, accumulated while a batch is
//! dispatched and flushed once to an [`IngressMetrics`] sink when the batch
//! completes.

use crate::metrics::pubsub as pubsub_metrics;
use opentelemetry::KeyValue;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

/// Outcome class used for ingress accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngressStatus {
    Success,
    Retry,
    Drop,
}

impl IngressStatus {
    pub const ALL: [IngressStatus; 3] = [Self::Success, Self::Retry, Self::Drop];

    pub fn as_str(&self) -> &'static str {
        match self {
            IngressStatus::Success => "success",
            IngressStatus::Retry => "retry",
            IngressStatus::Drop => "drop",
        }
    }
}

/// Receives the flushed per-batch diagnostics
pub trait IngressMetrics: Send + Sync + Debug {
    fn record_bulk_ingress(&self, component: &str, topic: &str, elapsed_ms: f64);

    fn record_bulk_ingress_entries(
        &self,
        component: &str,
        topic: &str,
        status: IngressStatus,
        count: i64,
    );
}

/// Sink backed by the global OpenTelemetry meter
#[derive(Debug, Clone, Copy, Default)]
pub struct OtelIngressMetrics;

impl IngressMetrics for OtelIngressMetrics {
    fn record_bulk_ingress(&self, component: &str, topic: &str, elapsed_ms: f64) {
        pubsub_metrics::bulk_ingress_duration().record(
            elapsed_ms,
            &[
                KeyValue::new("component", component.to_string()),
                KeyValue::new("topic", topic.to_string()),
            ],
        );
    }

    fn record_bulk_ingress_entries(
        &self,
        component: &str,
        topic: &str,
        status: IngressStatus,
        count: i64,
    ) {
        // Counters are monotonic; a net-negative class has nothing to add
        if count <= 0 {
            return;
        }
        pubsub_metrics::bulk_ingress_entries_total().add(
            count as u64,
            &[
                KeyValue::new("component", component.to_string()),
                KeyValue::new("topic", topic.to_string()),
                KeyValue::new("status", status.as_str()),
            ],
        );
    }
}

/// Counters for one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkIngressDiagnostics {
    success: i64,
    retry: i64,
    drop: i64,
    elapsed_ms: f64,
    /// Set before the final dead-letter pass so entries already counted as
    /// retry are moved to drop instead of being counted twice
    retry_reported: bool,
}

impl BulkIngressDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, status: IngressStatus, count: i64) {
        match status {
            IngressStatus::Success => self.success += count,
            IngressStatus::Retry => self.retry += count,
            IngressStatus::Drop => self.drop += count,
        }
    }

    pub fn increment(&mut self, status: IngressStatus) {
        self.add(status, 1);
    }

    pub fn count(&self, status: IngressStatus) -> i64 {
        match status {
            IngressStatus::Success => self.success,
            IngressStatus::Retry => self.retry,
            IngressStatus::Drop => self.drop,
        }
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn mark_retry_reported(&mut self) {
        self.retry_reported = true;
    }

    pub fn retry_reported(&self) -> bool {
        self.retry_reported
    }

    /// Folds a route group's counters into the batch totals
    pub fn merge(&mut self, other: &BulkIngressDiagnostics) {
        self.success += other.success;
        self.retry += other.retry;
        self.drop += other.drop;
        self.elapsed_ms = self.elapsed_ms.max(other.elapsed_ms);
        self.retry_reported |= other.retry_reported;
    }

    /// Flushes the batch counters; consumes the accumulator so a batch is
    /// reported at most once.
    pub fn report(self, sink: &dyn IngressMetrics, component: &str, topic: &str) {
        debug!(
            component = %component,
            topic = %topic,
            success = self.success,
            retry = self.retry,
            drop = self.drop,
            elapsed_ms = self.elapsed_ms,
            "Reporting bulk ingress diagnostics"
        );
        sink.record_bulk_ingress(component, topic, self.elapsed_ms);
        for status in IngressStatus::ALL {
            sink.record_bulk_ingress_entries(component, topic, status, self.count(status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct RecordingSink {
        batches: Mutex<Vec<(String, f64)>>,
        entries: Mutex<Vec<(IngressStatus, i64)>>,
    }

    impl IngressMetrics for RecordingSink {
        fn record_bulk_ingress(&self, _component: &str, topic: &str, elapsed_ms: f64) {
            self.batches.lock().push((topic.to_string(), elapsed_ms));
        }

        fn record_bulk_ingress_entries(
            &self,
            _component: &str,
            _topic: &str,
            status: IngressStatus,
            count: i64,
        ) {
            self.entries.lock().push((status, count));
        }
    }

    #[test]
    fn test_counts_and_merge() {
        let mut batch = BulkIngressDiagnostics::new();
        batch.add(IngressStatus::Retry, 3);
        batch.increment(IngressStatus::Drop);

        let mut group = BulkIngressDiagnostics::new();
        group.add(IngressStatus::Success, 2);
        group.set_elapsed(Duration::from_millis(40));

        batch.merge(&group);
        assert_eq!(batch.count(IngressStatus::Success), 2);
        assert_eq!(batch.count(IngressStatus::Retry), 3);
        assert_eq!(batch.count(IngressStatus::Drop), 1);
        assert!((batch.elapsed_ms() - 40.0).abs() < f64::EPSILON);
        assert!(!batch.retry_reported());
    }

    #[test]
    fn test_report_flushes_every_status_once() {
        let sink = RecordingSink::default();
        let mut diag = BulkIngressDiagnostics::new();
        diag.add(IngressStatus::Success, 5);
        diag.report(&sink, "orderpubsub", "orders");

        assert_eq!(sink.batches.lock().len(), 1);
        let entries = sink.entries.lock();
        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&(IngressStatus::Success, 5)));
        assert!(entries.contains(&(IngressStatus::Retry, 0)));
    }
}
