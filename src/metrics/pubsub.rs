//! Bulk pub/sub ingress metrics.

use super::METER_SCOPE;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::sync::OnceLock;

/// Lazy-initialized meter for pub/sub metrics
static PUBSUB_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    PUBSUB_METER.get_or_init(|| opentelemetry::global::meter(METER_SCOPE))
}

/// Time spent dispatching one bulk batch to the application, in milliseconds
///
/// Labels:
/// - component: subscribing pub/sub component name
/// - topic: subscribed topic
pub fn bulk_ingress_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("sidecar.pubsub.bulk_ingress.duration")
        .with_description("Time spent dispatching a bulk batch to the application")
        .with_unit("ms")
        .build()
}

/// Entries processed by bulk subscriptions, by outcome class
///
/// Labels:
/// - component: subscribing pub/sub component name
/// - topic: subscribed topic
/// - status: success, retry, drop
pub fn bulk_ingress_entries_total() -> Counter<u64> {
    meter()
        .u64_counter("sidecar.pubsub.bulk_ingress.entries")
        .with_description("Entries processed by bulk subscriptions, by outcome class")
        .build()
}
