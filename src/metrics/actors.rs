//! Actor timer metrics.

use super::METER_SCOPE;
use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

static ACTORS_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    ACTORS_METER.get_or_init(|| opentelemetry::global::meter(METER_SCOPE))
}

/// Timer ticks delivered to actors
///
/// Labels:
/// - actor_type
/// - success: whether the timer callback succeeded
pub fn timers_fired_total() -> Counter<u64> {
    meter()
        .u64_counter("sidecar.actors.timers_fired")
        .with_description("Timer ticks delivered to actors")
        .build()
}

/// Live timers per actor type
///
/// Labels:
/// - actor_type
pub fn active_timers() -> Gauge<i64> {
    meter()
        .i64_gauge("sidecar.actors.active_timers")
        .with_description("Live timers per actor type")
        .build()
}

/// Records one delivered tick
pub fn record_timer_fired(actor_type: &str, success: bool) {
    timers_fired_total().add(
        1,
        &[
            KeyValue::new("actor_type", actor_type.to_string()),
            KeyValue::new("success", success),
        ],
    );
}

/// Records the current number of live timers for an actor type
pub fn record_active_timers(actor_type: &str, count: i64) {
    active_timers().record(count, &[KeyValue::new("actor_type", actor_type.to_string())]);
}
