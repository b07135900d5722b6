//! Order-event fixtures and subscriber builders.

use super::mocks::{MockAppChannel, RecordingMetrics, RecordingPublisher};
use serde_json::json;
use sidecar_core::pubsub::message::RAW_PAYLOAD_KEY;
use sidecar_core::pubsub::{BulkBatch, BulkEntry, BulkSubscriber, RouteRule, TopicRoute};
use std::sync::Arc;

pub const PUBSUB_NAME: &str = "orderpubsub";
pub const TOPIC: &str = "orders";
pub const DEAD_LETTER_TOPIC: &str = "orders-dlq";

/// Entry ids of the ten-order batch, in batch order
pub const ORDER_IDS: [&str; 10] = [
    "1111111a",
    "2222222b",
    "333333c",
    "4444444d",
    "5555555e",
    "6666666f",
    "7777777g",
    "8888888h",
    "9999999i",
    "10101010j",
];

/// Cloud event for order `n` with the given event type
pub fn order_event(n: usize, event_type: &str) -> serde_json::Value {
    json!({
        "specversion": "1.0",
        "id": format!("evt-{n}"),
        "source": "checkout",
        "type": event_type,
        "datacontenttype": "application/json",
        "data": { "orderId": n },
    })
}

pub fn order_entry(entry_id: &str, n: usize, event_type: &str) -> BulkEntry {
    BulkEntry::new(entry_id, order_event(n, event_type).to_string())
        .with_content_type("application/cloudevents+json")
}

/// Ten orders: six `type1` (orders 1, 2, 3, 5, 7, 9) and four `type2`
pub fn ten_order_batch() -> BulkBatch {
    let entries = ORDER_IDS
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let n = i + 1;
            let event_type = if matches!(n, 1 | 2 | 3 | 5 | 7 | 9) {
                "type1"
            } else {
                "type2"
            };
            order_entry(id, n, event_type)
        })
        .collect();
    BulkBatch::new(TOPIC, entries)
}

/// Batch of single-route orders with the given ids
pub fn orders_batch(ids: &[&str]) -> BulkBatch {
    let entries = ids
        .iter()
        .enumerate()
        .map(|(i, id)| order_entry(id, i + 1, "type1"))
        .collect();
    BulkBatch::new(TOPIC, entries)
}

/// Routes `type1` and `type2` events to their own paths
pub fn typed_route() -> TopicRoute {
    TopicRoute::with_rules(vec![
        RouteRule::when("/type1", r#"event.type == "type1""#),
        RouteRule::when("/type2", r#"event.type == "type2""#),
    ])
}

pub fn raw_route(path: &str) -> TopicRoute {
    TopicRoute::single(path).with_metadata(RAW_PAYLOAD_KEY, "true")
}

/// Subscriber wired to recording doubles
pub struct Harness {
    pub subscriber: BulkSubscriber,
    pub channel: Arc<MockAppChannel>,
    pub publisher: Arc<RecordingPublisher>,
    pub metrics: Arc<RecordingMetrics>,
}

impl Harness {
    pub fn new(route: TopicRoute, channel: MockAppChannel) -> Self {
        Self::with_publisher(route, channel, RecordingPublisher::new())
    }

    pub fn with_publisher(
        route: TopicRoute,
        channel: MockAppChannel,
        publisher: RecordingPublisher,
    ) -> Self {
        let channel = Arc::new(channel);
        let publisher = Arc::new(publisher);
        let metrics = Arc::new(RecordingMetrics::new());
        let subscriber = BulkSubscriber::new(PUBSUB_NAME, route, channel.clone(), publisher.clone())
            .with_metrics(metrics.clone());
        Self {
            subscriber,
            channel,
            publisher,
            metrics,
        }
    }
}
