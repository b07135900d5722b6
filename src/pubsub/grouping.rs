//! # Message Grouper
//!
//! Validates each entry of a batch, decodes it according to the batch mode
//! and partitions the routable entries by destination path. Entries that
//! are rejected or dropped get their verdict immediately and keep their slot
//! in the outcome array.

use super::diagnostics::{BulkIngressDiagnostics, IngressStatus};
use super::errors::EntryError;
use super::message::{
    BulkBatch, BulkEntry, BulkOutcome, BulkSubscribeMessageItem, DEFAULT_BINARY_CONTENT_TYPE,
    EXPIRATION_FIELD, ID_FIELD,
};
use super::routing::{MatchInput, RouteMatcher, TopicRoute};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{error, warn};

/// Entry routed to a path, remembering its position in the batch
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedEntry {
    /// Index of the entry in the original batch
    pub index: usize,
    /// Representation sent to the application
    pub item: BulkSubscribeMessageItem,
}

/// Entries resolved to the same application path, in batch order
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGroup {
    pub path: String,
    pub entries: Vec<GroupedEntry>,
}

impl RouteGroup {
    fn new(path: String) -> Self {
        Self {
            path,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Batch indices of the grouped entries
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|entry| entry.index)
    }
}

/// Result of validating and partitioning a batch
#[derive(Debug, Clone, Default)]
pub struct GroupedBatch {
    /// Groups in order of first appearance in the batch
    pub groups: Vec<RouteGroup>,
    /// Outcome array; slots of routed entries are still unpopulated
    pub outcomes: Vec<BulkOutcome>,
    /// Indices of entries dropped as expired or unmatched
    pub dropped: Vec<usize>,
    /// Whether any entry was rejected with an error
    pub has_error: bool,
    pub diagnostics: BulkIngressDiagnostics,
}

/// Validates, decodes and routes every entry of `batch`.
pub fn group_entries(
    batch: &BulkBatch,
    route: &TopicRoute,
    raw_payload: bool,
    matcher: &dyn RouteMatcher,
    now: DateTime<Utc>,
) -> GroupedBatch {
    let mut grouped = GroupedBatch {
        outcomes: vec![BulkOutcome::default(); batch.len()],
        ..Default::default()
    };
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, entry) in batch.entries.iter().enumerate() {
        if entry.entry_id.is_empty() {
            warn!(
                topic = %batch.topic,
                index = index,
                "Invalid blank entry id received while processing bulk pub/sub event, won't be able to process it"
            );
            grouped.outcomes[index] = BulkOutcome::failed("", EntryError::BlankEntryId);
            grouped.has_error = true;
            continue;
        }

        let routed = if raw_payload {
            route_raw(entry, route, matcher)
        } else {
            route_structured(entry, route, matcher, now, &batch.topic)
        };

        match routed {
            Routed::To(path, item) => {
                let position = *positions.entry(path.clone()).or_insert_with(|| {
                    grouped.groups.push(RouteGroup::new(path));
                    grouped.groups.len() - 1
                });
                grouped.groups[position]
                    .entries
                    .push(GroupedEntry { index, item });
            }
            Routed::Dropped => {
                grouped.diagnostics.increment(IngressStatus::Drop);
                grouped.outcomes[index] = BulkOutcome::success(entry.entry_id.clone());
                grouped.dropped.push(index);
            }
            Routed::Rejected(error) => {
                grouped.outcomes[index] = BulkOutcome::failed(entry.entry_id.clone(), error);
                grouped.has_error = true;
            }
        }
    }

    grouped
}

enum Routed {
    To(String, BulkSubscribeMessageItem),
    Dropped,
    Rejected(EntryError),
}

fn route_raw(entry: &BulkEntry, route: &TopicRoute, matcher: &dyn RouteMatcher) -> Routed {
    let text = String::from_utf8_lossy(&entry.event);
    let path = match resolve_path(entry, route, matcher, MatchInput::Raw(&text)) {
        Ok(Some(path)) => path,
        Ok(None) => return Routed::Dropped,
        Err(error) => return Routed::Rejected(error),
    };

    let content_type = if entry.content_type.is_empty() {
        DEFAULT_BINARY_CONTENT_TYPE.to_string()
    } else {
        entry.content_type.clone()
    };
    Routed::To(
        path,
        BulkSubscribeMessageItem {
            entry_id: entry.entry_id.clone(),
            event: Value::String(BASE64.encode(&entry.event)),
            content_type,
            metadata: entry.metadata.clone(),
        },
    )
}

fn route_structured(
    entry: &BulkEntry,
    route: &TopicRoute,
    matcher: &dyn RouteMatcher,
    now: DateTime<Utc>,
    topic: &str,
) -> Routed {
    let cloud_event: Map<String, Value> = match serde_json::from_slice(&entry.event) {
        Ok(event) => event,
        Err(e) => {
            error!(
                topic = %topic,
                entry_id = %entry.entry_id,
                error = %e,
                "Error deserializing one of the messages in bulk cloud event"
            );
            return Routed::Rejected(EntryError::event_deserialization(
                entry.entry_id.clone(),
                e.to_string(),
            ));
        }
    };

    if has_expired(&cloud_event, now) {
        warn!(
            topic = %topic,
            event_id = ?cloud_event.get(ID_FIELD),
            expiration = ?cloud_event.get(EXPIRATION_FIELD),
            "Dropping expired pub/sub event"
        );
        return Routed::Dropped;
    }

    let path = match resolve_path(entry, route, matcher, MatchInput::Structured(&cloud_event)) {
        Ok(Some(path)) => path,
        Ok(None) => return Routed::Dropped,
        Err(error) => return Routed::Rejected(error),
    };

    Routed::To(
        path,
        BulkSubscribeMessageItem {
            entry_id: entry.entry_id.clone(),
            event: Value::Object(cloud_event),
            content_type: entry.content_type.clone(),
            metadata: entry.metadata.clone(),
        },
    )
}

fn resolve_path(
    entry: &BulkEntry,
    route: &TopicRoute,
    matcher: &dyn RouteMatcher,
    input: MatchInput<'_>,
) -> Result<Option<String>, EntryError> {
    match matcher.match_route(&route.rules, input) {
        Ok(Some(path)) => Ok(Some(path)),
        Ok(None) => {
            warn!(
                entry_id = %entry.entry_id,
                "No matching route for event in bulk subscribe; skipping"
            );
            Ok(None)
        }
        Err(e) => {
            error!(
                entry_id = %entry.entry_id,
                error = %e,
                "Error finding matching route for event in bulk subscribe"
            );
            Err(EntryError::route_match(entry.entry_id.clone(), e.to_string()))
        }
    }
}

/// True when the event carries a parseable expiration that is already past.
pub fn has_expired(cloud_event: &Map<String, Value>, now: DateTime<Utc>) -> bool {
    cloud_event
        .get(EXPIRATION_FIELD)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .is_some_and(|expiration| now > expiration.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::routing::{RouteRule, RuleRouteMatcher};
    use serde_json::json;

    fn batch(entries: Vec<BulkEntry>) -> BulkBatch {
        BulkBatch::new("orders", entries)
    }

    #[test]
    fn test_groups_preserve_batch_order() {
        let route = TopicRoute::with_rules(vec![
            RouteRule::when("type1", r#"event.type == "type1""#),
            RouteRule::when("type2", r#"event.type == "type2""#),
        ]);
        let entries = vec![
            BulkEntry::new("a", r#"{"type":"type2"}"#),
            BulkEntry::new("b", r#"{"type":"type1"}"#),
            BulkEntry::new("c", r#"{"type":"type2"}"#),
            BulkEntry::new("d", r#"{"type":"type1"}"#),
        ];

        let grouped = group_entries(&batch(entries), &route, false, &RuleRouteMatcher, Utc::now());

        assert_eq!(grouped.groups.len(), 2);
        assert_eq!(grouped.groups[0].path, "type2");
        assert_eq!(grouped.groups[0].indices().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(grouped.groups[1].path, "type1");
        assert_eq!(grouped.groups[1].indices().collect::<Vec<_>>(), vec![1, 3]);
        assert!(!grouped.has_error);
        assert!(grouped.outcomes.iter().all(|o| !o.is_populated()));
    }

    #[test]
    fn test_raw_entries_are_base64_encoded() {
        let route = TopicRoute::single("orders");
        let entries = vec![
            BulkEntry::new("a", r#"{"orderId":"1"}"#),
            BulkEntry::new("b", "plain").with_content_type("text/plain"),
        ];

        let grouped = group_entries(&batch(entries), &route, true, &RuleRouteMatcher, Utc::now());

        let items = &grouped.groups[0].entries;
        assert_eq!(items[0].item.event, json!("eyJvcmRlcklkIjoiMSJ9"));
        assert_eq!(items[0].item.content_type, DEFAULT_BINARY_CONTENT_TYPE);
        assert_eq!(items[1].item.content_type, "text/plain");
    }

    #[test]
    fn test_rejections_and_drops_keep_their_slot() {
        let route = TopicRoute::with_rules(vec![RouteRule::when("p", r#"event.type == "keep""#)]);
        let entries = vec![
            BulkEntry::new("", r#"{"type":"keep"}"#),
            BulkEntry::new("bad-json", "{not json"),
            BulkEntry::new("unmatched", r#"{"type":"other"}"#),
            BulkEntry::new(
                "expired",
                r#"{"type":"keep","expiration":"2020-01-01T00:00:00Z"}"#,
            ),
            BulkEntry::new("ok", r#"{"type":"keep"}"#),
        ];

        let grouped = group_entries(&batch(entries), &route, false, &RuleRouteMatcher, Utc::now());

        assert!(grouped.has_error);
        assert_eq!(grouped.outcomes[0], BulkOutcome::failed("", EntryError::BlankEntryId));
        assert!(matches!(
            grouped.outcomes[1].error,
            Some(EntryError::EventDeserialization { .. })
        ));
        assert_eq!(grouped.outcomes[2], BulkOutcome::success("unmatched"));
        assert_eq!(grouped.outcomes[3], BulkOutcome::success("expired"));
        assert!(!grouped.outcomes[4].is_populated());
        assert_eq!(grouped.dropped, vec![2, 3]);
        assert_eq!(grouped.diagnostics.count(IngressStatus::Drop), 2);
        assert_eq!(grouped.groups.len(), 1);
        assert_eq!(grouped.groups[0].len(), 1);
    }

    #[test]
    fn test_route_error_marks_entry() {
        let route = TopicRoute::with_rules(vec![RouteRule::when("p", "nonsense")]);
        let entries = vec![BulkEntry::new("a", r#"{"type":"x"}"#)];

        let grouped = group_entries(&batch(entries), &route, false, &RuleRouteMatcher, Utc::now());

        assert!(grouped.has_error);
        assert!(matches!(
            grouped.outcomes[0].error,
            Some(EntryError::RouteMatch { .. })
        ));
        assert!(grouped.groups.is_empty());
    }

    #[test]
    fn test_expiration_check() {
        let now = Utc::now();
        let future = (now + chrono::Duration::hours(1)).to_rfc3339();
        let expired = json!({"expiration": "2001-01-01T00:00:00Z"});
        let live = json!({ "expiration": future });
        let garbage = json!({"expiration": "tomorrow"});

        assert!(has_expired(expired.as_object().unwrap(), now));
        assert!(!has_expired(live.as_object().unwrap(), now));
        assert!(!has_expired(garbage.as_object().unwrap(), now));
    }
}
