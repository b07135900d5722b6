//! # Bulk Message Structures
//!
//! Broker-facing batch types, the envelope posted to the application and the
//! per-entry response the application sends back.

use super::errors::{BulkDispatchError, EntryError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key stamped with the subscribing component name.
pub const PUBSUB_NAME_KEY: &str = "pubsubName";
/// Subscription metadata key selecting raw (non cloud event) delivery.
pub const RAW_PAYLOAD_KEY: &str = "rawPayload";
/// Content type used for raw entries that did not declare one.
pub const DEFAULT_BINARY_CONTENT_TYPE: &str = "application/octet-stream";
/// Content type of the envelope posted to the application.
pub const CLOUD_EVENT_CONTENT_TYPE: &str = "application/cloudevents+json";
/// `type` attribute of every bulk envelope.
pub const BULK_EVENT_TYPE: &str = "com.dapr.event.sent.bulk";
/// Cloud event attribute holding the RFC 3339 expiration time.
pub const EXPIRATION_FIELD: &str = "expiration";
/// Cloud event attribute holding the event id.
pub const ID_FIELD: &str = "id";

/// One message within a broker batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkEntry {
    /// Caller-supplied identifier; blank identifiers are rejected
    pub entry_id: String,
    /// Opaque event payload
    pub event: Vec<u8>,
    /// Declared content type, possibly empty
    pub content_type: String,
    /// Per-entry metadata
    pub metadata: HashMap<String, String>,
}

impl BulkEntry {
    pub fn new(entry_id: impl Into<String>, event: impl Into<Vec<u8>>) -> Self {
        Self {
            entry_id: entry_id.into(),
            event: event.into(),
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Broker-delivered unit of work, consumed within one dispatch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkBatch {
    pub topic: String,
    pub entries: Vec<BulkEntry>,
    pub metadata: HashMap<String, String>,
}

impl BulkBatch {
    pub fn new(topic: impl Into<String>, entries: Vec<BulkEntry>) -> Self {
        Self {
            topic: topic.into(),
            entries,
            metadata: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Terminal verdict for one entry, index-aligned with the input batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Echoed entry id; empty only when the request's own id was blank
    pub entry_id: String,
    /// `None` means delivered or intentionally dropped
    pub error: Option<EntryError>,
}

impl BulkOutcome {
    pub fn success(entry_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            error: None,
        }
    }

    pub fn failed(entry_id: impl Into<String>, error: EntryError) -> Self {
        Self {
            entry_id: entry_id.into(),
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// A slot counts as populated once a verdict has been written into it.
    pub fn is_populated(&self) -> bool {
        !self.entry_id.is_empty() || self.error.is_some()
    }
}

/// What the bulk handler hands back to the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkHandleResult {
    /// Every entry has a verdict; entries in error should be retried by the broker
    Completed(Vec<BulkOutcome>),
    /// Entries in error were handed off to the dead-letter topic; do not retry
    DeadLettered,
    /// Batch-level failure alongside the per-entry verdicts
    Failed {
        outcomes: Vec<BulkOutcome>,
        error: BulkDispatchError,
    },
}

impl BulkHandleResult {
    /// Per-entry verdicts, absent when the batch was dead-lettered
    pub fn outcomes(&self) -> Option<&[BulkOutcome]> {
        match self {
            Self::Completed(outcomes) | Self::Failed { outcomes, .. } => Some(outcomes),
            Self::DeadLettered => None,
        }
    }

    pub fn error(&self) -> Option<&BulkDispatchError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// One entry inside the envelope posted to the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSubscribeMessageItem {
    #[serde(rename = "entryId")]
    pub entry_id: String,
    /// Cloud event object, or the base64 string of a raw payload
    pub event: serde_json::Value,
    #[serde(rename = "contentType", default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Grouped request sent to one application route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSubscribeEnvelope {
    pub id: String,
    pub entries: Vec<BulkSubscribeMessageItem>,
    pub metadata: HashMap<String, String>,
    pub topic: String,
    #[serde(rename = "pubsubname")]
    pub pubsub: String,
    #[serde(rename = "type")]
    pub event_type: String,
}

/// Per-entry status vocabulary accepted from the application
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppResponseStatus {
    #[default]
    Empty,
    Success,
    Retry,
    Drop,
    Unknown(String),
}

impl From<String> for AppResponseStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => Self::Empty,
            "SUCCESS" => Self::Success,
            "RETRY" => Self::Retry,
            "DROP" => Self::Drop,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for AppResponseStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<AppResponseStatus> for String {
    fn from(status: AppResponseStatus) -> Self {
        match status {
            AppResponseStatus::Empty => String::new(),
            AppResponseStatus::Success => "SUCCESS".to_string(),
            AppResponseStatus::Retry => "RETRY".to_string(),
            AppResponseStatus::Drop => "DROP".to_string(),
            AppResponseStatus::Unknown(other) => other,
        }
    }
}

/// Status returned by the application for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppBulkResponseEntry {
    #[serde(rename = "entryId")]
    pub entry_id: String,
    #[serde(default)]
    pub status: AppResponseStatus,
}

impl AppBulkResponseEntry {
    pub fn new(entry_id: impl Into<String>, status: impl Into<AppResponseStatus>) -> Self {
        Self {
            entry_id: entry_id.into(),
            status: status.into(),
        }
    }
}

/// Body of a 2xx application response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppBulkResponse {
    #[serde(default)]
    pub statuses: Vec<AppBulkResponseEntry>,
}
