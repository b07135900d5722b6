//! # Pub/Sub Error Types
//!
//! Error handling for bulk dispatch using thiserror. Errors come in two
//! layers: [`EntryError`] is recorded in a single entry's outcome slot and
//! never aborts a batch, while [`BulkDispatchError`] describes a failure of a
//! whole batch or route group.

use thiserror::Error;

/// Error recorded against one entry of a bulk batch.
///
/// Cloneable so the same verdict can be written into several outcome slots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("Blank entryID supplied - won't be able to process it")]
    BlankEntryId,

    #[error("error deserializing event for entry id {entry_id}: {message}")]
    EventDeserialization { entry_id: String, message: String },

    #[error("error finding matching route for entry id {entry_id}: {message}")]
    RouteMatch { entry_id: String, message: String },

    #[error("error serializing bulk envelope: {message}")]
    EnvelopeSerialization { message: String },

    #[error("error deserializing pubsub metadata: {message}")]
    MetadataDeserialization { message: String },

    #[error("RETRY required while processing bulk subscribe event for entry id: {entry_id}")]
    RetryRequired { entry_id: String },

    #[error("unknown status returned from app while processing bulk subscribe event {entry_id}: {status}")]
    UnknownStatus { entry_id: String, status: String },

    #[error("Response not received, RETRY required while processing bulk subscribe event for entry id: {entry_id}")]
    ResponseNotReceived { entry_id: String },

    #[error("retriable error returned from app while processing bulk pub/sub event, topic: {topic}. status code returned: {status_code}")]
    RetriableStatus { topic: String, status_code: u16 },

    #[error("error from app channel while sending pub/sub event to app: {message}")]
    AppChannel { message: String },

    #[error("failed unmarshalling app response for bulk subscribe: {message}")]
    ResponseDeserialization { message: String },

    #[error("invalid application protocol: {protocol}")]
    InvalidProtocol { protocol: String },
}

impl EntryError {
    pub fn event_deserialization(entry_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EventDeserialization {
            entry_id: entry_id.into(),
            message: message.into(),
        }
    }

    pub fn route_match(entry_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RouteMatch {
            entry_id: entry_id.into(),
            message: message.into(),
        }
    }

    pub fn retry_required(entry_id: impl Into<String>) -> Self {
        Self::RetryRequired {
            entry_id: entry_id.into(),
        }
    }

    pub fn unknown_status(entry_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::UnknownStatus {
            entry_id: entry_id.into(),
            status: status.into(),
        }
    }

    pub fn response_not_received(entry_id: impl Into<String>) -> Self {
        Self::ResponseNotReceived {
            entry_id: entry_id.into(),
        }
    }

    pub fn retriable_status(topic: impl Into<String>, status_code: u16) -> Self {
        Self::RetriableStatus {
            topic: topic.into(),
            status_code,
        }
    }
}

/// Batch-level or group-level dispatch failure returned to the broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BulkDispatchError {
    #[error("error deserializing pubsub metadata: {message}")]
    MetadataDeserialization { message: String },

    #[error("error serializing bulk envelope for path {path}: {message}")]
    EnvelopeSerialization { path: String, message: String },

    #[error("error from app channel while sending pub/sub event to app: {message}")]
    AppChannel { message: String },

    #[error("failed unmarshalling app response for bulk subscribe: {message}")]
    ResponseDeserialization { message: String },

    #[error("Few message(s) have failed during bulk subscribe operation")]
    PartialFailure,

    #[error("retriable error returned from app while processing bulk pub/sub event, topic: {topic}. status code returned: {status_code}")]
    RetriableStatus { topic: String, status_code: u16 },

    #[error("invalid application protocol: {protocol}")]
    InvalidProtocol { protocol: String },

    #[error("bulk dispatch cancelled")]
    Cancelled,
}

impl BulkDispatchError {
    /// Cancellation bypasses dead-letter handling for the whole batch.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Permanent errors are never retried by the invocation policy.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Cancelled | Self::InvalidProtocol { .. })
    }
}

/// Failure reported by the application transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("app channel invocation failed: {message}")]
    Invocation { message: String },

    #[error("app channel invocation cancelled")]
    Cancelled,
}

impl ChannelError {
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation {
            message: message.into(),
        }
    }
}

/// Failure reported by the dead-letter publisher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("dead letter topic is not configured")]
    NotConfigured,

    #[error("error publishing to topic {topic}: {message}")]
    Publish { topic: String, message: String },
}

impl PublishError {
    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }
}

/// Failure evaluating a route rule set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteMatchError {
    #[error("invalid route condition {condition:?}: {reason}")]
    InvalidCondition { condition: String, reason: String },
}

/// Result type alias for dispatch operations
pub type DispatchResult<T> = Result<T, BulkDispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_error_display() {
        let err = EntryError::retry_required("abc");
        assert_eq!(
            err.to_string(),
            "RETRY required while processing bulk subscribe event for entry id: abc"
        );

        let err = EntryError::retriable_status("orders", 503);
        let display = err.to_string();
        assert!(display.contains("orders"));
        assert!(display.contains("503"));
    }

    #[test]
    fn test_dispatch_error_classification() {
        assert!(BulkDispatchError::Cancelled.is_cancelled());
        assert!(BulkDispatchError::Cancelled.is_permanent());
        assert!(BulkDispatchError::InvalidProtocol {
            protocol: "grpc".to_string()
        }
        .is_permanent());
        assert!(!BulkDispatchError::PartialFailure.is_permanent());
        assert!(!BulkDispatchError::RetriableStatus {
            topic: "t".to_string(),
            status_code: 500
        }
        .is_cancelled());
    }
}
