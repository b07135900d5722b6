//! # Dead-Letter Forwarding
//!
//! Republishes entries that could not be delivered to the application to
//! the subscription's dead-letter topic. When no topic is configured the
//! forwarder reports failure and the caller falls back to broker retry.

use super::diagnostics::{BulkIngressDiagnostics, IngressStatus};
use super::errors::PublishError;
use super::message::BulkEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, error};

/// Bulk publish into a dead-letter topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterRequest {
    /// Pub/sub component the entries are published through
    pub pubsub_name: String,
    /// Dead-letter topic
    pub topic: String,
    /// Topic the entries were originally delivered on
    pub origin_topic: String,
    pub entries: Vec<BulkEntry>,
    pub metadata: HashMap<String, String>,
}

/// Publishes entries to a topic on behalf of the dispatcher
#[async_trait]
pub trait DeadLetterPublisher: Send + Sync + Debug {
    async fn publish(&self, request: DeadLetterRequest) -> Result<(), PublishError>;
}

/// Dead-letter operations used by the bulk dispatcher
#[derive(Debug, Clone)]
pub struct DeadLetterForwarder {
    publisher: Arc<dyn DeadLetterPublisher>,
    pubsub_name: String,
}

impl DeadLetterForwarder {
    pub fn new(publisher: Arc<dyn DeadLetterPublisher>, pubsub_name: impl Into<String>) -> Self {
        Self {
            publisher,
            pubsub_name: pubsub_name.into(),
        }
    }

    /// Forwards one dropped entry; failures are logged and otherwise ignored.
    pub async fn forward_dropped(
        &self,
        dead_letter_topic: Option<&str>,
        origin_topic: &str,
        entry: &BulkEntry,
    ) {
        let Some(topic) = dead_letter_topic else {
            return;
        };
        let request = DeadLetterRequest {
            pubsub_name: self.pubsub_name.clone(),
            topic: topic.to_string(),
            origin_topic: origin_topic.to_string(),
            entries: vec![entry.clone()],
            metadata: entry.metadata.clone(),
        };
        if let Err(e) = self.publisher.publish(request).await {
            error!(
                pubsub = %self.pubsub_name,
                origin_topic = %origin_topic,
                dead_letter_topic = %topic,
                entry_id = %entry.entry_id,
                error = %e,
                "Error sending dropped message to dead letter topic"
            );
        }
    }

    /// Publishes `entries` to the dead-letter topic, moving them from retry to
    /// drop in the diagnostics when retries were already reported.
    pub async fn forward_entries(
        &self,
        dead_letter_topic: &str,
        origin_topic: &str,
        entries: Vec<BulkEntry>,
        metadata: &HashMap<String, String>,
        diagnostics: &mut BulkIngressDiagnostics,
    ) -> Result<(), PublishError> {
        let count = entries.len() as i64;
        diagnostics.add(IngressStatus::Drop, count);
        if diagnostics.retry_reported() {
            diagnostics.add(IngressStatus::Retry, -count);
        }

        debug!(
            pubsub = %self.pubsub_name,
            origin_topic = %origin_topic,
            dead_letter_topic = %dead_letter_topic,
            entries = count,
            "Forwarding entries to dead letter topic"
        );

        let request = DeadLetterRequest {
            pubsub_name: self.pubsub_name.clone(),
            topic: dead_letter_topic.to_string(),
            origin_topic: origin_topic.to_string(),
            entries,
            metadata: metadata.clone(),
        };
        self.publisher.publish(request).await.inspect_err(|e| {
            error!(
                origin_topic = %origin_topic,
                dead_letter_topic = %dead_letter_topic,
                error = %e,
                "Error sending message to dead letter"
            );
        })
    }

    /// Escalates `entries` to the dead-letter topic when one is configured.
    ///
    /// On failure (including no topic) the `batch_size` entries are counted
    /// as retry unless retries were already reported for them.
    pub async fn forward_if_configured(
        &self,
        dead_letter_topic: Option<&str>,
        origin_topic: &str,
        entries: Vec<BulkEntry>,
        metadata: &HashMap<String, String>,
        batch_size: usize,
        diagnostics: &mut BulkIngressDiagnostics,
    ) -> Result<(), PublishError> {
        let result = match dead_letter_topic {
            Some(topic) => {
                self.forward_entries(topic, origin_topic, entries, metadata, diagnostics)
                    .await
            }
            None => Err(PublishError::NotConfigured),
        };
        if result.is_err() && !diagnostics.retry_reported() {
            diagnostics.add(IngressStatus::Retry, batch_size as i64);
        }
        result
    }
}
