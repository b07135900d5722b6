//! # Envelope Builder & Invoker
//!
//! Serializes one route group into a bulk envelope and posts it to the
//! application under the configured retry policy. Every attempt is
//! reconciled into the same group outcome slots.

use super::channel::{AppChannel, AppProtocol, InvokeRequest};
use super::dead_letter::DeadLetterForwarder;
use super::diagnostics::{BulkIngressDiagnostics, IngressStatus};
use super::errors::{BulkDispatchError, ChannelError, DispatchResult, EntryError};
use super::grouping::RouteGroup;
use super::message::{
    BulkBatch, BulkOutcome, BulkSubscribeEnvelope, BULK_EVENT_TYPE, CLOUD_EVENT_CONTENT_TYPE,
};
use super::reconciler::{reconcile, GroupOutcomes};
use crate::resilience::RetryPolicy;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument};
use uuid::Uuid;

/// Verdicts for one route group, ready to be merged into the batch
#[derive(Debug, Clone)]
pub struct GroupResult {
    pub path: String,
    /// Batch index of each outcome
    pub indices: Vec<usize>,
    pub outcomes: Vec<BulkOutcome>,
    pub diagnostics: BulkIngressDiagnostics,
    /// Last error of the group, if the group did not fully succeed
    pub error: Option<BulkDispatchError>,
}

/// Builds the envelope posted to the application for `group`.
pub fn build_envelope(pubsub_name: &str, batch: &BulkBatch, group: &RouteGroup) -> BulkSubscribeEnvelope {
    BulkSubscribeEnvelope {
        id: Uuid::new_v4().to_string(),
        entries: group.entries.iter().map(|entry| entry.item.clone()).collect(),
        metadata: batch.metadata.clone(),
        topic: batch.topic.clone(),
        pubsub: pubsub_name.to_string(),
        event_type: BULK_EVENT_TYPE.to_string(),
    }
}

/// Invokes the application once per route group
#[derive(Debug, Clone, Copy)]
pub struct GroupInvoker<'a> {
    pub channel: &'a dyn AppChannel,
    pub forwarder: &'a DeadLetterForwarder,
    pub retry_policy: &'a RetryPolicy,
    pub protocol: AppProtocol,
    pub pubsub_name: &'a str,
    pub dead_letter_topic: Option<&'a str>,
    /// Stops retries of every group once the caller gives up on the batch
    pub cancel: &'a CancellationToken,
}

impl GroupInvoker<'_> {
    #[instrument(skip_all, fields(topic = %batch.topic, path = %group.path, entries = group.len()))]
    pub async fn invoke(&self, batch: &BulkBatch, group: &RouteGroup) -> GroupResult {
        let mut outcomes = GroupOutcomes::new(group);
        let mut diagnostics = BulkIngressDiagnostics::new();
        let group_size = group.len() as i64;

        if self.protocol != AppProtocol::Http {
            error!(protocol = %self.protocol, "Unsupported application protocol for bulk subscribe");
            diagnostics.add(IngressStatus::Retry, group_size);
            outcomes.fill_unpopulated(Some(EntryError::InvalidProtocol {
                protocol: self.protocol.to_string(),
            }));
            let error = BulkDispatchError::InvalidProtocol {
                protocol: self.protocol.to_string(),
            };
            return self.finish(group, outcomes, diagnostics, Some(error));
        }

        let envelope = build_envelope(self.pubsub_name, batch, group);
        let data = match serde_json::to_vec(&envelope) {
            Ok(data) => data,
            Err(e) => {
                let error = self
                    .escalate_serialization_failure(batch, group, &mut outcomes, &mut diagnostics, e.to_string())
                    .await;
                return self.finish(group, outcomes, diagnostics, error);
            }
        };

        let request = InvokeRequest {
            method: group.path.clone(),
            data,
            content_type: CLOUD_EVENT_CONTENT_TYPE.to_string(),
            metadata: batch.metadata.clone(),
        };

        let state = Mutex::new((outcomes, diagnostics));
        let result = self
            .retry_policy
            .run("bulk_subscribe_invoke", self.cancel, || self.attempt(&batch.topic, request.clone(), &state))
            .await;

        let (mut outcomes, mut diagnostics) = state.into_inner();
        // Cancelled before the first attempt reached the application
        if result.as_ref().is_err_and(BulkDispatchError::is_cancelled)
            && outcomes.outcomes().iter().any(|o| !o.is_populated())
        {
            diagnostics.add(IngressStatus::Retry, group_size);
            outcomes.fill_unpopulated(Some(EntryError::AppChannel {
                message: ChannelError::Cancelled.to_string(),
            }));
        }
        self.finish(group, outcomes, diagnostics, result.err())
    }

    async fn attempt(
        &self,
        topic: &str,
        request: InvokeRequest,
        state: &Mutex<(GroupOutcomes, BulkIngressDiagnostics)>,
    ) -> DispatchResult<()> {
        let started = Instant::now();
        let response = self.channel.invoke_method(request).await;
        let elapsed = started.elapsed();

        let mut guard = state.lock();
        let (outcomes, diagnostics) = &mut *guard;
        reconcile(response, topic, elapsed, outcomes, diagnostics)
    }

    /// Hands the group to the dead-letter topic when the envelope cannot be
    /// serialized; without a working dead-letter topic the group is retried.
    async fn escalate_serialization_failure(
        &self,
        batch: &BulkBatch,
        group: &RouteGroup,
        outcomes: &mut GroupOutcomes,
        diagnostics: &mut BulkIngressDiagnostics,
        message: String,
    ) -> Option<BulkDispatchError> {
        error!(
            topic = %batch.topic,
            path = %group.path,
            error = %message,
            "Error serializing bulk subscribe envelope"
        );

        let entries = group
            .indices()
            .filter_map(|index| batch.entries.get(index).cloned())
            .collect();
        let forwarded = self
            .forwarder
            .forward_if_configured(
                self.dead_letter_topic,
                &batch.topic,
                entries,
                &batch.metadata,
                group.len(),
                diagnostics,
            )
            .await;

        if forwarded.is_ok() {
            outcomes.fill_unpopulated(None);
            return None;
        }
        outcomes.fill_unpopulated(Some(EntryError::EnvelopeSerialization {
            message: message.clone(),
        }));
        Some(BulkDispatchError::EnvelopeSerialization {
            path: group.path.clone(),
            message,
        })
    }

    fn finish(
        &self,
        group: &RouteGroup,
        outcomes: GroupOutcomes,
        diagnostics: BulkIngressDiagnostics,
        error: Option<BulkDispatchError>,
    ) -> GroupResult {
        GroupResult {
            path: group.path.clone(),
            indices: group.indices().collect(),
            outcomes: outcomes.into_outcomes(),
            diagnostics,
            error,
        }
    }
}
