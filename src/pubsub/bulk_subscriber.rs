//! # Bulk Dispatch Orchestrator
//!
//! Entry point for a batch delivered by the broker. Drives validation and
//! grouping, invokes the application once per route group, then decides
//! whether entries in error are handed to the dead-letter topic or returned
//! to the broker for retry.
//!
//! ## Result contract
//!
//! - [`BulkHandleResult::Completed`]: every entry has a verdict; entries in
//!   error are retried by the broker.
//! - [`BulkHandleResult::DeadLettered`]: entries in error were forwarded to
//!   the dead-letter topic; nothing is retried.
//! - [`BulkHandleResult::Failed`]: a batch-level failure, returned with the
//!   per-entry verdicts.

use super::channel::{AppChannel, AppProtocol};
use super::dead_letter::{DeadLetterForwarder, DeadLetterPublisher};
use super::diagnostics::{BulkIngressDiagnostics, IngressMetrics, OtelIngressMetrics};
use super::errors::{BulkDispatchError, EntryError};
use super::grouping::{group_entries, GroupedBatch};
use super::invoker::GroupInvoker;
use super::message::{BulkBatch, BulkEntry, BulkHandleResult, BulkOutcome, PUBSUB_NAME_KEY};
use super::routing::{RouteMatcher, RuleRouteMatcher, TopicRoute};
use crate::config::PubSubConfig;
use crate::logging::log_bulk_operation;
use crate::resilience::RetryPolicy;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument};

/// Bulk subscription handler for one topic of one pub/sub component
#[derive(Debug, Clone)]
pub struct BulkSubscriber {
    pubsub_name: String,
    route: TopicRoute,
    protocol: AppProtocol,
    retry_policy: RetryPolicy,
    matcher: Arc<dyn RouteMatcher>,
    channel: Arc<dyn AppChannel>,
    forwarder: DeadLetterForwarder,
    metrics: Arc<dyn IngressMetrics>,
}

impl BulkSubscriber {
    pub fn new(
        pubsub_name: impl Into<String>,
        route: TopicRoute,
        channel: Arc<dyn AppChannel>,
        publisher: Arc<dyn DeadLetterPublisher>,
    ) -> Self {
        let pubsub_name = pubsub_name.into();
        Self {
            forwarder: DeadLetterForwarder::new(publisher, pubsub_name.clone()),
            pubsub_name,
            route,
            protocol: AppProtocol::default(),
            retry_policy: RetryPolicy::none(),
            matcher: Arc::new(RuleRouteMatcher),
            channel,
            metrics: Arc::new(OtelIngressMetrics),
        }
    }

    /// Applies protocol and retry settings from configuration
    pub fn with_settings(mut self, settings: &PubSubConfig) -> Self {
        self.protocol = settings.app_protocol;
        self.retry_policy = RetryPolicy::from_config(settings);
        self
    }

    pub fn with_protocol(mut self, protocol: AppProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn RouteMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn IngressMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn pubsub_name(&self) -> &str {
        &self.pubsub_name
    }

    pub fn route(&self) -> &TopicRoute {
        &self.route
    }

    /// Handles one broker batch. Never panics on entry-level problems; every
    /// entry of the batch gets exactly one verdict.
    pub async fn handle(&self, batch: BulkBatch) -> BulkHandleResult {
        self.handle_with_cancellation(batch, &CancellationToken::new())
            .await
    }

    /// Like [`handle`](Self::handle), but stops retrying application calls
    /// once `cancel` fires. A cancelled batch fails with
    /// [`BulkDispatchError::Cancelled`] and is never dead-lettered.
    #[instrument(skip_all, fields(pubsub = %self.pubsub_name, topic = %batch.topic, entries = batch.len()))]
    pub async fn handle_with_cancellation(
        &self,
        mut batch: BulkBatch,
        cancel: &CancellationToken,
    ) -> BulkHandleResult {
        batch
            .metadata
            .insert(PUBSUB_NAME_KEY.to_string(), self.pubsub_name.clone());
        let mut diagnostics = BulkIngressDiagnostics::new();

        let raw_payload = match self.route.is_raw_payload() {
            Ok(raw) => raw,
            Err(error) => {
                let result = self.handle_batch_failure(&batch, error, &mut diagnostics).await;
                self.report(diagnostics, &batch);
                return result;
            }
        };

        let GroupedBatch {
            groups,
            mut outcomes,
            dropped,
            diagnostics: grouping_diagnostics,
            ..
        } = group_entries(
            &batch,
            &self.route,
            raw_payload,
            self.matcher.as_ref(),
            Utc::now(),
        );
        diagnostics.merge(&grouping_diagnostics);

        for index in dropped {
            if let Some(entry) = batch.entries.get(index) {
                self.forwarder
                    .forward_dropped(self.route.dead_letter_topic(), &batch.topic, entry)
                    .await;
            }
        }

        let invoker = GroupInvoker {
            channel: self.channel.as_ref(),
            forwarder: &self.forwarder,
            retry_policy: &self.retry_policy,
            protocol: self.protocol,
            pubsub_name: &self.pubsub_name,
            dead_letter_topic: self.route.dead_letter_topic(),
            cancel,
        };
        let results = join_all(groups.iter().map(|group| invoker.invoke(&batch, group))).await;

        let mut last_error = None;
        let mut cancelled = false;
        for result in results {
            diagnostics.merge(&result.diagnostics);
            for (index, outcome) in result.indices.into_iter().zip(result.outcomes) {
                outcomes[index] = outcome;
            }
            if let Some(error) = result.error {
                cancelled |= error.is_cancelled();
                last_error = Some(error);
            }
        }

        // Cancellation from any group skips dead-letter handling entirely
        if cancelled {
            log_bulk_operation("handle", &self.pubsub_name, &batch.topic, batch.len(), "cancelled", None);
            self.report(diagnostics, &batch);
            return BulkHandleResult::Failed {
                outcomes,
                error: BulkDispatchError::Cancelled,
            };
        }

        if outcomes.iter().any(BulkOutcome::is_error) {
            diagnostics.mark_retry_reported();
            let failed: Vec<BulkEntry> = outcomes
                .iter()
                .zip(&batch.entries)
                .filter(|(outcome, _)| outcome.is_error())
                .map(|(_, entry)| entry.clone())
                .collect();
            let failed_count = failed.len();
            let forwarded = self
                .forwarder
                .forward_if_configured(
                    self.route.dead_letter_topic(),
                    &batch.topic,
                    failed,
                    &batch.metadata,
                    failed_count,
                    &mut diagnostics,
                )
                .await;
            if forwarded.is_ok() {
                log_bulk_operation(
                    "handle",
                    &self.pubsub_name,
                    &batch.topic,
                    failed_count,
                    "dead_lettered",
                    None,
                );
                self.report(diagnostics, &batch);
                return BulkHandleResult::DeadLettered;
            }
        }

        self.report(diagnostics, &batch);
        match last_error {
            Some(error) => {
                let details = error.to_string();
                log_bulk_operation("handle", &self.pubsub_name, &batch.topic, batch.len(), "failed", Some(&details));
                BulkHandleResult::Failed { outcomes, error }
            }
            None => {
                log_bulk_operation("handle", &self.pubsub_name, &batch.topic, batch.len(), "completed", None);
                BulkHandleResult::Completed(outcomes)
            }
        }
    }

    /// The batch mode could not be determined: dead-letter the whole batch or
    /// hand the error back with every entry marked.
    async fn handle_batch_failure(
        &self,
        batch: &BulkBatch,
        error: BulkDispatchError,
        diagnostics: &mut BulkIngressDiagnostics,
    ) -> BulkHandleResult {
        error!(
            pubsub = %self.pubsub_name,
            topic = %batch.topic,
            error = %error,
            "Error determining bulk subscribe payload mode"
        );

        let forwarded = self
            .forwarder
            .forward_if_configured(
                self.route.dead_letter_topic(),
                &batch.topic,
                batch.entries.clone(),
                &batch.metadata,
                batch.len(),
                diagnostics,
            )
            .await;
        if forwarded.is_ok() {
            return BulkHandleResult::DeadLettered;
        }

        let entry_error = EntryError::MetadataDeserialization {
            message: error.to_string(),
        };
        let outcomes = batch
            .entries
            .iter()
            .map(|entry| BulkOutcome::failed(entry.entry_id.clone(), entry_error.clone()))
            .collect();
        BulkHandleResult::Failed { outcomes, error }
    }

    fn report(&self, diagnostics: BulkIngressDiagnostics, batch: &BulkBatch) {
        diagnostics.report(self.metrics.as_ref(), &self.pubsub_name, &batch.topic);
    }
}
