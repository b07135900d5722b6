#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Sidecar Runtime Core
//!
//! Two engines of an application sidecar, independent of any particular
//! broker, transport or actor placement service.
//!
//! ## Bulk pub/sub dispatch
//!
//! Takes a batch delivered by a message broker, partitions it by
//! application route, posts one grouped envelope per route and reconciles
//! the application's per-entry answers into one verdict per message:
//! delivered, retry, dropped, or handed to a dead-letter topic.
//!
//! ## Actor timers
//!
//! Per-actor, per-timer tasks firing on a due time and period, racing
//! against deletion, expiration and actor deactivation with exactly-once
//! cancellation.
//!
//! ## Module Organization
//!
//! - [`pubsub`] - bulk dispatch orchestrator and its collaborators
//! - [`actors`] - timer registry, runner and schedule parsing
//! - [`resilience`] - retry with exponential backoff
//! - [`config`] - layered configuration loading
//! - [`metrics`] - OpenTelemetry instruments
//! - [`logging`] - structured logging setup
//! - [`error`] - crate-level error
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sidecar_core::pubsub::{
//!     AppChannel, BulkBatch, BulkEntry, BulkHandleResult, BulkSubscriber, ChannelError,
//!     DeadLetterPublisher, DeadLetterRequest, InvokeRequest, InvokeResponse, PublishError,
//!     TopicRoute,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct App;
//!
//! #[async_trait::async_trait]
//! impl AppChannel for App {
//!     async fn invoke_method(&self, _request: InvokeRequest) -> Result<InvokeResponse, ChannelError> {
//!         Ok(InvokeResponse::new(200, r#"{"statuses":[]}"#))
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct NoDeadLetter;
//!
//! #[async_trait::async_trait]
//! impl DeadLetterPublisher for NoDeadLetter {
//!     async fn publish(&self, _request: DeadLetterRequest) -> Result<(), PublishError> {
//!         Err(PublishError::NotConfigured)
//!     }
//! }
//!
//! # async fn example() {
//! let subscriber = BulkSubscriber::new(
//!     "orderpubsub",
//!     TopicRoute::single("orders"),
//!     Arc::new(App),
//!     Arc::new(NoDeadLetter),
//! );
//! let batch = BulkBatch::new("orders", vec![BulkEntry::new("1", r#"{"orderId":"1"}"#)]);
//! match subscriber.handle(batch).await {
//!     BulkHandleResult::Completed(outcomes) => println!("{} verdicts", outcomes.len()),
//!     BulkHandleResult::DeadLettered => println!("handed off"),
//!     BulkHandleResult::Failed { error, .. } => println!("batch failed: {error}"),
//! }
//! # }
//! ```

pub mod actors;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pubsub;
pub mod resilience;

pub use actors::{ActorTimers, CreateTimerRequest, DeleteTimerRequest, TimerError};
pub use config::{ConfigManager, SidecarConfig};
pub use error::{Result, SidecarError};
pub use pubsub::{BulkBatch, BulkEntry, BulkHandleResult, BulkOutcome, BulkSubscriber};
pub use resilience::RetryPolicy;
