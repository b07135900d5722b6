//! # Pub/Sub Bulk Dispatch
//!
//! Delivers broker batches to the application grouped by route and turns
//! the application's partial answers into one verdict per entry.
//!
//! ## Flow
//!
//! 1. [`BulkSubscriber::handle`] stamps the component name into the batch
//!    metadata and decides raw vs. structured mode once for the batch.
//! 2. [`grouping::group_entries`] validates, decodes and partitions entries
//!    by application path.
//! 3. [`invoker::GroupInvoker`] posts one envelope per path, concurrently,
//!    under the configured [`RetryPolicy`](crate::resilience::RetryPolicy).
//! 4. [`reconciler::reconcile`] maps per-entry statuses back to batch slots.
//! 5. Entries still in error are forwarded to the dead-letter topic when one
//!    is configured, otherwise returned to the broker for retry.
//!
//! The application transport, dead-letter publisher, route matcher and
//! metrics sink are collaborator traits so the host decides how they work.

pub mod bulk_subscriber;
pub mod channel;
pub mod dead_letter;
pub mod diagnostics;
pub mod errors;
pub mod grouping;
pub mod invoker;
pub mod message;
pub mod reconciler;
pub mod routing;

pub use bulk_subscriber::BulkSubscriber;
pub use channel::{AppChannel, AppProtocol, InvokeRequest, InvokeResponse};
pub use dead_letter::{DeadLetterForwarder, DeadLetterPublisher, DeadLetterRequest};
pub use diagnostics::{BulkIngressDiagnostics, IngressMetrics, IngressStatus, OtelIngressMetrics};
pub use errors::{
    BulkDispatchError, ChannelError, DispatchResult, EntryError, PublishError, RouteMatchError,
};
pub use message::{
    AppBulkResponse, AppBulkResponseEntry, AppResponseStatus, BulkBatch, BulkEntry,
    BulkHandleResult, BulkOutcome,
};
pub use routing::{MatchInput, RouteMatcher, RouteRule, RuleRouteMatcher, TopicRoute};
