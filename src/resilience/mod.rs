//! # Resilience Module
//!
//! Retry with bounded exponential backoff for application invocations.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sidecar_core::resilience::RetryPolicy;
//! use sidecar_core::pubsub::errors::BulkDispatchError;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), BulkDispatchError> {
//! let policy = RetryPolicy::none()
//!     .with_max_retries(3)
//!     .with_initial_backoff(Duration::from_millis(50));
//!
//! let shutdown = CancellationToken::new();
//! policy
//!     .run("invoke_app", &shutdown, || async { Ok::<(), BulkDispatchError>(()) })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::{RetryPolicy, Retryable};
