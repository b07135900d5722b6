//! # Actor Timers
//!
//! In-memory timers bound to activated actor instances. A timer fires on a
//! due time, optionally repeats on a period (bounded by a repetition count
//! or unbounded) and may carry a time-to-live after which it is removed.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sidecar_core::actors::{
//!     ActorTimers, CreateTimerRequest, InMemoryActorTable, SystemClock, TimerExecutor,
//!     TimerRecord,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct LogTicks;
//!
//! #[async_trait::async_trait]
//! impl TimerExecutor for LogTicks {
//!     async fn execute_timer(&self, timer: &TimerRecord) -> anyhow::Result<()> {
//!         println!("tick for {}", timer.key);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let table = Arc::new(InMemoryActorTable::new());
//! table.activate("cart", "42");
//!
//! let timers = ActorTimers::new(Arc::new(SystemClock::new()), table, Arc::new(LogTicks));
//! timers
//!     .create_timer(
//!         CreateTimerRequest::new("cart", "42", "flush")
//!             .with_period("R5/PT1S")
//!             .with_callback("flush"),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod errors;
pub mod registry;
pub mod schedule;
pub mod table;
pub mod timer;
pub mod timers;

pub use clock::{Clock, SystemClock};
pub use errors::{TimerError, TimerResult};
pub use registry::{ActiveTimerCounts, TimerHandle, TimerRegistry};
pub use schedule::Period;
pub use table::{ActorActivationTable, InMemoryActorTable};
pub use timer::{CreateTimerRequest, DeleteTimerRequest, TimerKey, TimerRecord};
pub use timers::{ActorTimers, TimerExecutor};
