//! Wall clock used by the timer engine.
//!
//! Timer deadlines are wall-clock instants, while waiting is done on the
//! tokio timer so that paused test time drives both consistently.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::{Instant, Sleep};

/// Source of the current time for timer scheduling
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;

    /// Sleep until `deadline`; resolves immediately for past deadlines.
    fn sleep_until(&self, deadline: DateTime<Utc>) -> Sleep {
        let remaining = (deadline - self.now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(remaining)
    }
}

/// Wall clock anchored to the tokio clock at construction.
///
/// `now()` advances with `tokio::time`, so it follows paused and
/// auto-advanced time in tests.
#[derive(Debug, Clone)]
pub struct SystemClock {
    wall_anchor: DateTime<Utc>,
    instant_anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            wall_anchor: Utc::now(),
            instant_anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.instant_anchor.elapsed();
        chrono::Duration::from_std(elapsed)
            .map(|elapsed| self.wall_anchor + elapsed)
            .unwrap_or(self.wall_anchor)
    }
}
