//! Actor timer error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("can't create timer for actor {actor_key}: actor not activated")]
    ActorNotActivated { actor_key: String },

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidSchedule {
        field: String,
        value: String,
        reason: String,
    },

    #[error("timer {timer_key} has already expired (ttl {ttl:?})")]
    AlreadyExpired { timer_key: String, ttl: String },
}

impl TimerError {
    pub fn actor_not_activated(actor_key: impl Into<String>) -> Self {
        Self::ActorNotActivated {
            actor_key: actor_key.into(),
        }
    }

    pub fn invalid_schedule(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSchedule {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for timer operations
pub type TimerResult<T> = Result<T, TimerError>;
