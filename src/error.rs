//! Crate-level error aggregating the domain errors.

use crate::actors::TimerError;
use crate::config::ConfigurationError;
use crate::pubsub::errors::{BulkDispatchError, PublishError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("Bulk dispatch error: {0}")]
    BulkDispatch(#[from] BulkDispatchError),

    #[error("Dead letter publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, SidecarError>;
