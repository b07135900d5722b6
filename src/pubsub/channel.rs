//! Application transport used to deliver grouped envelopes.

use super::errors::ChannelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Debug};

/// Protocol the application listens on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppProtocol {
    #[default]
    Http,
    Grpc,
}

impl fmt::Display for AppProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppProtocol::Http => write!(f, "http"),
            AppProtocol::Grpc => write!(f, "grpc"),
        }
    }
}

/// POST of a serialized envelope to an application path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeRequest {
    /// Application route the envelope is posted to
    pub method: String,
    pub data: Vec<u8>,
    pub content_type: String,
    /// Sent as custom request metadata (HTTP headers)
    pub metadata: HashMap<String, String>,
}

/// Raw application response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
}

impl InvokeResponse {
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status_code)
    }
}

/// Invokes methods on the application
#[async_trait]
pub trait AppChannel: Send + Sync + Debug {
    async fn invoke_method(&self, request: InvokeRequest) -> Result<InvokeResponse, ChannelError>;
}
