use std::time::Duration;

use thiserror::Error;

use crate::ConnectionId;
use crate::node_id::ParseNodeIdError;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Metadata request failed: {0}")]
    Provider(String),

    #[error("Metadata request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error(transparent)]
    InvalidNodeId(#[from] ParseNodeIdError),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TreeError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }
}
