//! Transport error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported server target '{0}': expected a .py or .js entry point")]
    UnsupportedTarget(String),

    #[error("failed to spawn tool server: {0}")]
    Spawn(std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("connection not initialized")]
    NotInitialized,

    #[error("connection is closed")]
    Closed,

    #[error("tool server closed the channel: {0}")]
    PeerClosed(String),

    #[error("tool server did not respond within {0:?}")]
    PeerUnresponsive(std::time::Duration),

    #[error("failed to encode request: {0}")]
    Encode(serde_json::Error),

    #[error("invalid response from tool server: {0}")]
    InvalidResponse(String),

    #[error("tool server reported an error: {0}")]
    Rpc(JsonRpcError),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("response frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
