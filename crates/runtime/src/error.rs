use crate::model::ModelError;
use thiserror::Error;

/// Runtime error taxonomy.
///
/// Connection-time failures (`Launch`, `Handshake`, `CatalogUnavailable`)
/// abort startup. `UnknownTool` and `ToolExecution` are recovered within a
/// turn by surfacing the failure to the model as a tool result.
/// `TransportBroken` is fatal to the turn and tears the session down;
/// queries after teardown fail fast with `Disconnected`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to launch tool server: {0}")]
    Launch(String),

    #[error("tool server handshake failed: {0}")]
    Handshake(String),

    #[error("tool catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("transport broken: {0}")]
    TransportBroken(String),

    #[error("tool server disconnected; start a new session to reconnect")]
    Disconnected,

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, Error>;
