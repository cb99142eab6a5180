//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file was present but unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Launch resolution or transport failure.
    #[error(transparent)]
    Transport(#[from] mcp::Error),

    /// An error from the orchestration layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An I/O error on the interactive loop itself.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
