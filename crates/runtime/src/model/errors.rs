use thiserror::Error;

/// Errors from model endpoint calls.
///
/// Retries and rate limiting are the caller's concern; the backend reports
/// each failure once.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The endpoint could not be reached.
    #[error("network: {0}")]
    Network(String),

    /// The endpoint returned an error status.
    #[error("model endpoint: {0}")]
    Api(String),

    /// The endpoint's response body could not be decoded.
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}
