//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed entity payload: {0}")]
    MalformedEntity(#[source] serde_json::Error),

    #[error("Malformed server message: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}
