//! Error types for the Parley wire protocol.

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// Frame is not a well-formed event
    #[error("malformed frame: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Zero-length frame
    #[error("empty frame")]
    EmptyFrame,
}
