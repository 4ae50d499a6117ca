//! Frame transports for the chat client.
//!
//! A transport moves opaque, already-encoded event frames between the client
//! and the server. It knows nothing about events: [`SyncClient`] encodes and
//! decodes, the transport only delivers whole frames in order.
//!
//! Two implementations ship with the crate:
//! - [`TcpTransport`] speaks length-prefixed frames over a TCP stream
//! - [`MockTransport`] replays queued frames and records sent ones, for tests
//!
//! [`SyncClient`]: crate::SyncClient

mod mock;
mod tcp;

pub use mock::MockTransport;
pub use tcp::{TcpTransport, TcpTransportConfig, MAX_FRAME_SIZE};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the server.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No connection has been opened, or it was closed locally.
    #[error("not connected")]
    NotConnected,

    /// The server hung up.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// A frame exceeded the size limit.
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Connecting took longer than allowed.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Whether the connection is gone, either hung up by the server or
    /// closed locally.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::NotConnected)
    }
}

/// Carries encoded event frames to and from the server.
///
/// `send` and `recv` may run concurrently: a task parked in `recv` must not
/// hold up an outgoing message.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `address`, replacing any existing one.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Deliver one frame.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next frame.
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the server hangs up.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Whether a connection is currently open.
    fn is_connected(&self) -> bool;

    /// Close the connection. Closing twice is harmless.
    async fn close(&self) -> Result<(), TransportError>;
}
