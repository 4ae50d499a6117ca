//! TcpTransport - plain TCP transport with length-prefixed frames.
//!
//! Each frame is a 4-byte big-endian length followed by the encoded event.
//! The read and write halves are locked independently so a task parked in
//! `recv()` never blocks an outgoing message. `close()` wakes a parked
//! `recv()` instead of waiting for its lock.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};

/// Maximum frame size (1MB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Configuration for TcpTransport.
#[derive(Clone, Debug)]
pub struct TcpTransportConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// TcpTransport implements the Transport trait over a single TCP stream.
///
/// # Example
///
/// ```ignore
/// let transport = TcpTransport::new();
/// transport.connect("127.0.0.1:3001").await?;
/// transport.send(&frame).await?;
/// let reply = transport.recv().await?;
/// ```
#[derive(Debug, Default)]
pub struct TcpTransport {
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: AtomicBool,
    shutdown: Notify,
    config: TcpTransportConfig,
}

impl TcpTransport {
    /// Create a new TcpTransport with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new TcpTransport with custom configuration.
    pub fn with_config(config: TcpTransportConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        // Close existing connection if any
        self.close().await.ok();

        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| TransportError::Timeout(self.config.connect_timeout))?
            .map_err(|e| TransportError::ConnectionFailed(format!("{address}: {e}")))?;
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        let mut reader = self.reader.lock().await;
        *self.writer.lock().await = Some(write_half);
        *reader = Some(read_half);
        self.connected.store(true, Ordering::SeqCst);
        drop(reader);

        tracing::debug!("connected to {}", address);
        Ok(())
    }

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if frame.len() > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge {
                size: frame.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;

        // Length-prefixed framing (4 bytes, big-endian)
        let len = (frame.len() as u32).to_be_bytes();
        writer
            .write_all(&len)
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to write length: {e}")))?;
        writer
            .write_all(frame)
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to write data: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to flush: {e}")))?;

        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        // Registered before taking the lock so a concurrent close() is never missed
        let shutdown = self.shutdown.notified();
        let mut guard = self.reader.lock().await;
        if !self.is_connected() {
            guard.take();
            return Err(TransportError::NotConnected);
        }
        let reader = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let outcome = tokio::select! {
            frame = read_frame(reader) => Some(frame),
            _ = shutdown => None,
        };

        match outcome {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(e)) => {
                // The stream position is unknown after a failed read
                self.connected.store(false, Ordering::SeqCst);
                self.writer.lock().await.take();
                guard.take();
                tracing::debug!("dropping connection after read error: {}", e);
                Err(e)
            }
            None => {
                guard.take();
                Err(TransportError::NotConnected)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await.ok();
        }
        // A parked recv() drops the read half itself once woken
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
        Ok(())
    }
}

/// Read one length-prefixed frame.
async fn read_frame(reader: &mut OwnedReadHalf) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| read_error(e, "length"))?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut data = vec![0u8; len];
    reader
        .read_exact(&mut data)
        .await
        .map_err(|e| read_error(e, "data"))?;
    Ok(data)
}

fn read_error(e: std::io::Error, part: &str) -> TransportError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::ConnectionClosed
    } else {
        TransportError::ReceiveFailed(format!("Failed to read {part}: {e}"))
    }
}
