//! In-memory transport driven by a script of server frames.
//!
//! Tests queue the frames the "server" will push, run the client, then
//! inspect what the client wrote. One-shot failures can be armed for each
//! direction.

use super::{Transport, TransportError};
use async_trait::async_trait;
use parley_chat_types::{ClientEvent, ServerEvent};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Scripted transport for tests and `--mock` demos.
///
/// Clones share one script, so a test can keep a handle while the client
/// owns another. Once the queue runs dry `recv()` reports a server hangup.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

#[derive(Debug, Default)]
struct Script {
    open: bool,
    address: Option<String>,
    connects: usize,
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<Vec<u8>>,
    failures: ArmedFailures,
}

/// One-shot failures, consumed by the next matching call.
#[derive(Debug, Default)]
struct ArmedFailures {
    connect: Option<String>,
    send: Option<String>,
    recv: Option<String>,
}

impl MockTransport {
    /// Create a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a raw frame for `recv()` to return.
    pub fn queue_response(&self, frame: Vec<u8>) {
        self.script().inbound.push_back(frame);
    }

    /// Append a server event, encoded as it would arrive on the wire.
    pub fn queue_event(&self, event: &ServerEvent) {
        match event.to_bytes() {
            Ok(frame) => self.queue_response(frame),
            Err(e) => tracing::error!("mock transport failed to encode {}: {}", event.name(), e),
        }
    }

    /// Frames not yet handed out by `recv()`.
    pub fn pending_responses(&self) -> usize {
        self.script().inbound.len()
    }

    /// Every frame the client sent, oldest first.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        self.script().outbound.clone()
    }

    /// Sent frames that decode as client events; anything else is skipped.
    pub fn sent_events(&self) -> Vec<ClientEvent> {
        self.script()
            .outbound
            .iter()
            .filter_map(|frame| ClientEvent::from_bytes(frame).ok())
            .collect()
    }

    /// Most recent frame the client sent.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        self.script().outbound.last().cloned()
    }

    /// Address passed to the last successful `connect()`.
    pub fn connected_address(&self) -> Option<String> {
        self.script().address.clone()
    }

    /// Number of successful `connect()` calls.
    pub fn connect_count(&self) -> usize {
        self.script().connects
    }

    /// Make the next `connect()` fail with `reason`.
    pub fn fail_next_connect(&self, reason: &str) {
        self.script().failures.connect = Some(reason.to_string());
    }

    /// Make the next `send()` fail with `reason`.
    pub fn fail_next_send(&self, reason: &str) {
        self.script().failures.send = Some(reason.to_string());
    }

    /// Make the next `recv()` fail with `reason`.
    pub fn fail_next_recv(&self, reason: &str) {
        self.script().failures.recv = Some(reason.to_string());
    }

    /// Drop the whole script and start over disconnected.
    pub fn reset(&self) {
        *self.script() = Script::default();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let mut script = self.script();
        if let Some(reason) = script.failures.connect.take() {
            return Err(TransportError::ConnectionFailed(reason));
        }
        script.open = true;
        script.address = Some(address.to_string());
        script.connects += 1;
        Ok(())
    }

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let mut script = self.script();
        if !script.open {
            return Err(TransportError::NotConnected);
        }
        if let Some(reason) = script.failures.send.take() {
            return Err(TransportError::SendFailed(reason));
        }
        script.outbound.push(frame.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut script = self.script();
        if !script.open {
            return Err(TransportError::NotConnected);
        }
        if let Some(reason) = script.failures.recv.take() {
            return Err(TransportError::ReceiveFailed(reason));
        }
        match script.inbound.pop_front() {
            Some(frame) => Ok(frame),
            None => {
                script.open = false;
                Err(TransportError::ConnectionClosed)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.script().open
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.script().open = false;
        Ok(())
    }
}
