//! SyncClient - the main interface for Parley.
//!
//! This module provides [`SyncClient`], the primary API for applications to
//! register, keep a live roster and exchange direct messages.
//!
//! # Architecture
//!
//! SyncClient uses a pure state machine (from chat-core) for the session
//! lifecycle and interprets the actions to perform actual I/O via the
//! Transport and SessionStore traits. Every inbound frame is applied to the
//! roster while holding a single lock, so events land atomically and in
//! delivery order.
//!
//! ```text
//! Application → SyncClient → Transport → Server
//!                   ↓
//!              chat-core (state machine + roster)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use parley_chat_client::{ClientConfig, MemorySessionStore, MockTransport, SyncClient};
//!
//! let client = SyncClient::new(
//!     ClientConfig::new("127.0.0.1:3001"),
//!     MockTransport::new(),
//!     MemorySessionStore::new(),
//! );
//!
//! client.register_display_name("alice").await?;
//! client.send_message(&"u2".into(), "hi").await?;
//! client.run().await?;
//! ```

use std::fmt::Write as _;

use chrono::Local;
use parley_chat_core::{
    Action, ChatEvent, ConnectionState, Event, Peer, RosterError, RosterSnapshot, RosterStore,
};
use parley_chat_types::{
    ClientEvent, Credentials, OutboundMessage, PeerId, ProtocolError, ServerEvent, Session,
    SessionToken,
};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::session::{SessionStore, SessionStoreError};
use crate::transport::{Transport, TransportError};

/// Default server address (the reference server's local port).
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:3001";

/// Default format for locally stamped message times.
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M";

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Caller supplied an empty display name or message.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation referenced a peer not in the roster.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// Server refused the display name.
    #[error("registration rejected: {0}")]
    RegistrationRejected(String),

    /// Server refused the session token; the stored token was cleared.
    #[error("session invalid: {0}")]
    SessionInvalid(String),

    /// Server sent something that makes no sense in the current state.
    #[error("transport anomaly: {0}")]
    TransportAnomaly(String),

    /// No established session.
    #[error("not connected")]
    NotConnected,

    /// No session token has ever been issued to this client.
    #[error("no session to resume")]
    NotAuthenticated,

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session storage error.
    #[error("session store error: {0}")]
    SessionStore(#[from] SessionStoreError),

    /// Frame encoding or decoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    /// Whether this error concerns a single inbound frame and can be skipped.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Self::TransportAnomaly(_) | Self::Protocol(_))
    }
}

impl From<RosterError> for ClientError {
    fn from(e: RosterError) -> Self {
        match e {
            RosterError::UnknownPeer(id) => Self::UnknownPeer(id),
            RosterError::EmptyContent => Self::InvalidInput(e.to_string()),
        }
    }
}

/// Configuration for SyncClient.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address of the chat server.
    pub server_address: String,
    /// chrono format string for locally stamped message times.
    pub time_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_ADDRESS)
    }
}

impl ClientConfig {
    /// Create a configuration for the given server address.
    pub fn new(server_address: &str) -> Self {
        Self {
            server_address: server_address.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    /// Set the time format.
    pub fn with_time_format(mut self, format: &str) -> Self {
        self.time_format = format.to_string();
        self
    }
}

/// Everything guarded by the client's single lock.
#[derive(Debug, Default)]
struct ClientState {
    connection: ConnectionState,
    roster: RosterStore,
    /// Most recently issued session, kept across disconnects for `reconnect`.
    session: Option<Session>,
}

impl ClientState {
    fn transition(&mut self, event: Event) -> Vec<Action> {
        let (next, actions) = std::mem::take(&mut self.connection).on_event(event);
        self.connection = next;
        actions
    }
}

/// The main chat client.
///
/// Owns the transport, the session store and the roster. Pass it around by
/// reference (or in an `Arc`); there is no global instance.
pub struct SyncClient<T: Transport, S: SessionStore> {
    config: ClientConfig,
    transport: T,
    sessions: S,
    state: Mutex<ClientState>,
}

impl<T: Transport, S: SessionStore> SyncClient<T, S> {
    /// Create a new SyncClient.
    pub fn new(config: ClientConfig, transport: T, sessions: S) -> Self {
        Self {
            config,
            transport,
            sessions,
            state: Mutex::new(ClientState::default()),
        }
    }

    // ===========================================
    // Session lifecycle
    // ===========================================

    /// Register under a display name and wait for the session and snapshot.
    pub async fn register_display_name(&self, name: &str) -> Result<Session, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::InvalidInput(
                "display name must not be empty".into(),
            ));
        }
        self.establish(Credentials::display_name(name)).await
    }

    /// Resume a session with a previously issued token.
    ///
    /// If the server refuses the token, the stored token is cleared and
    /// [`ClientError::SessionInvalid`] is returned. There is no retry.
    pub async fn resume_session(&self, token: SessionToken) -> Result<Session, ClientError> {
        self.establish(Credentials::session_token(token)).await
    }

    /// Resume from the stored token, if there is one.
    ///
    /// Returns `Ok(false)` when nothing is stored.
    pub async fn resume_persisted(&self) -> Result<bool, ClientError> {
        let Some(token) = self.sessions.load().await? else {
            tracing::debug!("no stored session to resume");
            return Ok(false);
        };
        tracing::info!(token = %token.fingerprint(), "resuming stored session");
        self.resume_session(token).await?;
        Ok(true)
    }

    /// Re-enter Connecting with the most recently issued token.
    pub async fn reconnect(&self) -> Result<Session, ClientError> {
        let token = self
            .state
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| s.session_token.clone())
            .ok_or(ClientError::NotAuthenticated)?;
        self.resume_session(token).await
    }

    /// Close the transport. Roster and session are kept.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let actions = self.state.lock().await.transition(Event::DisconnectRequested);
        self.execute(actions).await?;
        Ok(())
    }

    async fn establish(&self, credentials: Credentials) -> Result<Session, ClientError> {
        tracing::info!(
            resume = credentials.is_resume(),
            server = %self.config.server_address,
            "connecting"
        );
        let actions = self
            .state
            .lock()
            .await
            .transition(Event::ConnectRequested { credentials });
        if let Err(e) = self.execute(actions).await {
            self.lose_transport(e.to_string()).await;
            return Err(e);
        }

        loop {
            let frame = match self.transport.recv().await {
                Ok(frame) => frame,
                Err(e) => {
                    self.lose_transport(e.to_string()).await;
                    return Err(e.into());
                }
            };

            match self.handle_frame(&frame).await {
                Ok(Some(ChatEvent::Connected { .. })) => {
                    return self.session().await.ok_or(ClientError::NotAuthenticated);
                }
                Ok(Some(ChatEvent::RegistrationRejected { reason })) => {
                    return Err(ClientError::RegistrationRejected(reason));
                }
                Ok(Some(ChatEvent::SessionInvalid { reason })) => {
                    return Err(ClientError::SessionInvalid(reason));
                }
                Ok(Some(ChatEvent::Disconnected { .. })) => return Err(ClientError::NotConnected),
                Ok(None) => {}
                Err(e) if e.is_anomaly() => {
                    tracing::warn!("skipping frame during handshake: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn lose_transport(&self, reason: String) {
        let actions = self
            .state
            .lock()
            .await
            .transition(Event::TransportLost { reason });
        if let Err(e) = self.execute(actions).await {
            tracing::warn!("failed to settle lost transport: {}", e);
        }
    }

    // ===========================================
    // Messaging
    // ===========================================

    /// Send a direct message to `peer`.
    ///
    /// The message is appended locally before it goes out. If the transport
    /// then fails the error is returned and the local entry stays.
    pub async fn send_message(&self, peer: &PeerId, content: &str) -> Result<(), ClientError> {
        if content.trim().is_empty() {
            return Err(ClientError::InvalidInput(
                "message content must not be empty".into(),
            ));
        }

        let frame = {
            let mut state = self.state.lock().await;
            let from = state
                .connection
                .local_id()
                .cloned()
                .ok_or(ClientError::NotConnected)?;
            let time = self.display_time();
            let frame = ClientEvent::PrivateMessage(OutboundMessage {
                content: content.to_string(),
                to: peer.clone(),
                from,
                time: time.clone(),
            })
            .to_bytes()?;
            state
                .roster
                .record_outbound(peer, content.to_string(), time)?;
            frame
        };

        self.transport.send(&frame).await?;
        Ok(())
    }

    /// Make `peer` the active conversation and clear its unseen flag.
    pub async fn select_peer(&self, peer: &PeerId) -> Result<Peer, ClientError> {
        let mut state = self.state.lock().await;
        Ok(state.roster.select_peer(peer)?.clone())
    }

    /// Register the roster listener, replacing any previous one.
    ///
    /// The listener runs while the client lock is held and must not call
    /// back into the client.
    pub async fn subscribe<F>(&self, listener: F) -> bool
    where
        F: FnMut(&RosterSnapshot) + Send + 'static,
    {
        self.state.lock().await.roster.subscribe(listener)
    }

    /// Remove the roster listener.
    pub async fn unsubscribe(&self) -> bool {
        self.state.lock().await.roster.unsubscribe()
    }

    // ===========================================
    // Inbound processing
    // ===========================================

    /// Receive and apply one frame.
    ///
    /// Returns `Ok(false)` once the transport has closed. Malformed frames and
    /// out-of-place events are logged and skipped.
    pub async fn process_next(&self) -> Result<bool, ClientError> {
        let frame = match self.transport.recv().await {
            Ok(frame) => frame,
            Err(e) if e.is_closed() => {
                self.lose_transport(e.to_string()).await;
                return Ok(false);
            }
            Err(e) => {
                self.lose_transport(e.to_string()).await;
                return Err(e.into());
            }
        };

        match self.handle_frame(&frame).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_anomaly() => {
                tracing::warn!("skipping frame: {}", e);
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Process frames until the transport closes.
    pub async fn run(&self) -> Result<(), ClientError> {
        while self.process_next().await? {}
        tracing::info!("connection closed");
        Ok(())
    }

    /// Decode one frame, apply it and perform the resulting actions.
    ///
    /// Returns the lifecycle event the frame produced, if any.
    pub async fn handle_frame(&self, frame: &[u8]) -> Result<Option<ChatEvent>, ClientError> {
        let event = ServerEvent::from_bytes(frame)?;
        let actions = {
            let mut state = self.state.lock().await;
            self.dispatch(&mut state, event)?
        };
        self.execute(actions).await
    }

    fn dispatch(
        &self,
        state: &mut ClientState,
        event: ServerEvent,
    ) -> Result<Vec<Action>, ClientError> {
        tracing::debug!(event = event.name(), "inbound event");

        match event {
            ServerEvent::Session(session) => {
                if !state.connection.is_connecting() {
                    return Err(ClientError::TransportAnomaly(
                        "session issued outside a connection attempt".into(),
                    ));
                }
                tracing::info!(
                    local_id = %session.local_id,
                    token = %session.session_token.fingerprint(),
                    "session issued"
                );
                state.roster.set_local_id(session.local_id.clone());
                state.session = Some(session.clone());
                let actions = state.transition(Event::SessionIssued { session });
                if state.connection.is_connected() {
                    state.roster.mark_self_online();
                }
                Ok(actions)
            }
            ServerEvent::PeerList(entries) => {
                state.roster.apply_snapshot(entries);
                let actions = state.transition(Event::SnapshotReceived);
                if state.connection.is_connected() {
                    state.roster.mark_self_online();
                }
                Ok(actions)
            }
            ServerEvent::PeerConnected(peer) => {
                state.roster.upsert_connected(peer.id, peer.display_name);
                Ok(vec![])
            }
            ServerEvent::PeerDisconnected(id) => {
                state.roster.mark_disconnected(&id);
                Ok(vec![])
            }
            ServerEvent::PrivateMessage(message) => {
                if state.roster.local_id() == Some(&message.from) {
                    tracing::debug!("ignoring echo of our own message");
                    return Ok(vec![]);
                }
                let time = message.time.unwrap_or_else(|| self.display_time());
                // Unknown senders and blank content are dropped; the roster logs them.
                state
                    .roster
                    .record_inbound(&message.from, message.content, time)
                    .ok();
                Ok(vec![])
            }
            ServerEvent::ConnectError(error) => {
                if !state.connection.is_connecting() {
                    return Err(ClientError::TransportAnomaly(format!(
                        "connect error outside a connection attempt: {}",
                        error.message
                    )));
                }
                tracing::warn!(reason = %error.message, "credentials rejected");
                Ok(state.transition(Event::Rejected {
                    reason: error.message,
                }))
            }
        }
    }

    /// Execute state machine actions.
    async fn execute(&self, actions: Vec<Action>) -> Result<Option<ChatEvent>, ClientError> {
        let mut emitted = None;
        for action in actions {
            match action {
                Action::OpenTransport => {
                    self.transport.connect(&self.config.server_address).await?;
                }
                Action::SendRegister { credentials } => {
                    let frame = ClientEvent::Register(credentials).to_bytes()?;
                    self.transport.send(&frame).await?;
                }
                Action::PersistSession { session } => {
                    self.sessions.save(&session.session_token).await?;
                }
                Action::ClearPersistedSession => {
                    self.state.lock().await.session = None;
                    self.sessions.clear().await?;
                    tracing::info!("stored session cleared");
                }
                Action::CloseTransport => {
                    if let Err(e) = self.transport.close().await {
                        tracing::debug!("close failed: {}", e);
                    }
                }
                Action::EmitEvent(event) => {
                    match &event {
                        ChatEvent::Connected { local_id } => {
                            tracing::info!(%local_id, "connected")
                        }
                        ChatEvent::Disconnected { reason } => {
                            tracing::info!(%reason, "disconnected")
                        }
                        other => tracing::info!("{:?}", other),
                    }
                    emitted = Some(event);
                }
            }
        }
        Ok(emitted)
    }

    fn display_time(&self) -> String {
        let mut out = String::new();
        let now = Local::now();
        if write!(out, "{}", now.format(&self.config.time_format)).is_err() {
            tracing::warn!(format = %self.config.time_format, "invalid time format");
            return now.format(DEFAULT_TIME_FORMAT).to_string();
        }
        out
    }

    // ===========================================
    // Read access
    // ===========================================

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.state.lock().await.connection.clone()
    }

    /// Whether a session is established.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connection.is_connected()
    }

    /// Most recently issued session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.state.lock().await.session.clone()
    }

    /// Owned copy of the roster.
    pub async fn snapshot(&self) -> RosterSnapshot {
        self.state.lock().await.roster.snapshot()
    }

    /// Run `f` against the roster under the client lock.
    pub async fn with_roster<R>(&self, f: impl FnOnce(&RosterStore) -> R) -> R {
        f(&self.state.lock().await.roster)
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get a reference to the transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a reference to the session store.
    pub fn sessions(&self) -> &S {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use crate::transport::{MockTransport, TcpTransport};
    use parley_chat_core::{Direction, PeerStatus};
    use parley_chat_types::{ConnectError, InboundMessage, PeerConnected, PeerEntry};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    type TestClient = SyncClient<MockTransport, MemorySessionStore>;

    fn id(s: &str) -> PeerId {
        PeerId::new(s)
    }

    fn session_event(token: &str, local_id: &str) -> ServerEvent {
        ServerEvent::Session(Session {
            session_token: SessionToken::new(token),
            local_id: id(local_id),
        })
    }

    fn message_from(from: &str, content: &str, time: Option<&str>) -> ServerEvent {
        ServerEvent::PrivateMessage(InboundMessage {
            content: content.into(),
            from: id(from),
            time: time.map(str::to_string),
        })
    }

    fn rejection(message: &str) -> ServerEvent {
        ServerEvent::ConnectError(ConnectError {
            message: message.into(),
        })
    }

    fn create_client(store: MemorySessionStore) -> (TestClient, MockTransport) {
        let transport = MockTransport::new();
        let client = SyncClient::new(
            ClientConfig::new("127.0.0.1:3001"),
            transport.clone(),
            store,
        );
        (client, transport)
    }

    /// Client registered as "alice" (u1) with the given peers online.
    async fn connected_client(peers: &[(&str, &str)]) -> (TestClient, MockTransport) {
        let (client, transport) = create_client(MemorySessionStore::new());
        transport.queue_event(&session_event("t1", "u1"));
        transport.queue_event(&ServerEvent::PeerList(
            peers
                .iter()
                .map(|(i, name)| PeerEntry::online(*i, *name))
                .collect(),
        ));
        client.register_display_name("alice").await.unwrap();
        (client, transport)
    }

    fn order(snapshot: &RosterSnapshot) -> Vec<String> {
        snapshot.order().iter().map(|i| i.to_string()).collect()
    }

    // ===========================================
    // Registration Tests
    // ===========================================

    #[tokio::test]
    async fn register_then_send_updates_roster() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;

        assert!(client.is_connected().await);
        assert_eq!(
            client.sessions().current(),
            Some(SessionToken::new("t1"))
        );
        assert_eq!(
            transport.sent_events()[0],
            ClientEvent::Register(Credentials::display_name("alice"))
        );

        client.send_message(&id("u2"), "hi").await.unwrap();

        let snapshot = client.snapshot().await;
        assert_eq!(order(&snapshot), vec!["u2"]);
        let bob = snapshot.get(&id("u2")).unwrap();
        assert_eq!(bob.messages().len(), 1);
        assert_eq!(bob.messages()[0].content(), "hi");
        assert_eq!(bob.messages()[0].direction(), Direction::Outbound);
        assert!(!bob.has_unseen());

        match transport.sent_events().last() {
            Some(ClientEvent::PrivateMessage(msg)) => {
                assert_eq!(msg.content, "hi");
                assert_eq!(msg.to, id("u2"));
                assert_eq!(msg.from, id("u1"));
                assert!(!msg.time.is_empty());
            }
            other => panic!("Expected PrivateMessage, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn register_trims_display_name() {
        let (client, transport) = create_client(MemorySessionStore::new());
        transport.queue_event(&session_event("t1", "u1"));
        transport.queue_event(&ServerEvent::PeerList(vec![]));

        client.register_display_name("  alice ").await.unwrap();

        assert_eq!(
            transport.sent_events()[0],
            ClientEvent::Register(Credentials::display_name("alice"))
        );
    }

    #[tokio::test]
    async fn peer_list_before_session_also_connects() {
        let (client, transport) = create_client(MemorySessionStore::new());
        transport.queue_event(&ServerEvent::PeerList(vec![
            PeerEntry::online("u1", "alice"),
            PeerEntry::online("u2", "bob"),
        ]));
        transport.queue_event(&session_event("t1", "u1"));

        let session = client.register_display_name("alice").await.unwrap();

        assert_eq!(session.local_id, id("u1"));
        let snapshot = client.snapshot().await;
        assert!(snapshot.get(&id("u1")).unwrap().is_self());
        let others: Vec<_> = snapshot.others().map(|p| p.id().to_string()).collect();
        assert_eq!(others, vec!["u2"]);
    }

    #[tokio::test]
    async fn own_entry_is_marked_online() {
        let (client, transport) = create_client(MemorySessionStore::new());
        transport.queue_event(&session_event("t1", "u1"));
        transport.queue_event(&ServerEvent::PeerList(vec![PeerEntry {
            id: id("u1"),
            display_name: "alice".into(),
            connected: false,
        }]));

        client.register_display_name("alice").await.unwrap();

        let snapshot = client.snapshot().await;
        assert_eq!(snapshot.get(&id("u1")).unwrap().status(), PeerStatus::Online);
    }

    #[tokio::test]
    async fn blank_display_name_is_rejected_before_io() {
        let (client, transport) = create_client(MemorySessionStore::new());

        let result = client.register_display_name("   ").await;

        assert!(matches!(result, Err(ClientError::InvalidInput(_))));
        assert_eq!(transport.connect_count(), 0);
    }

    #[tokio::test]
    async fn rejected_display_name_returns_to_disconnected() {
        let (client, transport) = create_client(MemorySessionStore::new());
        transport.queue_event(&rejection("invalid username"));

        let result = client.register_display_name("alice").await;

        match result {
            Err(ClientError::RegistrationRejected(reason)) => {
                assert_eq!(reason, "invalid username")
            }
            other => panic!("Expected RegistrationRejected, got {:?}", other),
        }
        assert_eq!(client.state().await, ConnectionState::Disconnected);
        assert!(!transport.is_connected());
        assert!(client.sessions().current().is_none());
    }

    #[tokio::test]
    async fn connect_failure_returns_to_disconnected() {
        let (client, transport) = create_client(MemorySessionStore::new());
        transport.fail_next_connect("connection refused");

        let result = client.register_display_name("alice").await;

        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportError::ConnectionFailed(_)))
        ));
        assert_eq!(client.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn hangup_during_handshake_returns_to_disconnected() {
        let (client, transport) = create_client(MemorySessionStore::new());
        transport.queue_event(&session_event("t1", "u1"));

        let result = client.register_display_name("alice").await;

        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportError::ConnectionClosed))
        ));
        assert_eq!(client.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn malformed_frame_during_handshake_is_skipped() {
        let (client, transport) = create_client(MemorySessionStore::new());
        transport.queue_response(b"garbage".to_vec());
        transport.queue_event(&session_event("t1", "u1"));
        transport.queue_event(&ServerEvent::PeerList(vec![]));

        assert!(client.register_display_name("alice").await.is_ok());
    }

    // ===========================================
    // Resume Tests
    // ===========================================

    #[tokio::test]
    async fn resume_with_invalid_token_clears_store() {
        let store = MemorySessionStore::with_token(SessionToken::new("t1"));
        let (client, transport) = create_client(store.clone());
        transport.queue_event(&rejection("invalid session"));

        let result = client.resume_persisted().await;

        assert!(matches!(result, Err(ClientError::SessionInvalid(_))));
        assert_eq!(
            transport.sent_events()[0],
            ClientEvent::Register(Credentials::session_token(SessionToken::new("t1")))
        );
        assert!(store.current().is_none());
        assert_eq!(client.state().await, ConnectionState::Disconnected);

        // Ready for a fresh registration
        transport.queue_event(&session_event("t2", "u7"));
        transport.queue_event(&ServerEvent::PeerList(vec![]));
        let session = client.register_display_name("alice").await.unwrap();
        assert_eq!(session.local_id, id("u7"));
        assert_eq!(store.current(), Some(SessionToken::new("t2")));
    }

    #[tokio::test]
    async fn resume_persisted_without_token_does_nothing() {
        let (client, transport) = create_client(MemorySessionStore::new());

        assert!(!client.resume_persisted().await.unwrap());
        assert_eq!(transport.connect_count(), 0);
    }

    #[tokio::test]
    async fn resume_persisted_with_valid_token() {
        let store = MemorySessionStore::with_token(SessionToken::new("t1"));
        let (client, transport) = create_client(store);
        transport.queue_event(&session_event("t1", "u1"));
        transport.queue_event(&ServerEvent::PeerList(vec![PeerEntry::online("u2", "bob")]));

        assert!(client.resume_persisted().await.unwrap());
        assert!(client.is_connected().await);
        assert_eq!(client.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn reconnect_presents_latest_token() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;
        client.send_message(&id("u2"), "before").await.unwrap();

        // Queue is empty, so the next recv sees a hangup
        assert!(!client.process_next().await.unwrap());
        assert!(!client.is_connected().await);
        assert!(client.session().await.is_some());

        transport.queue_event(&session_event("t1", "u1"));
        transport.queue_event(&ServerEvent::PeerList(vec![PeerEntry::online("u2", "bob")]));
        client.reconnect().await.unwrap();

        assert_eq!(transport.connect_count(), 2);
        assert_eq!(
            transport.sent_events().last(),
            Some(&ClientEvent::Register(Credentials::session_token(
                SessionToken::new("t1")
            )))
        );
        // History of surviving peers is kept across the re-snapshot
        let snapshot = client.snapshot().await;
        assert_eq!(snapshot.get(&id("u2")).unwrap().messages().len(), 1);
    }

    #[tokio::test]
    async fn reconnect_without_session_fails() {
        let (client, _transport) = create_client(MemorySessionStore::new());

        let result = client.reconnect().await;
        assert!(matches!(result, Err(ClientError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn rejected_reconnect_forgets_session() {
        let (client, transport) = connected_client(&[]).await;
        client.disconnect().await.unwrap();

        transport.queue_event(&rejection("invalid session"));
        let result = client.reconnect().await;

        assert!(matches!(result, Err(ClientError::SessionInvalid(_))));
        assert!(client.session().await.is_none());
        assert!(client.sessions().current().is_none());
    }

    // ===========================================
    // Sending Tests
    // ===========================================

    #[tokio::test]
    async fn empty_messages_are_rejected() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;

        for content in ["", "   "] {
            let result = client.send_message(&id("u2"), content).await;
            assert!(matches!(result, Err(ClientError::InvalidInput(_))));
        }

        let snapshot = client.snapshot().await;
        assert!(snapshot.get(&id("u2")).unwrap().messages().is_empty());
        assert_eq!(transport.sent_events().len(), 1);
    }

    #[tokio::test]
    async fn send_before_connect_fails() {
        let (client, transport) = create_client(MemorySessionStore::new());

        let result = client.send_message(&id("u2"), "hi").await;

        assert!(matches!(result, Err(ClientError::NotConnected)));
        assert!(transport.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn send_to_unknown_peer_emits_nothing() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;

        let result = client.send_message(&id("ghost"), "hi").await;

        assert!(matches!(result, Err(ClientError::UnknownPeer(p)) if p == id("ghost")));
        assert_eq!(transport.sent_events().len(), 1);
    }

    #[tokio::test]
    async fn send_failure_keeps_local_append() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;
        transport.fail_next_send("broken pipe");

        let result = client.send_message(&id("u2"), "hi").await;

        assert!(matches!(result, Err(ClientError::Transport(_))));
        let snapshot = client.snapshot().await;
        assert_eq!(snapshot.get(&id("u2")).unwrap().messages().len(), 1);
    }

    // ===========================================
    // Inbound Processing Tests
    // ===========================================

    #[tokio::test]
    async fn inbound_events_update_roster() {
        let (client, transport) =
            connected_client(&[("u1", "alice"), ("u2", "bob"), ("u3", "carol")]).await;
        transport.queue_event(&ServerEvent::PeerConnected(PeerConnected {
            id: id("u4"),
            display_name: "dave".into(),
        }));
        transport.queue_event(&message_from("u3", "yo", None));
        transport.queue_event(&ServerEvent::PeerDisconnected(id("u2")));

        for _ in 0..3 {
            assert!(client.process_next().await.unwrap());
        }

        let snapshot = client.snapshot().await;
        assert_eq!(order(&snapshot), vec!["u3", "u1", "u2", "u4"]);
        let carol = snapshot.get(&id("u3")).unwrap();
        assert!(carol.has_unseen());
        assert_eq!(carol.messages()[0].direction(), Direction::Inbound);
        assert!(!carol.messages()[0].timestamp().is_empty());
        assert!(!snapshot.get(&id("u2")).unwrap().is_online());
        assert!(snapshot.get(&id("u4")).unwrap().is_online());
    }

    #[tokio::test]
    async fn inbound_keeps_sender_time() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;
        transport.queue_event(&message_from("u2", "hey", Some("09:15")));

        client.process_next().await.unwrap();

        let snapshot = client.snapshot().await;
        assert_eq!(
            snapshot.get(&id("u2")).unwrap().messages()[0].timestamp(),
            "09:15"
        );
    }

    #[tokio::test]
    async fn own_echo_is_ignored() {
        let (client, transport) = connected_client(&[("u1", "alice"), ("u2", "bob")]).await;
        let before = client.snapshot().await;
        transport.queue_event(&message_from("u1", "echo", None));

        assert!(client.process_next().await.unwrap());

        assert_eq!(client.snapshot().await, before);
    }

    #[tokio::test]
    async fn inbound_from_unknown_peer_is_noop() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;
        let before = client.snapshot().await;
        transport.queue_event(&message_from("ghost", "boo", None));

        assert!(client.process_next().await.unwrap());

        assert_eq!(client.snapshot().await, before);
    }

    #[tokio::test]
    async fn malformed_frame_is_skipped() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;
        transport.queue_response(b"not msgpack".to_vec());
        transport.queue_event(&message_from("u2", "still here", None));

        assert!(client.process_next().await.unwrap());
        assert!(client.process_next().await.unwrap());

        let snapshot = client.snapshot().await;
        assert_eq!(snapshot.get(&id("u2")).unwrap().messages().len(), 1);
    }

    #[tokio::test]
    async fn stray_session_is_an_anomaly() {
        let (client, _transport) = connected_client(&[]).await;
        let frame = session_event("t9", "u9").to_bytes().unwrap();

        let result = client.handle_frame(&frame).await;

        assert!(matches!(result, Err(ClientError::TransportAnomaly(_))));
        assert_eq!(
            client.session().await.unwrap().session_token,
            SessionToken::new("t1")
        );
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn stray_connect_error_is_an_anomaly() {
        let (client, _transport) = connected_client(&[]).await;
        let frame = rejection("late").to_bytes().unwrap();

        let result = client.handle_frame(&frame).await;

        assert!(matches!(result, Err(ClientError::TransportAnomaly(_))));
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn resnapshot_while_connected_is_applied() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;
        transport.queue_event(&ServerEvent::PeerList(vec![
            PeerEntry::online("u3", "carol"),
            PeerEntry::online("u2", "bob"),
        ]));

        client.process_next().await.unwrap();

        assert_eq!(order(&client.snapshot().await), vec!["u3", "u2"]);
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn run_returns_when_transport_closes() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;
        transport.queue_event(&message_from("u2", "one", None));
        transport.queue_event(&message_from("u2", "two", None));

        client.run().await.unwrap();

        assert_eq!(client.state().await, ConnectionState::Disconnected);
        let snapshot = client.snapshot().await;
        assert_eq!(snapshot.get(&id("u2")).unwrap().messages().len(), 2);
    }

    #[tokio::test]
    async fn recv_failure_is_returned() {
        let (client, transport) = connected_client(&[]).await;
        transport.fail_next_recv("reset by peer");

        let result = client.process_next().await;

        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportError::ReceiveFailed(_)))
        ));
        assert!(!client.is_connected().await);
    }

    // ===========================================
    // Selection and Subscription Tests
    // ===========================================

    #[tokio::test]
    async fn select_clears_unseen() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;
        transport.queue_event(&message_from("u2", "ping", None));
        client.process_next().await.unwrap();

        let bob = client.select_peer(&id("u2")).await.unwrap();

        assert!(!bob.has_unseen());
        assert_eq!(client.snapshot().await.selected().map(Peer::id), Some(&id("u2")));
        assert_eq!(
            client
                .with_roster(|roster| roster.selected_id().cloned())
                .await,
            Some(id("u2"))
        );
    }

    #[tokio::test]
    async fn select_unknown_peer_fails() {
        let (client, _transport) = connected_client(&[]).await;

        let result = client.select_peer(&id("ghost")).await;
        assert!(matches!(result, Err(ClientError::UnknownPeer(_))));
    }

    #[tokio::test]
    async fn subscriber_sees_roster_changes() {
        let (client, transport) = connected_client(&[("u2", "bob"), ("u3", "carol")]).await;
        let seen: Arc<std::sync::Mutex<Vec<Vec<String>>>> = Arc::default();
        let sink = Arc::clone(&seen);
        assert!(
            !client
                .subscribe(move |snapshot| sink.lock().unwrap().push(order(snapshot)))
                .await
        );

        transport.queue_event(&message_from("u3", "hey", None));
        client.process_next().await.unwrap();
        client.send_message(&id("u2"), "hi").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![vec!["u3".to_string(), "u2".into()], vec!["u2".into(), "u3".into()]]
        );
        drop(seen);
        assert!(client.unsubscribe().await);
    }

    #[tokio::test]
    async fn disconnect_keeps_roster_and_session() {
        let (client, transport) = connected_client(&[("u2", "bob")]).await;

        client.disconnect().await.unwrap();

        assert_eq!(client.state().await, ConnectionState::Disconnected);
        assert!(!transport.is_connected());
        assert!(client.session().await.is_some());
        assert_eq!(client.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn custom_time_format_is_used() {
        let transport = MockTransport::new();
        let client = SyncClient::new(
            ClientConfig::new("server").with_time_format("fixed"),
            transport.clone(),
            MemorySessionStore::new(),
        );
        transport.queue_event(&session_event("t1", "u1"));
        transport.queue_event(&ServerEvent::PeerList(vec![PeerEntry::online("u2", "bob")]));
        client.register_display_name("alice").await.unwrap();

        client.send_message(&id("u2"), "hi").await.unwrap();

        let snapshot = client.snapshot().await;
        assert_eq!(
            snapshot.get(&id("u2")).unwrap().messages()[0].timestamp(),
            "fixed"
        );
    }

    #[tokio::test]
    async fn invalid_time_format_falls_back_to_hours_minutes() {
        let transport = MockTransport::new();
        let client = SyncClient::new(
            ClientConfig::new("server").with_time_format("%Q"),
            transport.clone(),
            MemorySessionStore::new(),
        );
        transport.queue_event(&session_event("t1", "u1"));
        transport.queue_event(&ServerEvent::PeerList(vec![PeerEntry::online("u2", "bob")]));
        client.register_display_name("alice").await.unwrap();

        client.send_message(&id("u2"), "hi").await.unwrap();

        let timestamp = client
            .with_roster(|roster| roster.peer(&id("u2")).unwrap().messages()[0].timestamp().to_string())
            .await;
        assert!(chrono::NaiveTime::parse_from_str(&timestamp, "%H:%M").is_ok());
        assert_eq!(timestamp.len(), 5);
    }

    // ===========================================
    // TCP Lifecycle Tests
    // ===========================================

    async fn write_event(stream: &mut tokio::net::TcpStream, event: &ServerEvent) {
        let frame = event.to_bytes().unwrap();
        stream
            .write_all(&(frame.len() as u32).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(&frame).await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_stops_running_client() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            write_event(&mut stream, &session_event("t1", "u1")).await;
            write_event(
                &mut stream,
                &ServerEvent::PeerList(vec![PeerEntry::online("u2", "bob")]),
            )
            .await;
            stream
        });

        let client = Arc::new(SyncClient::new(
            ClientConfig::new(&addr),
            TcpTransport::new(),
            MemorySessionStore::new(),
        ));
        client.register_display_name("alice").await.unwrap();
        // Server stays silent from here on
        let _stream = server.await.unwrap();

        let runner = Arc::clone(&client);
        let running = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), client.disconnect())
            .await
            .expect("disconnect blocked behind run")
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("run kept going after disconnect")
            .unwrap()
            .unwrap();

        assert_eq!(client.state().await, ConnectionState::Disconnected);
        assert!(!client.transport().is_connected());
        assert_eq!(client.snapshot().await.len(), 1);
    }
}
