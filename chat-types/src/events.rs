//! Protocol events exchanged with the Parley server.
//!
//! Every frame on the wire is one event, encoded as a MessagePack map of the
//! shape `{"event": <name>, "data": <payload>}`. Event names and payload field
//! names match the server's JSON vocabulary (`peer-connected`, `displayName`,
//! ...), so the same types also serialize cleanly with `serde_json`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{PeerId, ProtocolError, SessionToken};

/// Events pushed from the server to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Credentials accepted, session issued
    Session(Session),
    /// Authoritative snapshot of every known participant
    PeerList(Vec<PeerEntry>),
    /// A participant came online (new or returning)
    PeerConnected(PeerConnected),
    /// A participant went offline
    PeerDisconnected(PeerId),
    /// Direct message addressed to us
    PrivateMessage(InboundMessage),
    /// Credentials rejected (display name taken, stale session token)
    ConnectError(ConnectError),
}

impl ServerEvent {
    /// Wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Session(_) => "session",
            ServerEvent::PeerList(_) => "peer-list",
            ServerEvent::PeerConnected(_) => "peer-connected",
            ServerEvent::PeerDisconnected(_) => "peer-disconnected",
            ServerEvent::PrivateMessage(_) => "private-message",
            ServerEvent::ConnectError(_) => "connect-error",
        }
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode(bytes)
    }
}

/// Events sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Establish or resume a session
    Register(Credentials),
    /// Direct message to another participant
    PrivateMessage(OutboundMessage),
}

impl ClientEvent {
    /// Wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Register(_) => "register",
            ClientEvent::PrivateMessage(_) => "private-message",
        }
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode(bytes)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    // Named encoding keeps struct fields as map keys, which the tagged enums
    // above need in order to round-trip.
    rmp_serde::to_vec_named(value).map_err(ProtocolError::Serialization)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    if bytes.is_empty() {
        return Err(ProtocolError::EmptyFrame);
    }
    rmp_serde::from_slice(bytes).map_err(ProtocolError::Deserialization)
}

/// Credentials presented in a `register` event.
///
/// `Debug` output is safe to log: [`SessionToken`] redacts itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    /// Resume a previously issued session
    SessionToken {
        /// Token from an earlier `session` event
        #[serde(rename = "sessionToken")]
        session_token: SessionToken,
    },
    /// First-time registration under a display name
    DisplayName {
        /// User-chosen label
        #[serde(rename = "displayName")]
        display_name: String,
    },
}

impl Credentials {
    /// Credentials for a first-time registration.
    pub fn display_name(name: impl Into<String>) -> Self {
        Credentials::DisplayName {
            display_name: name.into(),
        }
    }

    /// Credentials for resuming an existing session.
    pub fn session_token(token: SessionToken) -> Self {
        Credentials::SessionToken {
            session_token: token,
        }
    }

    /// Whether these credentials resume an existing session.
    pub fn is_resume(&self) -> bool {
        matches!(self, Credentials::SessionToken { .. })
    }
}

/// Payload of the `session` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Token to present on later reconnects
    pub session_token: SessionToken,
    /// Identifier the server assigned to us
    pub local_id: PeerId,
}

/// One participant in a `peer-list` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerEntry {
    /// Server-assigned identifier
    pub id: PeerId,
    /// Label chosen at registration
    pub display_name: String,
    /// Whether the participant currently has a live connection
    #[serde(default = "default_connected")]
    pub connected: bool,
}

fn default_connected() -> bool {
    true
}

impl PeerEntry {
    /// Snapshot entry for a participant that is online.
    pub fn online(id: impl Into<PeerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            connected: true,
        }
    }
}

/// Payload of the `peer-connected` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConnected {
    /// Server-assigned identifier
    pub id: PeerId,
    /// Label chosen at registration
    pub display_name: String,
}

/// Payload of an inbound `private-message` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message text
    pub content: String,
    /// Sender
    pub from: PeerId,
    /// Sender's display timestamp; receipt time is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// Payload of an outbound `private-message` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message text
    pub content: String,
    /// Recipient
    pub to: PeerId,
    /// Our own identifier
    pub from: PeerId,
    /// Local display timestamp captured at send
    pub time: String,
}

/// Payload of the `connect-error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectError {
    /// Human-readable reason, e.g. "invalid username"
    pub message: String,
}
