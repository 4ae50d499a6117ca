//! Peer and message model.

use parley_chat_types::PeerId;

/// Whether a peer currently has a live connection to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerStatus {
    /// Connected.
    #[default]
    Online,
    /// Known but not connected. Offline peers stay in the roster.
    Offline,
}

impl std::fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerStatus::Online => f.pad("online"),
            PeerStatus::Offline => f.pad("offline"),
        }
    }
}

/// Which side of the conversation wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by the local user.
    Outbound,
    /// Received from the peer.
    Inbound,
}

/// One chat line. Immutable once appended to a peer's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    content: String,
    direction: Direction,
    timestamp: String,
}

impl Message {
    pub(crate) fn new(content: String, direction: Direction, timestamp: String) -> Self {
        Self {
            content,
            direction,
            timestamp,
        }
    }

    /// Message text (never empty or whitespace-only).
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Who wrote it.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Local display time captured at send or receipt.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Shorthand for `direction() == Direction::Outbound`.
    pub fn is_outbound(&self) -> bool {
        self.direction == Direction::Outbound
    }
}

/// A remote participant known to the local session.
///
/// Fields are read-only outside this crate; all mutation goes through
/// [`RosterStore`](crate::RosterStore) so ordering and unseen-state rules
/// cannot be bypassed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub(crate) id: PeerId,
    pub(crate) display_name: String,
    pub(crate) is_self: bool,
    pub(crate) status: PeerStatus,
    pub(crate) messages: Vec<Message>,
    pub(crate) has_unseen: bool,
}

impl Peer {
    pub(crate) fn new(id: PeerId, display_name: String, status: PeerStatus) -> Self {
        Self {
            id,
            display_name,
            is_self: false,
            status,
            messages: Vec::new(),
            has_unseen: false,
        }
    }

    /// Server-assigned identifier.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Label chosen at registration.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// True for the entry that represents the local session.
    pub fn is_self(&self) -> bool {
        self.is_self
    }

    /// Current connection status.
    pub fn status(&self) -> PeerStatus {
        self.status
    }

    /// Chronological message log.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Inbound content arrived while this peer was not selected.
    pub fn has_unseen(&self) -> bool {
        self.has_unseen
    }

    /// Convenience for `status() == PeerStatus::Online`.
    pub fn is_online(&self) -> bool {
        self.status == PeerStatus::Online
    }
}
