//! Connection state machine for Parley.
//!
//! This module provides a pure, side-effect-free state machine for the
//! session lifecycle. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! The actual I/O (opening the transport, persisting the session token) is
//! performed by chat-client, not by this module.

use parley_chat_types::{Credentials, PeerId, Session};

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session attempt in flight.
    #[default]
    Disconnected,
    /// Credentials sent, waiting for the session and the initial snapshot.
    Connecting {
        /// Credentials presented for this attempt.
        credentials: Credentials,
        /// Session issued so far, if the `session` event already arrived.
        session: Option<Session>,
        /// Whether the initial snapshot already arrived.
        snapshot_applied: bool,
    },
    /// Session established and roster seeded.
    Connected {
        /// The active session.
        session: Session,
    },
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (chat-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // A new attempt supersedes whatever was going on.
            (_, Event::ConnectRequested { credentials }) => (
                Self::Connecting {
                    credentials: credentials.clone(),
                    session: None,
                    snapshot_applied: false,
                },
                vec![Action::OpenTransport, Action::SendRegister { credentials }],
            ),

            // From Connecting
            (
                Self::Connecting {
                    credentials,
                    snapshot_applied,
                    ..
                },
                Event::SessionIssued { session },
            ) => {
                let mut actions = vec![Action::PersistSession {
                    session: session.clone(),
                }];
                if snapshot_applied {
                    actions.push(Action::EmitEvent(ChatEvent::Connected {
                        local_id: session.local_id.clone(),
                    }));
                    (Self::Connected { session }, actions)
                } else {
                    (
                        Self::Connecting {
                            credentials,
                            session: Some(session),
                            snapshot_applied,
                        },
                        actions,
                    )
                }
            }
            (
                Self::Connecting {
                    credentials,
                    session,
                    ..
                },
                Event::SnapshotReceived,
            ) => match session {
                Some(session) => {
                    let local_id = session.local_id.clone();
                    (
                        Self::Connected { session },
                        vec![Action::EmitEvent(ChatEvent::Connected { local_id })],
                    )
                }
                None => (
                    Self::Connecting {
                        credentials,
                        session: None,
                        snapshot_applied: true,
                    },
                    vec![],
                ),
            },
            (Self::Connecting { credentials, .. }, Event::Rejected { reason }) => {
                if credentials.is_resume() {
                    (
                        Self::Disconnected,
                        vec![
                            Action::CloseTransport,
                            Action::ClearPersistedSession,
                            Action::EmitEvent(ChatEvent::SessionInvalid { reason }),
                        ],
                    )
                } else {
                    (
                        Self::Disconnected,
                        vec![
                            Action::CloseTransport,
                            Action::EmitEvent(ChatEvent::RegistrationRejected { reason }),
                        ],
                    )
                }
            }

            // Losing the transport from any live state
            (Self::Connecting { .. } | Self::Connected { .. }, Event::TransportLost { reason }) => (
                Self::Disconnected,
                vec![Action::EmitEvent(ChatEvent::Disconnected { reason })],
            ),
            (Self::Connecting { .. } | Self::Connected { .. }, Event::DisconnectRequested) => (
                Self::Disconnected,
                vec![
                    Action::CloseTransport,
                    Action::EmitEvent(ChatEvent::Disconnected {
                        reason: "user requested".into(),
                    }),
                ],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a session is established.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if a connection attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. })
    }

    /// Identifier of the established session, if connected.
    pub fn local_id(&self) -> Option<&PeerId> {
        match self {
            Self::Connected { session } => Some(&session.local_id),
            _ => None,
        }
    }
}

/// Events that can occur in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller asked to register or resume.
    ConnectRequested {
        /// Credentials to present.
        credentials: Credentials,
    },
    /// Server issued a session.
    SessionIssued {
        /// The issued session.
        session: Session,
    },
    /// Server sent an authoritative peer snapshot.
    SnapshotReceived,
    /// Server rejected the presented credentials.
    Rejected {
        /// Reason given by the server.
        reason: String,
    },
    /// Transport closed or failed underneath us.
    TransportLost {
        /// Reason for the loss.
        reason: String,
    },
    /// Caller asked to disconnect.
    DisconnectRequested,
}

/// Actions to be executed by the chat-client.
///
/// These are instructions, not side effects. The chat-client interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open (or reopen) the transport connection.
    OpenTransport,
    /// Send a `register` event.
    SendRegister {
        /// Credentials to send.
        credentials: Credentials,
    },
    /// Write the session token to durable storage.
    PersistSession {
        /// Session whose token should be stored.
        session: Session,
    },
    /// Remove the stored session token.
    ClearPersistedSession,
    /// Close the transport.
    CloseTransport,
    /// Emit an event to the application.
    EmitEvent(ChatEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Session established and roster seeded.
    Connected {
        /// Identifier of the local session.
        local_id: PeerId,
    },
    /// Display name registration was refused.
    RegistrationRejected {
        /// Reason given by the server.
        reason: String,
    },
    /// A resume token was refused; the stored token has been cleared.
    SessionInvalid {
        /// Reason given by the server.
        reason: String,
    },
    /// The session is no longer connected.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
}
