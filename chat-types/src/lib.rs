//! # chat-types
//!
//! Wire protocol types for the Parley direct-messaging client.
//!
//! This crate provides the foundational types used across all Parley crates:
//! - [`PeerId`], [`SessionToken`] - Identity types assigned by the server
//! - [`ServerEvent`] - Events pushed to the client (session, presence, messages)
//! - [`ClientEvent`] - Events sent by the client (register, private message)
//! - [`ProtocolError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;

pub use error::ProtocolError;
pub use events::{
    ClientEvent, ConnectError, Credentials, InboundMessage, OutboundMessage, PeerConnected,
    PeerEntry, ServerEvent, Session,
};
pub use ids::{PeerId, SessionToken};
