//! # chat-core
//!
//! Pure logic for Parley (no I/O, instant tests).
//!
//! This crate implements the roster and the session state machine without
//! any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about ordering and unseen-state rules
//!
//! The actual I/O (network, disk, wall clock) is performed by `chat-client`,
//! which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod peer;
pub mod roster;
pub mod state;

pub use peer::{Direction, Message, Peer, PeerStatus};
pub use roster::{RosterError, RosterListener, RosterSnapshot, RosterStore};
pub use state::{Action, ChatEvent, ConnectionState, Event};
