//! # chat-client
//!
//! Client library for the Parley direct-messaging protocol.
//!
//! This is the main library that applications use to chat.
//!
//! ## Features
//!
//! - **Silent resume**: the session token is persisted and presented again on
//!   the next start
//! - **Live roster**: presence and messages are applied to a
//!   most-recently-active-first roster with per-peer unseen flags
//! - **Transport Abstraction**: Pluggable transport layer (TCP, mock)
//! - **Pure State Machine**: Uses chat-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use parley_chat_client::{ClientConfig, FileSessionStore, SyncClient, TcpTransport};
//!
//! let client = SyncClient::new(
//!     ClientConfig::default(),
//!     TcpTransport::new(),
//!     FileSessionStore::new(&data_dir),
//! );
//!
//! if !client.resume_persisted().await? {
//!     client.register_display_name("alice").await?;
//! }
//! client.run().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod session;
pub mod transport;

pub use client::{
    ClientConfig, ClientError, SyncClient, DEFAULT_SERVER_ADDRESS, DEFAULT_TIME_FORMAT,
};
pub use session::{
    FileSessionStore, MemorySessionStore, SessionStore, SessionStoreError, SESSION_KEY,
};
pub use transport::{
    MockTransport, TcpTransport, TcpTransportConfig, Transport, TransportError, MAX_FRAME_SIZE,
};
