//! CLI command implementations.

pub mod listen;
pub mod logout;
pub mod register;
pub mod resume;
pub mod send;
pub mod status;

use anyhow::{Context, Result};
use parley_chat_client::{
    ClientConfig, ClientError, FileSessionStore, MockTransport, SyncClient, Transport,
};
use parley_chat_core::RosterSnapshot;
use parley_chat_types::{PeerEntry, PeerId, ServerEvent, Session, SessionToken};
use std::path::Path;

/// Local id the mock server assigns.
pub const MOCK_LOCAL_ID: &str = "mock-self";

/// Peer the mock server lists next to us.
pub const MOCK_PEER_ID: &str = "mock-peer";

/// Client type every command drives.
pub type CliClient<T> = SyncClient<T, FileSessionStore>;

/// Build a client that keeps its session token in `data_dir`.
pub fn build_client<T: Transport>(data_dir: &Path, server: &str, transport: T) -> CliClient<T> {
    SyncClient::new(
        ClientConfig::new(server),
        transport,
        FileSessionStore::new(data_dir),
    )
}

/// Mock transport primed with a successful handshake.
pub fn mock_transport() -> MockTransport {
    let transport = MockTransport::new();
    transport.queue_event(&ServerEvent::Session(Session {
        session_token: SessionToken::new("mock-session"),
        local_id: PeerId::new(MOCK_LOCAL_ID),
    }));
    transport.queue_event(&ServerEvent::PeerList(vec![
        PeerEntry::online(MOCK_LOCAL_ID, "you"),
        PeerEntry::online(MOCK_PEER_ID, "echo"),
    ]));
    transport
}

/// Resume the stored session, or explain how to get one.
pub async fn resume_stored<T: Transport>(client: &CliClient<T>) -> Result<()> {
    match client.resume_persisted().await {
        Ok(true) => Ok(()),
        Ok(false) => anyhow::bail!("No stored session. Run 'parley register --name <name>' first."),
        Err(ClientError::SessionInvalid(reason)) => anyhow::bail!(
            "Stored session was rejected ({reason}). Run 'parley register --name <name>' again."
        ),
        Err(e) => Err(e).context("Failed to resume session"),
    }
}

/// Print the roster, most recently active first.
pub fn print_roster(snapshot: &RosterSnapshot) {
    if snapshot.is_empty() {
        println!("  (no peers)");
        return;
    }
    for peer in snapshot.peers() {
        let unseen = if peer.has_unseen() { "*" } else { " " };
        let you = if peer.is_self() { " (you)" } else { "" };
        println!(
            "  {} {:<8} {} [{}]{} - {} message(s)",
            unseen,
            peer.status(),
            peer.display_name(),
            peer.id(),
            you,
            peer.messages().len()
        );
    }
}
