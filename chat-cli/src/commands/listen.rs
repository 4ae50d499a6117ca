//! Stream roster changes until the connection closes.

use anyhow::{Context, Result};
use parley_chat_client::{MockTransport, TcpTransport, Transport};
use parley_chat_core::RosterSnapshot;
use parley_chat_types::{InboundMessage, PeerId, ServerEvent};
use std::path::Path;

use super::{build_client, mock_transport, print_roster, resume_stored, CliClient, MOCK_PEER_ID};
use crate::config::CliConfig;

/// Run the listen command.
pub async fn run(data_dir: &Path, server: Option<&str>, use_mock: bool) -> Result<()> {
    let config = CliConfig::load_or_default(data_dir).await?;
    let server = config.resolve_server(server);

    if use_mock {
        do_listen(build_client(data_dir, &server, mock_listen_transport())).await
    } else {
        println!("Listening on {} (Ctrl-C to stop)...", server);
        do_listen(build_client(data_dir, &server, TcpTransport::new())).await
    }
}

/// Common listen logic for any transport.
async fn do_listen<T: Transport>(client: CliClient<T>) -> Result<()> {
    resume_stored(&client).await?;

    println!("Peers:");
    print_roster(&client.snapshot().await);
    println!();

    let mut previous = client.snapshot().await;
    client
        .subscribe(move |snapshot| {
            for line in describe_changes(&previous, snapshot) {
                println!("{}", line);
            }
            previous = snapshot.clone();
        })
        .await;
    client.run().await.context("Connection failed")?;

    println!();
    println!("Connection closed. Final roster:");
    print_roster(&client.snapshot().await);
    Ok(())
}

/// Lines describing what changed between two roster snapshots.
///
/// Selection changes and reordering print nothing.
fn describe_changes(previous: &RosterSnapshot, current: &RosterSnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    for peer in current.peers() {
        let Some(before) = previous.get(peer.id()) else {
            lines.push(format!("{} joined ({})", peer.display_name(), peer.status()));
            continue;
        };
        if before.status() != peer.status() {
            lines.push(format!("{} is {}", peer.display_name(), peer.status()));
        }
        for message in peer.messages().iter().skip(before.messages().len()) {
            lines.push(format!(
                "[{}] {}{}: {}",
                message.timestamp(),
                if message.is_outbound() { "to " } else { "" },
                peer.display_name(),
                message.content()
            ));
        }
    }

    for peer in previous.peers() {
        if current.get(peer.id()).is_none() {
            lines.push(format!("{} left", peer.display_name()));
        }
    }

    lines
}

/// Mock transport with a short conversation after the handshake.
fn mock_listen_transport() -> MockTransport {
    let transport = mock_transport();
    transport.queue_event(&ServerEvent::PrivateMessage(InboundMessage {
        content: "hello from the mock server".into(),
        from: PeerId::new(MOCK_PEER_ID),
        time: None,
    }));
    transport.queue_event(&ServerEvent::PeerDisconnected(PeerId::new(MOCK_PEER_ID)));
    transport
}
