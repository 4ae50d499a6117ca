//! Send a direct message.

use anyhow::{Context, Result};
use parley_chat_client::{ClientError, TcpTransport, Transport};
use parley_chat_types::PeerId;
use std::path::Path;

use super::{build_client, mock_transport, resume_stored, CliClient};
use crate::config::CliConfig;

/// Run the send command.
pub async fn run(
    data_dir: &Path,
    server: Option<&str>,
    peer: &str,
    message: &str,
    use_mock: bool,
) -> Result<()> {
    let config = CliConfig::load_or_default(data_dir).await?;
    let server = config.resolve_server(server);
    let peer = PeerId::new(peer);

    if use_mock {
        do_send(build_client(data_dir, &server, mock_transport()), &peer, message).await
    } else {
        do_send(build_client(data_dir, &server, TcpTransport::new()), &peer, message).await
    }
}

/// Common send logic for any transport.
async fn do_send<T: Transport>(client: CliClient<T>, peer: &PeerId, message: &str) -> Result<()> {
    resume_stored(&client).await?;

    match client.send_message(peer, message).await {
        Ok(()) => {
            println!("Sent to {}", peer);
        }
        Err(ClientError::UnknownPeer(id)) => {
            anyhow::bail!("Unknown peer '{id}'. Run 'parley resume' to list peers.")
        }
        Err(e) => return Err(e).context("Failed to send message"),
    }

    client.disconnect().await.ok();
    Ok(())
}
