//! Register under a display name.

use anyhow::{Context, Result};
use parley_chat_client::{ClientError, TcpTransport, Transport};
use std::path::Path;

use super::{build_client, mock_transport, print_roster, CliClient};
use crate::config::CliConfig;

/// Run the register command.
pub async fn run(data_dir: &Path, server: Option<&str>, name: &str, use_mock: bool) -> Result<()> {
    let mut config = CliConfig::load_or_default(data_dir).await?;
    let server = config.resolve_server(server);

    println!("Registering as {:?} on {}...", name.trim(), server);

    if use_mock {
        let client = build_client(data_dir, &server, mock_transport());
        do_register(client, &mut config, data_dir, name).await
    } else {
        let client = build_client(data_dir, &server, TcpTransport::new());
        do_register(client, &mut config, data_dir, name).await
    }
}

/// Common register logic for any transport.
async fn do_register<T: Transport>(
    client: CliClient<T>,
    config: &mut CliConfig,
    data_dir: &Path,
    name: &str,
) -> Result<()> {
    let session = match client.register_display_name(name).await {
        Ok(session) => session,
        Err(ClientError::RegistrationRejected(reason)) => {
            anyhow::bail!("Registration rejected: {reason}")
        }
        Err(e) => return Err(e).context("Failed to register"),
    };

    config.server_address = client.config().server_address.clone();
    config.display_name = Some(name.trim().to_string());
    config.save(data_dir).await?;

    println!("Registered!");
    println!();
    println!("  Local ID: {}", session.local_id);
    println!("  Session:  {}", session.session_token.fingerprint());
    println!();
    println!("Peers:");
    print_roster(&client.snapshot().await);

    client.disconnect().await.ok();
    Ok(())
}
