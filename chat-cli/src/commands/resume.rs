//! Resume the stored session and show the roster.

use anyhow::Result;
use parley_chat_client::{TcpTransport, Transport};
use std::path::Path;

use super::{build_client, mock_transport, print_roster, resume_stored, CliClient};
use crate::config::CliConfig;

/// Run the resume command.
pub async fn run(data_dir: &Path, server: Option<&str>, use_mock: bool) -> Result<()> {
    let config = CliConfig::load_or_default(data_dir).await?;
    let server = config.resolve_server(server);

    if use_mock {
        do_resume(build_client(data_dir, &server, mock_transport())).await
    } else {
        do_resume(build_client(data_dir, &server, TcpTransport::new())).await
    }
}

/// Common resume logic for any transport.
async fn do_resume<T: Transport>(client: CliClient<T>) -> Result<()> {
    resume_stored(&client).await?;

    if let Some(session) = client.session().await {
        println!("Resumed as {}", session.local_id);
    }
    println!();
    println!("Peers:");
    print_roster(&client.snapshot().await);

    client.disconnect().await.ok();
    Ok(())
}
