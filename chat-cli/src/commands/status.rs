//! Show local state.

use anyhow::{Context, Result};
use parley_chat_client::{FileSessionStore, SessionStore};
use std::path::Path;

use crate::config::CliConfig;

/// Run the status command.
pub async fn run(data_dir: &Path) -> Result<()> {
    println!("=== parley status ===");
    println!();
    println!("Data dir: {}", data_dir.display());
    println!();

    let config = CliConfig::load_or_default(data_dir).await?;
    println!("Server:  {}", config.server_address);
    match &config.display_name {
        Some(name) => println!("Name:    {}", name),
        None => println!("Name:    (never registered)"),
    }

    let token = FileSessionStore::new(data_dir)
        .load()
        .await
        .context("Failed to read stored session")?;
    match token {
        Some(token) => println!("Session: {} (will resume)", token.fingerprint()),
        None => {
            println!("Session: NONE");
            println!();
            println!("Run 'parley register --name <name>' to register.");
        }
    }

    Ok(())
}
