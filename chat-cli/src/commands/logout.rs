//! Forget the stored session.

use anyhow::{Context, Result};
use parley_chat_client::{FileSessionStore, SessionStore};
use std::path::Path;

/// Run the logout command.
pub async fn run(data_dir: &Path) -> Result<()> {
    let store = FileSessionStore::new(data_dir);
    let had_session = store
        .load()
        .await
        .map(|token| token.is_some())
        .unwrap_or(true);

    store
        .clear()
        .await
        .context("Failed to remove stored session")?;

    if had_session {
        println!("Logged out. The next start will ask for a display name.");
    } else {
        println!("No stored session.");
    }
    Ok(())
}
