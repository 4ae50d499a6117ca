//! Configuration management for the parley CLI.

use anyhow::{Context, Result};
use parley_chat_client::DEFAULT_SERVER_ADDRESS;
use serde::{Deserialize, Serialize};
use std::path::Path;

const CONFIG_FILE: &str = "config.json";

/// CLI settings stored locally next to the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Server used by the last successful command.
    pub server_address: String,
    /// Display name used for the last registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            display_name: None,
        }
    }
}

impl CliConfig {
    /// Load configuration from a directory.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("No configuration found. Run 'parley register' first.")?;
        serde_json::from_str(&contents).context("Invalid configuration")
    }

    /// Load configuration, falling back to defaults when none is stored.
    pub async fn load_or_default(data_dir: &Path) -> Result<Self> {
        if !Self::exists(data_dir) {
            return Ok(Self::default());
        }
        Self::load(data_dir).await
    }

    /// Save configuration to a directory.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save configuration")?;
        set_file_permissions_0600(&path).await?;
        Ok(())
    }

    /// Check if a configuration is stored.
    pub fn exists(data_dir: &Path) -> bool {
        data_dir.join(CONFIG_FILE).exists()
    }

    /// Server to use: the explicit override, else the stored one.
    pub fn resolve_server(&self, server: Option<&str>) -> String {
        server.map_or_else(|| self.server_address.clone(), str::to_string)
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
